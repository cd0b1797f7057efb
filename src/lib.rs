#![deny(missing_debug_implementations)]

//! # evhttp
//!
//! A non-blocking TCP reactor, a non-blocking client socket, and an
//! incremental HTTP/1.x message codec.
//!
//! These are three independent, single-threaded building blocks rather than
//! one integrated server: [`reactor::Server`] accepts and multiplexes
//! connections, [`client::ClientSocket`] drives a single outbound
//! connection's half-close state machine, and [`codec`] parses and
//! serialises HTTP/1.x messages against whatever bytes either of those
//! hands it. None of the three owns a thread or a timer; progress is made
//! entirely by the caller's own poll loop calling `poll()` repeatedly.
//!
//! ## Layout
//!
//! - [`buf`] — an owned, NUL-sentinel-terminated byte buffer.
//! - [`grammar`] — incremental RFC 7230 grammar recognisers.
//! - [`header`] — the header name/value pair and an ordered, duplicate-permitting list of them.
//! - [`status`] — canonical reason phrases for response serialisation.
//! - [`message`] — the `Request`/`Response` envelope types.
//! - [`codec`] — parsing bytes into `Request`/`Response` and serialising a response head.
//! - [`path`] — RFC 3986 absolute-path parsing and percent-encoding.
//! - [`reactor`] — the server-side non-blocking TCP reactor.
//! - [`client`] — the client-side non-blocking TCP socket.
//! - [`error`] — the crate's `Error` type.
//!
//! Out of scope: TLS, HTTP/2 or HTTP/3, chunked transfer-encoding, request
//! body streaming, and multi-threaded scheduling. See `SPEC_FULL.md` for the
//! full rationale.

pub mod buf;
pub mod client;
pub mod codec;
pub mod error;
pub mod grammar;
pub mod header;
pub mod message;
pub mod path;
pub mod reactor;
pub mod status;

pub use buf::ByteBuf;
pub use client::{ClientHandler, ClientSocket};
pub use codec::ParseOutcome;
pub use error::{Error, Result};
pub use header::{Header, HeaderList};
pub use message::{Request, Response};
pub use reactor::{ClientId, Handler, Server};
