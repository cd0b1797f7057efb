//! The non-blocking server reactor: accepts connections on a listening
//! socket and multiplexes readiness across them with a single `mio::Poll`.
//!
//! Closing a client during its own `on_read` callback is a common and
//! supported pattern. `close_client` deregisters the socket and fires
//! `on_close` immediately, but defers the client's *removal* from the
//! registry until the next call to [`Server::poll`] — mirroring
//! `tcp_server_poll`'s `remove_closed_clients`, which runs at the top of
//! every poll rather than while the event array is still being iterated.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::os::unix::io::{FromRawFd, IntoRawFd};
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Socket, Type};

use crate::error::{Error, Result};

const DEFAULT_CHUNK_SIZE: usize = 1024;
const LISTENER_TOKEN: Token = Token(0);

/// A stable identifier for a connected client, valid until that client's
/// `on_close` callback has run. Indexes into the server's internal
/// registry; never a raw pointer or file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(usize);

struct ClientRecord<T> {
    stream: mio::net::TcpStream,
    token: Token,
    closed: bool,
    data: T,
}

/// The callback set invoked by [`Server::poll`], one method per event.
///
/// Mirrors the C source's `tcp_connect_cb` / `tcp_close_cb` / `tcp_read_cb` /
/// `tcp_error_cb` quartet, as trait methods instead of function pointers.
pub trait Handler<T> {
    fn on_connect(&mut self, server: &mut Server<T>, id: ClientId);
    fn on_close(&mut self, server: &mut Server<T>, id: ClientId);
    fn on_read(&mut self, server: &mut Server<T>, id: ClientId, data: &[u8]);
    fn on_error(&mut self, server: &mut Server<T>, id: ClientId, err: io::Error);
}

/// A non-blocking TCP reactor, generic over `T`, the per-connection
/// application state a handler wants attached to each client.
///
/// `T` replaces the C source's opaque `void *data` pointer: instead of a
/// type-erased pointer set after the fact, every client carries a `T`
/// constructed with `Default` at accept time.
pub struct Server<T> {
    listener: Option<TcpListener>,
    mio_poll: Poll,
    events: Events,
    clients: Vec<Option<ClientRecord<T>>>,
    tokens: HashMap<Token, ClientId>,
    next_token: usize,
    pending_closed: Vec<ClientId>,
    pending_compaction: bool,
}

impl<T> std::fmt::Debug for Server<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listening", &self.listener.is_some())
            .field("clients", &self.clients.len())
            .finish()
    }
}

impl<T: Default> Server<T> {
    /// Creates a server with no listening socket yet; call [`listen`] to
    /// bind one before the first [`poll`].
    ///
    /// [`listen`]: Server::listen
    /// [`poll`]: Server::poll
    pub fn new() -> Result<Server<T>> {
        Ok(Server {
            listener: None,
            mio_poll: Poll::new().map_err(Error::new_listen)?,
            events: Events::with_capacity(128),
            clients: Vec::new(),
            tokens: HashMap::new(),
            next_token: 1,
            pending_closed: Vec::new(),
            pending_compaction: false,
        })
    }

    /// Binds and listens on `addr`, setting `SO_REUSEADDR` before `bind`
    /// exactly as `tcp_server_listen` does with a raw `setsockopt`.
    pub fn listen(&mut self, addr: SocketAddr, backlog: i32) -> Result<()> {
        let socket =
            Socket::new(Domain::for_address(addr), Type::STREAM, None).map_err(Error::new_listen)?;
        socket.set_reuse_address(true).map_err(Error::new_listen)?;
        socket.set_nonblocking(true).map_err(Error::new_listen)?;
        socket.bind(&addr.into()).map_err(Error::new_listen)?;
        socket.listen(backlog).map_err(Error::new_listen)?;

        let std_listener = unsafe { std::net::TcpListener::from_raw_fd(socket.into_raw_fd()) };
        let mut listener = TcpListener::from_std(std_listener);
        self.mio_poll
            .registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(Error::new_listen)?;
        self.listener = Some(listener);
        Ok(())
    }

    /// Runs one non-blocking pass: accepts any pending connections, reads
    /// any readable clients, and fires `on_close` for clients closed during
    /// this or a prior pass. Never blocks — the underlying `mio::Poll::poll`
    /// is always called with a zero timeout.
    pub fn poll<H: Handler<T>>(&mut self, handler: &mut H) -> Result<()> {
        self.compact_closed();

        self.mio_poll
            .poll(&mut self.events, Some(Duration::ZERO))
            .map_err(Error::new_io)?;
        let ready: Vec<Token> = self.events.iter().map(|e| e.token()).collect();

        for token in ready {
            if token == LISTENER_TOKEN {
                self.accept(handler);
            } else if let Some(&id) = self.tokens.get(&token) {
                self.readable(handler, id);
            }
        }

        self.fire_pending_closes(handler);
        Ok(())
    }

    /// Closes a client: deregisters its socket and fires `on_close`
    /// immediately. The client's slot in the registry is reclaimed lazily,
    /// at the start of the next `poll` call.
    pub fn close_client(&mut self, id: ClientId) {
        if let Some(Some(rec)) = self.clients.get_mut(id.0) {
            if !rec.closed {
                let _ = self.mio_poll.registry().deregister(&mut rec.stream);
                rec.closed = true;
                self.pending_closed.push(id);
            }
        }
    }

    /// Closes every still-open client, firing `on_close` for each.
    pub fn destroy<H: Handler<T>>(mut self, handler: &mut H) {
        let open: Vec<ClientId> = self
            .clients
            .iter()
            .enumerate()
            .filter_map(|(i, c)| match c {
                Some(rec) if !rec.closed => Some(ClientId(i)),
                _ => None,
            })
            .collect();
        for id in open {
            self.close_client(id);
        }
        self.fire_pending_closes(handler);
    }

    /// The per-connection application state attached to `id`, if it is
    /// still a live client.
    pub fn client_data(&self, id: ClientId) -> Option<&T> {
        self.clients.get(id.0)?.as_ref().map(|rec| &rec.data)
    }

    /// Mutable access to the per-connection application state attached to
    /// `id`, if it is still a live client.
    pub fn client_data_mut(&mut self, id: ClientId) -> Option<&mut T> {
        self.clients.get_mut(id.0)?.as_mut().map(|rec| &mut rec.data)
    }

    /// Writes `data` directly to a client's socket. There is no write
    /// queue on the server side, matching the C source, which never buffers
    /// partial writes for accepted connections — a short write silently
    /// drops the remainder, same as `write(2)`'s own contract.
    pub fn write_client(&mut self, id: ClientId, data: &[u8]) -> io::Result<usize> {
        match self.clients.get_mut(id.0) {
            Some(Some(rec)) if !rec.closed => rec.stream.write(data),
            _ => Ok(0),
        }
    }

    fn accept<H: Handler<T>>(&mut self, handler: &mut H) {
        loop {
            let accepted = match self.listener.as_mut() {
                Some(listener) => listener.accept(),
                None => return,
            };
            match accepted {
                Ok((mut stream, _peer)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(e) =
                        self.mio_poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        log::warn!("failed to register accepted connection: {}", e);
                        continue;
                    }
                    let id = ClientId(self.clients.len());
                    self.tokens.insert(token, id);
                    self.clients.push(Some(ClientRecord {
                        stream,
                        token,
                        closed: false,
                        data: T::default(),
                    }));
                    handler.on_connect(self, id);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("accept failed: {}", e);
                    break;
                }
            }
        }
    }

    fn readable<H: Handler<T>>(&mut self, handler: &mut H, id: ClientId) {
        let mut chunk = [0u8; DEFAULT_CHUNK_SIZE];
        loop {
            let read = match self.clients.get_mut(id.0) {
                Some(Some(rec)) if !rec.closed => rec.stream.read(&mut chunk),
                _ => return,
            };
            match read {
                Ok(0) => {
                    self.close_client(id);
                    return;
                }
                Ok(n) => handler.on_read(self, id, &chunk[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    handler.on_error(self, id, e);
                    self.close_client(id);
                    return;
                }
            }
        }
    }

    fn fire_pending_closes<H: Handler<T>>(&mut self, handler: &mut H) {
        let pending = std::mem::take(&mut self.pending_closed);
        self.pending_compaction = self.pending_compaction || !pending.is_empty();
        for id in pending {
            handler.on_close(self, id);
        }
    }

    fn compact_closed(&mut self) {
        if !self.pending_compaction {
            return;
        }
        for slot in self.clients.iter_mut() {
            if matches!(slot, Some(rec) if rec.closed) {
                if let Some(rec) = slot.take() {
                    self.tokens.remove(&rec.token);
                }
            }
        }
        self.pending_compaction = false;
    }
}
