//! The crate's error type.
//!
//! Codec outcomes that are part of ordinary control flow (`Incomplete`,
//! `Malformed`) are not represented here — see [`crate::codec::ParseOutcome`].
//! This type is reserved for exceptional, non-retryable conditions: socket
//! setup failures, I/O errors, and connect failures.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// A specialized `Result` for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// An error produced by the reactor, the client socket, or socket setup.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Failed to create, bind, or listen on the server's socket.
    Listen,
    /// Failed to accept an incoming connection.
    Accept,
    /// Failed to create or connect a client socket.
    Connect,
    /// An I/O error occurred while reading or writing a connection.
    Io,
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(crate) fn with<C: Into<Cause>>(mut self, cause: C) -> Error {
        self.inner.cause = Some(cause.into());
        self
    }

    pub(crate) fn new_listen<C: Into<Cause>>(cause: C) -> Error {
        Error::new(Kind::Listen).with(cause)
    }

    pub(crate) fn new_accept<C: Into<Cause>>(cause: C) -> Error {
        Error::new(Kind::Accept).with(cause)
    }

    pub(crate) fn new_connect<C: Into<Cause>>(cause: C) -> Error {
        Error::new(Kind::Connect).with(cause)
    }

    pub(crate) fn new_io(cause: io::Error) -> Error {
        Error::new(Kind::Io).with(cause)
    }

    /// Returns true if this error happened while setting up the listener.
    pub fn is_listen(&self) -> bool {
        matches!(self.inner.kind, Kind::Listen)
    }

    /// Returns true if this error happened while connecting a client socket.
    pub fn is_connect(&self) -> bool {
        matches!(self.inner.kind, Kind::Connect)
    }

    fn description(&self) -> &str {
        match self.inner.kind {
            Kind::Listen => "error creating or binding the listening socket",
            Kind::Accept => "error accepting a connection",
            Kind::Connect => "error connecting to remote host",
            Kind::Io => "connection I/O error",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("evhttp::Error");
        f.field(&self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            f.field(cause);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref cause) = self.inner.cause {
            write!(f, "{}: {}", self.description(), cause)
        } else {
            f.write_str(self.description())
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|cause| &**cause as &(dyn StdError + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::new_io(err)
    }
}
