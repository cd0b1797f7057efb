//! The non-blocking client socket: a single outbound TCP connection driven
//! by repeated, non-blocking calls to [`ClientSocket::poll`].
//!
//! Unlike the server reactor, a client socket owns its own `mio::Poll` — it
//! is a standalone connection, not one of many sharing a registry, exactly
//! as `tcp_socket_t` in the C source owns its own `struct pollfd`.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd};
use std::time::Duration;

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Socket, Type};

use crate::buf::ByteBuf;
use crate::error::{Error, Result};

const DEFAULT_CHUNK_SIZE: usize = 1024;
const STREAM_TOKEN: Token = Token(0);

/// The callback set invoked by [`ClientSocket::poll`].
///
/// `on_drain` has a default no-op body: most handlers that never call
/// [`ClientSocket::write`] don't need to implement it.
pub trait ClientHandler {
    fn on_connect(&mut self, socket: &mut ClientSocket);
    fn on_read(&mut self, socket: &mut ClientSocket, data: &[u8]);
    /// The peer has half-closed (sent FIN); our write side is still open.
    fn on_end(&mut self, socket: &mut ClientSocket);
    /// Both directions are now closed; the file descriptor has been closed.
    fn on_close(&mut self, socket: &mut ClientSocket);
    fn on_error(&mut self, socket: &mut ClientSocket, err: io::Error);
    /// The outbound write queue has just become empty.
    fn on_drain(&mut self, _socket: &mut ClientSocket) {}
}

/// A single non-blocking outbound TCP connection and its half-close state
/// machine, mirroring `tcp_socket_t`'s `connected` / `open_read` /
/// `open_write` fields.
pub struct ClientSocket {
    mio_poll: Poll,
    events: Events,
    stream: TcpStream,
    connected: bool,
    open_read: bool,
    open_write: bool,
    write_queue: VecDeque<ByteBuf>,
}

impl std::fmt::Debug for ClientSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSocket")
            .field("connected", &self.connected)
            .field("open_read", &self.open_read)
            .field("open_write", &self.open_write)
            .field("queued_writes", &self.write_queue.len())
            .finish()
    }
}

impl ClientSocket {
    /// Creates a non-blocking socket and starts connecting to `addr`.
    ///
    /// `SO_LINGER` is set to a zero timeout and `SO_REUSEADDR` is set before
    /// `connect`, as `tcp_socket_create` does with raw `setsockopt` calls.
    /// Connection completion (or failure) is only observable through
    /// [`poll`](ClientSocket::poll), since `connect` on a non-blocking
    /// socket returns immediately with `EINPROGRESS`.
    pub fn connect(addr: SocketAddr) -> Result<ClientSocket> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)
            .map_err(Error::new_connect)?;
        socket.set_nonblocking(true).map_err(Error::new_connect)?;
        socket.set_reuse_address(true).map_err(Error::new_connect)?;
        socket
            .set_linger(Some(Duration::ZERO))
            .map_err(Error::new_connect)?;

        match socket.connect(&addr.into()) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
            Err(e) => return Err(Error::new_connect(e)),
        }

        let std_stream = unsafe { std::net::TcpStream::from_raw_fd(socket.into_raw_fd()) };
        let mut stream = TcpStream::from_std(std_stream);
        let mut mio_poll = Poll::new().map_err(Error::new_connect)?;
        mio_poll
            .registry()
            .register(
                &mut stream,
                STREAM_TOKEN,
                Interest::READABLE | Interest::WRITABLE,
            )
            .map_err(Error::new_connect)?;

        Ok(ClientSocket {
            mio_poll,
            events: Events::with_capacity(4),
            stream,
            connected: false,
            open_read: false,
            open_write: false,
            write_queue: VecDeque::new(),
        })
    }

    /// Runs one non-blocking pass: detects connection completion, surfaces
    /// any pending socket error, drains readable bytes, and drains the
    /// write queue. Never blocks.
    pub fn poll<H: ClientHandler>(&mut self, handler: &mut H) -> Result<()> {
        self.mio_poll
            .poll(&mut self.events, Some(Duration::ZERO))
            .map_err(Error::new_io)?;

        if !self.connected && self.stream.peer_addr().is_ok() {
            self.connected = true;
            self.open_read = true;
            self.open_write = true;
            handler.on_connect(self);
        }

        if let Some(err) = self.take_socket_error()? {
            handler.on_error(self, err);
        }

        if self.connected && self.open_read {
            self.drain_readable(handler);
        }

        if self.connected && !self.write_queue.is_empty() {
            self.drain_writable(handler)?;
        }

        Ok(())
    }

    /// Attempts to write `data` to the peer immediately. Any unwritten tail
    /// (including the whole payload, on `WouldBlock` or another write error)
    /// is appended to the internal write queue and drained on a later
    /// writable readiness, at which point `on_drain` fires once the queue
    /// empties.
    ///
    /// Returns `true` iff the whole payload went out synchronously — mirrors
    /// `tcp_socket_write`'s contract in the source, which never blocks.
    pub fn write(&mut self, data: &[u8]) -> bool {
        if data.is_empty() {
            return true;
        }
        if !self.write_queue.is_empty() {
            self.write_queue.push_back(ByteBuf::from_slice(data));
            return false;
        }
        match self.stream.write(data) {
            Ok(n) if n == data.len() => true,
            Ok(n) => {
                self.write_queue.push_back(ByteBuf::from_slice(&data[n..]));
                false
            }
            Err(_) => {
                // WouldBlock or a hard error: queue the whole payload. A
                // hard error surfaces through `on_error` on the next poll's
                // `SO_ERROR` check rather than being reported here.
                self.write_queue.push_back(ByteBuf::from_slice(data));
                false
            }
        }
    }

    /// Half-closes the write side (`shutdown(SHUT_WR)`). If the read side
    /// is already closed, this also closes the file descriptor and fires
    /// `on_close`.
    pub fn end<H: ClientHandler>(&mut self, handler: &mut H) {
        if self.open_write {
            let _ = self.stream.shutdown(std::net::Shutdown::Write);
            self.open_write = false;
        }
        if !self.open_read {
            let _ = self.mio_poll.registry().deregister(&mut self.stream);
            handler.on_close(self);
        }
    }

    /// True once the handshake has completed and `on_connect` has fired.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// True if a write via [`write`](ClientSocket::write) is still
    /// meaningful (the write side has not been shut down).
    pub fn is_writable(&self) -> bool {
        self.open_write
    }

    fn take_socket_error(&self) -> Result<Option<io::Error>> {
        let fd = self.stream.as_raw_fd();
        let mut err: libc::c_int = 0;
        let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
        let res = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut err as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        };
        if res != 0 {
            return Err(Error::new_io(io::Error::last_os_error()));
        }
        if err == 0 {
            Ok(None)
        } else {
            Ok(Some(io::Error::from_raw_os_error(err)))
        }
    }

    fn drain_readable<H: ClientHandler>(&mut self, handler: &mut H) {
        let mut chunk = [0u8; DEFAULT_CHUNK_SIZE];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.open_read = false;
                    if self.open_write {
                        handler.on_end(self);
                    } else {
                        let _ = self.mio_poll.registry().deregister(&mut self.stream);
                        handler.on_close(self);
                    }
                    return;
                }
                Ok(n) => handler.on_read(self, &chunk[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    handler.on_error(self, e);
                    return;
                }
            }
        }
    }

    fn drain_writable<H: ClientHandler>(&mut self, handler: &mut H) -> Result<()> {
        while let Some(front) = self.write_queue.front_mut() {
            match self.stream.write(front.as_bytes()) {
                Ok(n) if n == front.len() => {
                    self.write_queue.pop_front();
                }
                Ok(n) => {
                    front.splice(n);
                    break;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(Error::new_io(e)),
            }
        }
        if self.write_queue.is_empty() {
            handler.on_drain(self);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener as StdTcpListener;

    #[derive(Default)]
    struct Observed {
        connected: bool,
        ended: bool,
        closed: bool,
        drained: bool,
        reads: Vec<Vec<u8>>,
    }

    impl ClientHandler for Observed {
        fn on_connect(&mut self, _socket: &mut ClientSocket) {
            self.connected = true;
        }

        fn on_read(&mut self, _socket: &mut ClientSocket, data: &[u8]) {
            self.reads.push(data.to_vec());
        }

        fn on_end(&mut self, _socket: &mut ClientSocket) {
            self.ended = true;
        }

        fn on_close(&mut self, _socket: &mut ClientSocket) {
            self.closed = true;
        }

        fn on_error(&mut self, _socket: &mut ClientSocket, _err: io::Error) {}

        fn on_drain(&mut self, _socket: &mut ClientSocket) {
            self.drained = true;
        }
    }

    #[test]
    fn connects_reads_and_observes_peer_fin_as_on_end() {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = ClientSocket::connect(addr).unwrap();
        let mut observed = Observed::default();

        let mut accepted = None;
        for _ in 0..50 {
            client.poll(&mut observed).unwrap();
            if let Ok((stream, _)) = listener.accept() {
                accepted = Some(stream);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let mut server_side = accepted.expect("listener never observed the connect");
        server_side.set_nonblocking(false).unwrap();

        for _ in 0..50 {
            client.poll(&mut observed).unwrap();
            if observed.connected {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(observed.connected);

        server_side.write_all(b"hello").unwrap();
        for _ in 0..50 {
            client.poll(&mut observed).unwrap();
            if !observed.reads.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(observed.reads, vec![b"hello".to_vec()]);

        drop(server_side);
        for _ in 0..50 {
            client.poll(&mut observed).unwrap();
            if observed.ended {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(observed.ended, "peer FIN should surface as on_end, not on_close, while our write side is open");
        assert!(!observed.closed);
    }
}
