//! Loopback integration tests for `ClientSocket`: connect/write/read against
//! a real `std::net::TcpListener` peer, checking the half-close ordering
//! (`on_end` before `on_close`, never the other way around) from a single
//! thread.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::Duration;

use evhttp::client::{ClientHandler, ClientSocket};

#[derive(Default)]
struct Observed {
    connected: bool,
    reads: Vec<Vec<u8>>,
    ended: bool,
    closed: bool,
    drained: bool,
}

impl ClientHandler for Observed {
    fn on_connect(&mut self, _socket: &mut ClientSocket) {
        self.connected = true;
    }

    fn on_read(&mut self, _socket: &mut ClientSocket, data: &[u8]) {
        self.reads.push(data.to_vec());
    }

    fn on_end(&mut self, _socket: &mut ClientSocket) {
        assert!(!self.closed, "on_close must not have fired before on_end");
        self.ended = true;
    }

    fn on_close(&mut self, _socket: &mut ClientSocket) {
        assert!(self.ended, "on_close without a preceding on_end on a clean half-close");
        self.closed = true;
    }

    fn on_error(&mut self, _socket: &mut ClientSocket, _err: std::io::Error) {}

    fn on_drain(&mut self, _socket: &mut ClientSocket) {
        self.drained = true;
    }
}

fn poll_until(socket: &mut ClientSocket, handler: &mut Observed, mut condition: impl FnMut(&Observed) -> bool) -> bool {
    for _ in 0..200 {
        socket.poll(handler).unwrap();
        if condition(handler) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn connect_write_read_and_half_close_ordering() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut socket = ClientSocket::connect(addr).unwrap();
    let mut handler = Observed::default();

    let mut peer = None;
    for _ in 0..200 {
        socket.poll(&mut handler).unwrap();
        if let Ok((stream, _)) = listener.accept() {
            peer = Some(stream);
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    let mut peer = peer.expect("listener never observed the connect attempt");
    peer.set_nonblocking(false).unwrap();
    peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    assert!(
        poll_until(&mut socket, &mut handler, |h| h.connected),
        "on_connect never fired"
    );

    // A small payload fits in the socket's send buffer and should go out
    // synchronously: `write` returns `true` and nothing is queued, so
    // `on_drain` never fires for it.
    assert!(socket.write(b"ping"), "a 4-byte write should complete synchronously");
    assert!(!handler.drained, "on_drain must not fire for a write that never queued anything");

    let mut buf = [0u8; 16];
    let n = peer.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"ping");

    peer.write_all(b"pong").unwrap();
    assert!(
        poll_until(&mut socket, &mut handler, |h| !h.reads.is_empty()),
        "client never observed the peer's reply"
    );
    assert_eq!(handler.reads, vec![b"pong".to_vec()]);

    // A payload too large for the socket buffer to absorb synchronously
    // should be queued, with `on_drain` firing once `poll` has drained it
    // all. Read the peer side nonblockingly so the client's own queue can
    // keep draining instead of stalling on a full kernel buffer.
    peer.set_nonblocking(true).unwrap();
    let payload = vec![b'z'; 4 * 1024 * 1024];
    assert!(
        !socket.write(&payload),
        "a multi-megabyte write should not fit in the socket buffer synchronously"
    );

    let mut received = 0usize;
    let mut scratch = [0u8; 65536];
    let mut drained = false;
    for _ in 0..2000 {
        socket.poll(&mut handler).unwrap();
        loop {
            match peer.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => received += n,
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("unexpected read error: {}", e),
            }
        }
        if handler.drained {
            drained = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(drained, "on_drain never fired after queuing a large write");
    assert_eq!(received, payload.len(), "not all queued bytes reached the peer");

    // Half-close from the peer side: client should see on_end (not
    // on_close) while its own write side is still open.
    peer.shutdown(std::net::Shutdown::Write).unwrap();
    assert!(
        poll_until(&mut socket, &mut handler, |h| h.ended),
        "on_end never fired for a peer FIN"
    );
    assert!(!handler.closed, "a half-closed peer must not trigger on_close by itself");

    // Ending our own write side after the peer's FIN should complete the
    // close and fire on_close exactly once.
    socket.end(&mut handler);
    assert!(handler.closed, "ending the write side after a peer FIN should fire on_close");
}
