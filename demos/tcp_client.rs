//! A minimal TCP ping client: connects, writes `"ping"`, logs whatever it
//! reads back, and half-closes as soon as the peer does.

use evhttp::client::{ClientHandler, ClientSocket};

const HOST: [u8; 4] = [127, 0, 0, 1];
const PORT: u16 = 8000;

struct Ping;

impl ClientHandler for Ping {
    fn on_connect(&mut self, socket: &mut ClientSocket) {
        log::info!("connected");
        socket.write(b"ping");
    }

    fn on_read(&mut self, _socket: &mut ClientSocket, data: &[u8]) {
        log::info!("read {:?}", String::from_utf8_lossy(data));
    }

    fn on_end(&mut self, socket: &mut ClientSocket) {
        log::info!("peer half-closed");
        socket.end(self);
    }

    fn on_close(&mut self, _socket: &mut ClientSocket) {
        log::info!("closed");
    }

    fn on_error(&mut self, _socket: &mut ClientSocket, err: std::io::Error) {
        log::warn!("error: {}", err);
    }
}

fn main() {
    env_logger::init();

    let addr = (HOST, PORT).into();
    let mut socket = ClientSocket::connect(addr).expect("failed to start connecting");
    let mut handler = Ping;

    loop {
        if let Err(e) = socket.poll(&mut handler) {
            log::error!("poll error: {}", e);
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}
