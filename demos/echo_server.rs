//! Minimal demonstration of `evhttp::reactor`: echoes every chunk it reads
//! back to the same client, and closes a client that sends "quit".

use evhttp::reactor::{ClientId, Handler, Server};

const PORT: u16 = 8001;
const BACKLOG: i32 = 16;

#[derive(Default)]
struct ClientState;

struct Echo;

impl Handler<ClientState> for Echo {
    fn on_connect(&mut self, _server: &mut Server<ClientState>, id: ClientId) {
        log::info!("{:?} connected", id);
    }

    fn on_close(&mut self, _server: &mut Server<ClientState>, id: ClientId) {
        log::info!("{:?} disconnected", id);
    }

    fn on_read(&mut self, server: &mut Server<ClientState>, id: ClientId, data: &[u8]) {
        if data == b"quit\n" || data == b"quit" {
            server.close_client(id);
            return;
        }
        let _ = server.write_client(id, data);
    }

    fn on_error(&mut self, _server: &mut Server<ClientState>, id: ClientId, err: std::io::Error) {
        log::warn!("{:?} error: {}", id, err);
    }
}

fn main() {
    env_logger::init();

    let mut server: Server<ClientState> = Server::new().expect("failed to create reactor");
    server
        .listen(([0, 0, 0, 0], PORT).into(), BACKLOG)
        .expect("failed to listen");
    log::info!("echo server listening on port {}", PORT);

    let mut handler = Echo;
    loop {
        if let Err(e) = server.poll(&mut handler) {
            log::error!("poll error: {}", e);
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}
