//! A minimal HTTP/1.x server: parses one request per read, always replies
//! with an empty 200 body, and implements the version/keep-alive dispatch
//! from the system this crate's codec was built to serve:
//!
//! - Unknown version (neither `HTTP/1.0` nor `HTTP/1.1`): reply `505`,
//!   `Content-Length: 0`, and leave the connection open.
//! - `HTTP/1.0`: keep the connection open only if the request carried
//!   `Connection: keep-alive`; otherwise reply `Connection: close` and
//!   close the connection after writing the response.
//! - `HTTP/1.1`: keep the connection open unless the request carried
//!   `Connection: close`.

use evhttp::codec::{self, ParseOutcome};
use evhttp::reactor::{ClientId, Handler, Server};
use evhttp::{ByteBuf, Response};

const PORT: u16 = 8000;
const BACKLOG: i32 = 16;

#[derive(Default)]
struct Connection {
    read_buf: ByteBuf,
}

struct HttpDemo;

impl HttpDemo {
    fn respond(&self, server: &mut Server<Connection>, id: ClientId, response: &Response) {
        let mut head = Vec::new();
        codec::serialize_response_head(response, &mut head);
        let _ = server.write_client(id, &head);
    }
}

impl Handler<Connection> for HttpDemo {
    fn on_connect(&mut self, _server: &mut Server<Connection>, id: ClientId) {
        log::info!("{:?} connected", id);
    }

    fn on_close(&mut self, _server: &mut Server<Connection>, id: ClientId) {
        log::info!("{:?} disconnected", id);
    }

    fn on_read(&mut self, server: &mut Server<Connection>, id: ClientId, data: &[u8]) {
        if let Some(conn) = server.client_data_mut(id) {
            conn.read_buf.append(data);
        }

        loop {
            let input = match server.client_data(id) {
                Some(conn) => conn.read_buf.as_bytes().to_vec(),
                None => return,
            };

            let request = match codec::parse_request(&input) {
                ParseOutcome::Complete(consumed, request) => {
                    if let Some(conn) = server.client_data_mut(id) {
                        conn.read_buf.splice(consumed);
                    }
                    request
                }
                ParseOutcome::Incomplete => return,
                ParseOutcome::Malformed => {
                    log::warn!("{:?} sent a malformed request", id);
                    server.close_client(id);
                    return;
                }
            };

            log::info!("{:?} {} {}", id, request.method, request.uri);

            let mut response = Response::new();
            let close = match request.version.as_str() {
                "HTTP/1.0" => {
                    let keep_alive = request.headers.get("connection") == Some("keep-alive");
                    if keep_alive {
                        response.headers.set("Connection", "keep-alive");
                        response.headers.set("Content-Length", "0");
                        false
                    } else {
                        response.headers.set("Connection", "close");
                        true
                    }
                }
                "HTTP/1.1" => {
                    let close = request.headers.get("connection") == Some("close");
                    if close {
                        response.headers.set("Connection", "close");
                    } else {
                        response.headers.set("Connection", "keep-alive");
                        response.headers.set("Content-Length", "0");
                    }
                    close
                }
                _ => {
                    response.status = 505;
                    response.headers.set("Content-Length", "0");
                    false
                }
            };

            self.respond(server, id, &response);
            if close {
                server.close_client(id);
                return;
            }
        }
    }

    fn on_error(&mut self, _server: &mut Server<Connection>, id: ClientId, err: std::io::Error) {
        log::warn!("{:?} failed: {}", id, err);
    }
}

fn main() {
    env_logger::init();

    let mut server: Server<Connection> = Server::new().expect("failed to create reactor");
    server
        .listen(([0, 0, 0, 0], PORT).into(), BACKLOG)
        .expect("failed to listen");
    log::info!("listening on port {}", PORT);

    let mut handler = HttpDemo;
    loop {
        if let Err(e) = server.poll(&mut handler) {
            log::error!("poll error: {}", e);
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}
