//! The request and response message types the codec parses into and
//! serialises out of.

use crate::buf::ByteBuf;
use crate::header::HeaderList;

/// A parsed (or to-be-serialised) HTTP request. The codec only ever
/// populates the envelope — method, target, version, and headers. The body,
/// if any, is the untouched remainder of the input buffer (see `codec`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: HeaderList,
}

impl Request {
    pub fn new() -> Request {
        Request::default()
    }
}

/// An HTTP response head plus optional body bytes.
#[derive(Debug, Clone)]
pub struct Response {
    pub version: String,
    pub status: u16,
    pub headers: HeaderList,
    pub body: Option<ByteBuf>,
}

impl Default for Response {
    fn default() -> Response {
        Response {
            version: "HTTP/1.1".to_owned(),
            status: 200,
            headers: HeaderList::new(),
            body: None,
        }
    }
}

impl Response {
    pub fn new() -> Response {
        Response::default()
    }
}
