//! The request/response wire codec: parsing incoming bytes into
//! [`Request`]/[`Response`] envelopes, and serialising a response head back
//! out to bytes.
//!
//! Parsing never returns this crate's [`crate::error::Error`] — a malformed
//! or truncated message is not an I/O failure, it's a value the caller
//! branches on. [`ParseOutcome`] is that value: it mirrors [`Progress`] but
//! is specialised to the message types and carries the consumed byte count
//! callers need in order to `splice` a `ByteBuf`.

use crate::grammar::{self, Progress};
use crate::header::HeaderList;
use crate::message::{Request, Response};
use crate::path;
use crate::status::canonical_reason;

/// The result of attempting to parse one message head out of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome<T> {
    /// A complete head was recognised; `T` is the parsed message and the
    /// `usize` is how many leading bytes of the input it consumed (callers
    /// typically pass this straight to `ByteBuf::splice`).
    Complete(usize, T),
    /// The input is a valid prefix of a message but more bytes are needed.
    Incomplete,
    /// The input can never be completed into a valid message.
    Malformed,
}

impl<T> From<Progress<T>> for ParseOutcome<T> {
    fn from(p: Progress<T>) -> ParseOutcome<T> {
        match p {
            Progress::Complete(n, v) => ParseOutcome::Complete(n, v),
            Progress::Incomplete => ParseOutcome::Incomplete,
            Progress::Bad => ParseOutcome::Malformed,
        }
    }
}

/// Parses a request line and header block:
/// `method SP request-target SP HTTP-version CRLF *(header-line) CRLF`.
///
/// The returned byte count covers only the head (through the blank line
/// terminating the headers); any bytes after that are a message body the
/// caller owns and this codec never inspects.
pub fn parse_request(input: &[u8]) -> ParseOutcome<Request> {
    let mut i = 0;

    let method = match grammar::token(&input[i..]) {
        Progress::Complete(n, m) => {
            let m = m.to_vec();
            i += n;
            m
        }
        Progress::Incomplete => return ParseOutcome::Incomplete,
        Progress::Bad => return ParseOutcome::Malformed,
    };
    match grammar::sp(&input[i..]) {
        Progress::Complete(n, ()) => i += n,
        Progress::Incomplete => return ParseOutcome::Incomplete,
        Progress::Bad => return ParseOutcome::Malformed,
    }

    // request-target, constrained to the `absolute-path` grammar the path
    // collaborator recognises (RFC 7230 §5.3.1); the target ends at the
    // first SP, which the path parser itself never consumes.
    let uri_start = i;
    let uri_len = match input[i..].iter().position(|&b| b == b' ') {
        Some(n) => n,
        None => return ParseOutcome::Incomplete,
    };
    if uri_len == 0 {
        return ParseOutcome::Malformed;
    }
    // The whole target, not just a prefix of it, must be an absolute-path:
    // the slice up to the SP we already found is never going to grow, so
    // an `Incomplete` from the path parser (a dangling `%` escape) can only
    // mean the escape is malformed here, not that more bytes are coming.
    match path::parse_absolute_path(&input[uri_start..uri_start + uri_len]) {
        Progress::Complete(n, _) if n == uri_len => {}
        _ => return ParseOutcome::Malformed,
    }
    let uri = input[uri_start..uri_start + uri_len].to_vec();
    i += uri_len;
    match grammar::sp(&input[i..]) {
        Progress::Complete(n, ()) => i += n,
        Progress::Incomplete => return ParseOutcome::Incomplete,
        Progress::Bad => return ParseOutcome::Malformed,
    }

    let version = match grammar::version(&input[i..]) {
        Progress::Complete(n, v) => {
            let v = v.to_vec();
            i += n;
            v
        }
        Progress::Incomplete => return ParseOutcome::Incomplete,
        Progress::Bad => return ParseOutcome::Malformed,
    };
    match grammar::newline(&input[i..]) {
        Progress::Complete(n, ()) => i += n,
        Progress::Incomplete => return ParseOutcome::Incomplete,
        Progress::Bad => return ParseOutcome::Malformed,
    }

    let headers = match parse_headers(&input[i..]) {
        ParseOutcome::Complete(n, h) => {
            i += n;
            h
        }
        ParseOutcome::Incomplete => return ParseOutcome::Incomplete,
        ParseOutcome::Malformed => return ParseOutcome::Malformed,
    };

    let request = Request {
        method: String::from_utf8_lossy(&method).into_owned(),
        uri: String::from_utf8_lossy(&uri).into_owned(),
        version: String::from_utf8_lossy(&version).into_owned(),
        headers,
    };
    ParseOutcome::Complete(i, request)
}

/// Parses a status line and header block:
/// `HTTP-version SP status-code SP reason-phrase CRLF *(header-line) CRLF`.
pub fn parse_response(input: &[u8]) -> ParseOutcome<Response> {
    let mut i = 0;

    let version = match grammar::version(&input[i..]) {
        Progress::Complete(n, v) => {
            let v = v.to_vec();
            i += n;
            v
        }
        Progress::Incomplete => return ParseOutcome::Incomplete,
        Progress::Bad => return ParseOutcome::Malformed,
    };
    match grammar::sp(&input[i..]) {
        Progress::Complete(n, ()) => i += n,
        Progress::Incomplete => return ParseOutcome::Incomplete,
        Progress::Bad => return ParseOutcome::Malformed,
    }

    let status = match grammar::status_code(&input[i..]) {
        Progress::Complete(n, code) => {
            i += n;
            code
        }
        Progress::Incomplete => return ParseOutcome::Incomplete,
        Progress::Bad => return ParseOutcome::Malformed,
    };
    match grammar::sp(&input[i..]) {
        Progress::Complete(n, ()) => i += n,
        Progress::Incomplete => return ParseOutcome::Incomplete,
        Progress::Bad => return ParseOutcome::Malformed,
    }

    // reason-phrase is itself a text_line: VCHAR/SP/HTAB run to CRLF.
    match grammar::text_line(&input[i..]) {
        Progress::Complete(n, _reason) => i += n,
        Progress::Incomplete => return ParseOutcome::Incomplete,
        Progress::Bad => return ParseOutcome::Malformed,
    }

    let headers = match parse_headers(&input[i..]) {
        ParseOutcome::Complete(n, h) => {
            i += n;
            h
        }
        ParseOutcome::Incomplete => return ParseOutcome::Incomplete,
        ParseOutcome::Malformed => return ParseOutcome::Malformed,
    };

    let response = Response {
        version: String::from_utf8_lossy(&version).into_owned(),
        status,
        headers,
        body: None,
    };
    ParseOutcome::Complete(i, response)
}

/// `*(header-line) CRLF` — zero or more header lines followed by the blank
/// line that ends the head.
fn parse_headers(input: &[u8]) -> ParseOutcome<HeaderList> {
    let mut i = 0;
    let mut headers = HeaderList::new();
    loop {
        if let Progress::Complete(n, ()) = grammar::newline(&input[i..]) {
            return ParseOutcome::Complete(i + n, headers);
        }
        match grammar::header_line(&input[i..]) {
            Progress::Complete(n, (name, value)) => {
                headers.set(
                    String::from_utf8_lossy(&name).into_owned(),
                    String::from_utf8_lossy(&value).into_owned(),
                );
                i += n;
            }
            Progress::Incomplete => return ParseOutcome::Incomplete,
            Progress::Bad => return ParseOutcome::Malformed,
        }
    }
}

/// Serialises a response's status line and headers (not the body) into
/// `out`, in the wire format `parse_response` accepts.
///
/// The reason phrase is looked up from `status::canonical_reason`; callers
/// who need a custom phrase should write the status line themselves.
pub fn serialize_response_head(response: &Response, out: &mut Vec<u8>) {
    out.extend_from_slice(response.version.as_bytes());
    out.push(b' ');
    let mut code_buf = itoa::Buffer::new();
    let code = code_buf.format(response.status);
    // Zero-pad to the three digits `status-code` requires (RFC 7230 §3.1.2);
    // `itoa` never pads on its own.
    for _ in code.len()..3 {
        out.push(b'0');
    }
    out.extend_from_slice(code.as_bytes());
    out.push(b' ');
    out.extend_from_slice(canonical_reason(response.status).as_bytes());
    out.extend_from_slice(b"\r\n");
    for header in response.headers.iter() {
        out.extend_from_slice(header.name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(header.value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}
