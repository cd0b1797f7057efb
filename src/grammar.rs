//! Incremental RFC 7230 grammar recognisers.
//!
//! Every recogniser here takes a byte slice and returns a [`Progress`]: it
//! never consumes past what it accepts, and distinguishes "need more bytes"
//! from "this can never be valid" so the caller can tell an in-progress read
//! from a malformed message.

/// The outcome of trying to recognise a grammar production against a
/// (possibly truncated) byte slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress<T> {
    /// Recognised `T`, consuming this many bytes of the input.
    Complete(usize, T),
    /// Input so far is a valid prefix, but more bytes are needed.
    Incomplete,
    /// Input can never be completed into a valid production.
    Bad,
}

impl<T> Progress<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Progress<U> {
        match self {
            Progress::Complete(n, v) => Progress::Complete(n, f(v)),
            Progress::Incomplete => Progress::Incomplete,
            Progress::Bad => Progress::Bad,
        }
    }
}

/// `tchar`, RFC 7230 §3.2.6.
pub fn is_tchar(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'*' | b'+' | b'-' | b'.' | b'^'
        | b'_' | b'`' | b'|' | b'~' | b'\'') || b.is_ascii_alphanumeric()
}

/// `VCHAR`, RFC 5234 B.1: printable US-ASCII.
pub fn is_vchar(b: u8) -> bool {
    (0x21..=0x7E).contains(&b)
}

/// `obs-text`, RFC 7230 §3.2.6.
pub fn is_obs_text(b: u8) -> bool {
    (0x80..=0xFF).contains(&b)
}

const SP: u8 = 0x20;
const HTAB: u8 = 0x09;

/// One or more `tchar`s (RFC 7230 §3.2.6 `token`).
pub fn token(input: &[u8]) -> Progress<&[u8]> {
    if input.is_empty() {
        return Progress::Incomplete;
    }
    if !is_tchar(input[0]) {
        return Progress::Bad;
    }
    let n = input.iter().take_while(|&&b| is_tchar(b)).count();
    if n == input.len() {
        // The whole buffer is tchars — we cannot yet tell whether the token
        // has ended or more tchars are coming.
        return Progress::Incomplete;
    }
    Progress::Complete(n, &input[..n])
}

/// A single space character (RFC 7230 `SP`).
pub fn sp(input: &[u8]) -> Progress<()> {
    match input.first() {
        None => Progress::Incomplete,
        Some(&SP) => Progress::Complete(1, ()),
        Some(_) => Progress::Bad,
    }
}

/// `CRLF`, RFC 5234 B.1.
pub fn newline(input: &[u8]) -> Progress<()> {
    match input.first() {
        None => Progress::Incomplete,
        Some(b'\r') => match input.get(1) {
            None => Progress::Incomplete,
            Some(b'\n') => Progress::Complete(2, ()),
            Some(_) => Progress::Bad,
        },
        Some(_) => Progress::Bad,
    }
}

/// `HTTP-version`, RFC 7230 §2.6: `HTTP/` DIGIT `.` DIGIT, exactly 8 bytes.
pub fn version(input: &[u8]) -> Progress<&[u8]> {
    const LITERAL: &[u8] = b"HTTP/";
    let prefix_len = LITERAL.len().min(input.len());
    if input[..prefix_len] != LITERAL[..prefix_len] {
        return Progress::Bad;
    }
    if input.len() < LITERAL.len() + 3 {
        return Progress::Incomplete;
    }
    let major = input[LITERAL.len()];
    let dot = input[LITERAL.len() + 1];
    let minor = input[LITERAL.len() + 2];
    if !major.is_ascii_digit() || dot != b'.' || !minor.is_ascii_digit() {
        return Progress::Bad;
    }
    Progress::Complete(8, &input[..8])
}

/// A 3-digit status code (RFC 7230 §3.1.2 `status-code`).
pub fn status_code(input: &[u8]) -> Progress<u16> {
    if input.len() < 3 {
        return Progress::Incomplete;
    }
    if !input[..3].iter().all(u8::is_ascii_digit) {
        return Progress::Bad;
    }
    let value = (input[0] - b'0') as u16 * 100
        + (input[1] - b'0') as u16 * 10
        + (input[2] - b'0') as u16;
    Progress::Complete(3, value)
}

/// The longest run of `VCHAR / SP / HTAB / obs-text`, terminated by `CRLF`.
///
/// Used for both header field values and status-line reason phrases.
pub fn text_line(input: &[u8]) -> Progress<&[u8]> {
    let n = input
        .iter()
        .take_while(|&&b| b == SP || b == HTAB || is_vchar(b) || is_obs_text(b))
        .count();
    if input.len() - n < 2 {
        return Progress::Incomplete;
    }
    match &input[n..n + 2] {
        b"\r\n" => Progress::Complete(n + 2, &input[..n]),
        _ => Progress::Bad,
    }
}

/// A header field line: `token ":" OWS value OWS CRLF`, returning the
/// lowercased name and the whitespace-trimmed value.
pub fn header_line(input: &[u8]) -> Progress<(Vec<u8>, Vec<u8>)> {
    let (name_len, name) = match token(input) {
        Progress::Complete(n, name) => (n, name),
        Progress::Incomplete => return Progress::Incomplete,
        Progress::Bad => return Progress::Bad,
    };
    let rest = &input[name_len..];
    if rest.is_empty() {
        return Progress::Incomplete;
    }
    if rest[0] != b':' {
        return Progress::Bad;
    }
    let rest = &rest[1..];
    let (value_len, raw_value) = match text_line(rest) {
        Progress::Complete(n, v) => (n, v),
        Progress::Incomplete => return Progress::Incomplete,
        Progress::Bad => return Progress::Bad,
    };
    let value = trim_ows(raw_value).to_vec();
    let name = name.to_ascii_lowercase();
    Progress::Complete(name_len + 1 + value_len, (name, value))
}

fn trim_ows(s: &[u8]) -> &[u8] {
    let start = s.iter().take_while(|&&b| b == SP || b == HTAB).count();
    let end = s.len() - s.iter().rev().take_while(|&&b| b == SP || b == HTAB).count();
    if start >= end {
        &[]
    } else {
        &s[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_stops_at_first_non_tchar() {
        assert_eq!(token(b"GET /"), Progress::Complete(3, &b"GET"[..]));
    }

    #[test]
    fn token_empty_is_incomplete() {
        assert_eq!(token(b""), Progress::Incomplete);
    }

    #[test]
    fn token_bad_leading_byte() {
        assert_eq!(token(b" GET"), Progress::Bad);
    }

    #[test]
    fn token_whole_buffer_of_tchars_is_incomplete() {
        assert_eq!(token(b"GET"), Progress::Incomplete);
    }

    #[test]
    fn newline_bare_cr_is_incomplete() {
        assert_eq!(newline(b"\r"), Progress::Incomplete);
    }

    #[test]
    fn newline_cr_then_non_lf_is_bad() {
        assert_eq!(newline(b"\rX"), Progress::Bad);
    }

    #[test]
    fn version_partial_prefix_is_incomplete() {
        assert_eq!(version(b"HTTP/1"), Progress::Incomplete);
        assert_eq!(version(b"HTT"), Progress::Incomplete);
    }

    #[test]
    fn version_exact() {
        assert_eq!(version(b"HTTP/1.1"), Progress::Complete(8, &b"HTTP/1.1"[..]));
    }

    #[test]
    fn version_bad_literal() {
        assert_eq!(version(b"HTCP/1.1"), Progress::Bad);
    }

    #[test]
    fn header_line_lowercases_name_and_trims_value() {
        match header_line(b"Host:  x.example  \r\n") {
            Progress::Complete(n, (name, value)) => {
                assert_eq!(n, "Host:  x.example  \r\n".len());
                assert_eq!(name, b"host");
                assert_eq!(value, b"x.example");
            }
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn status_code_needs_three_digits() {
        assert_eq!(status_code(b"20"), Progress::Incomplete);
        assert_eq!(status_code(b"404 "), Progress::Complete(3, 404));
        assert_eq!(status_code(b"4a4"), Progress::Bad);
    }
}
