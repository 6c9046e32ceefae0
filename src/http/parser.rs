use crate::http::request::{Method, Request};
use std::collections::HashMap;
use thiserror::Error;

/// Upper bound for the request line plus headers.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Upper bound for a feedback body, however it is framed.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Upper bound for one chunk-size line, extensions included.
const MAX_CHUNK_LINE_BYTES: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("unsupported method")]
    InvalidMethod,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("unsupported Transfer-Encoding")]
    UnsupportedEncoding,
    #[error("malformed chunked body")]
    InvalidChunk,
    #[error("request exceeds size limit")]
    TooLarge,
    #[error("incomplete request")]
    Incomplete,
}

/// Parses one request from the front of `buf`.
///
/// Returns the request and the number of bytes it occupied, or
/// `ParseError::Incomplete` when more bytes are needed. Header names are
/// stored lowercased; a repeated header keeps its last value.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let headers_end = match find(buf, b"\r\n\r\n") {
        Some(end) => end,
        None if buf.len() > MAX_HEADER_BYTES => return Err(ParseError::TooLarge),
        None => return Err(ParseError::Incomplete),
    };
    let header_bytes = &buf[..headers_end];
    let body_start = headers_end + 4;

    let headers_str = std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let path = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    let mut headers = HashMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    // Transfer-Encoding wins over Content-Length when both are sent.
    let (body, body_len) = match headers.get("transfer-encoding") {
        Some(encoding) if is_chunked(encoding) => decode_chunked(&buf[body_start..])?,
        Some(_) => return Err(ParseError::UnsupportedEncoding),
        None => {
            let content_length = content_length(&headers)?;
            let available = &buf[body_start..];
            if available.len() < content_length {
                return Err(ParseError::Incomplete);
            }
            (available[..content_length].to_vec(), content_length)
        }
    };

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        body,
    };

    Ok((request, body_start + body_len))
}

fn content_length(headers: &HashMap<String, String>) -> Result<usize, ParseError> {
    let length = headers
        .get("content-length")
        .map(|v| v.parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
        .transpose()?
        .unwrap_or(0);

    if length > MAX_BODY_BYTES {
        return Err(ParseError::TooLarge);
    }
    Ok(length)
}

/// `chunked` is the only coding understood; compressed bodies are refused.
fn is_chunked(encoding: &str) -> bool {
    encoding.split(',').all(|c| c.trim().eq_ignore_ascii_case("chunked"))
}

/// Decodes a chunked body from the front of `buf`.
///
/// Returns the body and the bytes consumed, trailers included.
fn decode_chunked(buf: &[u8]) -> Result<(Vec<u8>, usize), ParseError> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let line_end = match find(&buf[pos..], b"\r\n") {
            Some(end) => pos + end,
            None if buf.len() - pos > MAX_CHUNK_LINE_BYTES => return Err(ParseError::InvalidChunk),
            None => return Err(ParseError::Incomplete),
        };

        let line = std::str::from_utf8(&buf[pos..line_end]).map_err(|_| ParseError::InvalidChunk)?;
        let size_str = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_str, 16).map_err(|_| ParseError::InvalidChunk)?;
        pos = line_end + 2;

        if size == 0 {
            // Trailer section: either an empty line or header lines ending
            // in an empty line.
            if buf[pos..].starts_with(b"\r\n") {
                return Ok((body, pos + 2));
            }
            return match find(&buf[pos..], b"\r\n\r\n") {
                Some(end) => Ok((body, pos + end + 4)),
                None if buf.len() - pos > MAX_HEADER_BYTES => Err(ParseError::TooLarge),
                None => Err(ParseError::Incomplete),
            };
        }

        if size > MAX_BODY_BYTES - body.len() {
            return Err(ParseError::TooLarge);
        }

        let data_end = pos + size;
        if buf.len() < data_end + 2 {
            return Err(ParseError::Incomplete);
        }
        if &buf[data_end..data_end + 2] != b"\r\n" {
            return Err(ParseError::InvalidChunk);
        }

        body.extend_from_slice(&buf[pos..data_end]);
        pos = data_end + 2;
    }
}

fn find(buf: &[u8], needle: &[u8]) -> Option<usize> {
    buf.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_feedback_post() {
        let req = b"POST /api/model/a/1/feedback HTTP/1.1\r\nRequest-ID: r1\r\nContent-Length: 2\r\n\r\n{}";

        let (parsed, consumed) = parse_http_request(req).unwrap();

        assert_eq!(parsed.method, Method::POST);
        assert_eq!(parsed.header("request-id"), Some("r1"));
        assert_eq!(parsed.body, b"{}".to_vec());
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn lowercase_content_length_is_honoured() {
        let req = b"POST / HTTP/1.1\r\ncontent-length: 3\r\n\r\nab";

        assert_eq!(parse_http_request(req).unwrap_err(), ParseError::Incomplete);
    }

    #[test]
    fn chunked_coding_detection() {
        assert!(is_chunked("chunked"));
        assert!(is_chunked("Chunked"));
        assert!(!is_chunked("gzip, chunked"));
        assert!(!is_chunked("gzip"));
    }

    #[test]
    fn chunked_body_with_trailers() {
        let body = b"3\r\nabc\r\n0\r\nX-Checksum: 1\r\n\r\nnext";

        let (decoded, consumed) = decode_chunked(body).unwrap();

        assert_eq!(decoded, b"abc".to_vec());
        assert_eq!(&body[consumed..], b"next");
    }
}
