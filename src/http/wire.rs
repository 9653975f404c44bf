/*
 * wire.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ragnatela, a socket-level HTTP(S) client engine.
 *
 * Ragnatela is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ragnatela is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ragnatela.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Response reading primitives: delimiter scanning, bounded and
//! read-to-close bodies, chunked transfer decoding and content decoding.

use std::io::Read;

use bytes::BytesMut;
use flate2::read::{GzDecoder, ZlibDecoder};

use crate::error::{Result, WebError};
use crate::http::request::WebRequest;
use crate::transport::Transport;

const BLOCK: usize = 1024;

/// Streaming consumer for body data. Receives the raw header block, one
/// block of body bytes and the request; returning false stops the read.
pub type BodyCallback<'a, 'b> = &'a mut (dyn FnMut(&str, &[u8], &WebRequest) -> bool + 'b);

/// How a body read ended.
pub enum BodyOutcome {
    /// No callback was installed; the body was accumulated.
    Buffered(Vec<u8>),
    /// A callback consumed every block.
    Streamed,
    /// A callback returned false; the rest of the body is unread.
    Aborted,
}

/// Reads one byte at a time until the pattern is seen; the returned bytes
/// exclude the pattern. The connection closing first is an error.
pub fn read_until(socket: &mut dyn Transport, pattern: &[u8]) -> Result<Vec<u8>> {
    let mut buf = BytesMut::new();
    while !buf.ends_with(pattern) {
        let byte = socket.read(1)?;
        if byte.is_empty() {
            return Err(WebError::Read("connection closed before delimiter".into()));
        }
        buf.extend_from_slice(&byte);
    }
    buf.truncate(buf.len() - pattern.len());
    Ok(buf.to_vec())
}

/// Reads the status line and header block through the blank line. The
/// returned string keeps the trailing `\r\n\r\n` separator.
pub fn read_header_block(socket: &mut dyn Transport) -> Result<String> {
    let mut raw = read_until(socket, b"\r\n\r\n")?;
    raw.extend_from_slice(b"\r\n\r\n");
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Reads exactly `length` bytes, failing on a premature close.
pub(crate) fn read_exact(socket: &mut dyn Transport, length: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(length);
    while buf.len() < length {
        let part = socket.read(length - buf.len())?;
        if part.is_empty() {
            return Err(WebError::Read("connection closed mid-body".into()));
        }
        buf.extend_from_slice(&part);
    }
    Ok(buf)
}

/// Reads exactly `length` body bytes, buffering them or feeding them to
/// the callback block by block.
pub fn read_length(
    socket: &mut dyn Transport,
    length: usize,
    raw_headers: &str,
    request: &WebRequest,
    callback: Option<BodyCallback<'_, '_>>,
) -> Result<BodyOutcome> {
    match callback {
        None => Ok(BodyOutcome::Buffered(read_exact(socket, length)?)),
        Some(cb) => {
            let mut remaining = length;
            while remaining > 0 {
                let part = socket.read(remaining)?;
                if part.is_empty() {
                    return Err(WebError::Read("connection closed mid-body".into()));
                }
                remaining -= part.len();
                if !cb(raw_headers, &part, request) {
                    return Ok(BodyOutcome::Aborted);
                }
            }
            Ok(BodyOutcome::Streamed)
        }
    }
}

/// Reads until the server closes the connection (no framing headers).
pub fn read_to_close(
    socket: &mut dyn Transport,
    raw_headers: &str,
    request: &WebRequest,
    mut callback: Option<BodyCallback<'_, '_>>,
) -> Result<BodyOutcome> {
    let mut buf = BytesMut::new();
    loop {
        let part = socket.read(BLOCK)?;
        if part.is_empty() {
            break;
        }
        match callback.as_mut() {
            None => buf.extend_from_slice(&part),
            Some(cb) => {
                if !cb(raw_headers, &part, request) {
                    return Ok(BodyOutcome::Aborted);
                }
            }
        }
    }
    match callback {
        None => Ok(BodyOutcome::Buffered(buf.to_vec())),
        Some(_) => Ok(BodyOutcome::Streamed),
    }
}

fn is_chunk_size_line(line: &[u8]) -> bool {
    (1..=8).contains(&line.len()) && line.iter().all(u8::is_ascii_hexdigit)
}

/// Decodes a chunked transfer body: hex size line, that many bytes, CRLF,
/// repeated until a zero-size chunk.
pub fn read_chunked(
    socket: &mut dyn Transport,
    raw_headers: &str,
    request: &WebRequest,
    mut callback: Option<BodyCallback<'_, '_>>,
) -> Result<BodyOutcome> {
    let mut buf = Vec::new();
    let streamed = callback.is_some();
    loop {
        let line = read_until(socket, b"\r\n")?;
        if !is_chunk_size_line(&line) {
            return Err(WebError::MalformedChunk(format!(
                "bad chunk size line: {:?}",
                String::from_utf8_lossy(&line)
            )));
        }
        // the size line is pure hex of bounded length, this can not fail
        let size = usize::from_str_radix(std::str::from_utf8(&line).unwrap_or("0"), 16)
            .map_err(|_| WebError::MalformedChunk("chunk size overflow".into()))?;
        if size == 0 {
            break;
        }
        let reborrowed = callback.as_deref_mut();
        match read_length(socket, size, raw_headers, request, reborrowed)? {
            BodyOutcome::Buffered(data) => buf.extend_from_slice(&data),
            BodyOutcome::Streamed => {}
            BodyOutcome::Aborted => return Ok(BodyOutcome::Aborted),
        }
        let crlf = read_exact(socket, 2)?;
        if crlf != b"\r\n" {
            return Err(WebError::MalformedChunk("missing chunk terminator".into()));
        }
    }
    if streamed {
        Ok(BodyOutcome::Streamed)
    } else {
        Ok(BodyOutcome::Buffered(buf))
    }
}

/// Reverses a Content-Encoding. gzip and deflate (zlib) are decoded,
/// identity passes through, anything else is rejected.
pub fn decode_body(body: Vec<u8>, encoding: Option<&str>) -> Result<Vec<u8>> {
    let encoding = match encoding {
        None => return Ok(body),
        Some(e) => e.trim().to_ascii_lowercase(),
    };
    let mut out = Vec::new();
    match encoding.as_str() {
        "identity" | "" => Ok(body),
        "gzip" => {
            GzDecoder::new(body.as_slice())
                .read_to_end(&mut out)
                .map_err(|_| WebError::MalformedCompressed)?;
            Ok(out)
        }
        "deflate" => {
            ZlibDecoder::new(body.as_slice())
                .read_to_end(&mut out)
                .map_err(|_| WebError::MalformedCompressed)?;
            Ok(out)
        }
        other => Err(WebError::UnsupportedEncoding(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::Method;
    use crate::transport::testing::ScriptedTransport;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn request() -> WebRequest {
        WebRequest::new("example.com", 80, Method::Get, "/")
    }

    #[test]
    fn read_until_excludes_pattern() {
        let mut t = ScriptedTransport::new(b"line one\r\nrest".to_vec());
        assert_eq!(read_until(&mut t, b"\r\n").unwrap(), b"line one");
        // closing before the delimiter arrives is an error
        assert!(read_until(&mut t, b"\r\n").is_err());
    }

    #[test]
    fn chunked_reassembly() {
        let mut t =
            ScriptedTransport::new(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n".to_vec());
        let r = request();
        match read_chunked(&mut t, "", &r, None).unwrap() {
            BodyOutcome::Buffered(body) => assert_eq!(body, b"Wikipedia"),
            _ => panic!("expected buffered body"),
        }
    }

    #[test]
    fn chunked_rejects_bad_size_line() {
        let mut t = ScriptedTransport::new(b"zz\r\ndata\r\n0\r\n\r\n".to_vec());
        let r = request();
        assert!(matches!(
            read_chunked(&mut t, "", &r, None),
            Err(WebError::MalformedChunk(_))
        ));
    }

    #[test]
    fn chunked_rejects_missing_terminator() {
        let mut t = ScriptedTransport::new(b"4\r\nWikiXX0\r\n\r\n".to_vec());
        let r = request();
        assert!(matches!(
            read_chunked(&mut t, "", &r, None),
            Err(WebError::MalformedChunk(_))
        ));
    }

    #[test]
    fn chunked_callback_abort_stops_reading() {
        let mut t =
            ScriptedTransport::new(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n".to_vec());
        let r = request();
        let mut seen = Vec::new();
        let mut cb = |_: &str, data: &[u8], _: &WebRequest| {
            seen.extend_from_slice(data);
            false
        };
        match read_chunked(&mut t, "", &r, Some(&mut cb)).unwrap() {
            BodyOutcome::Aborted => {}
            _ => panic!("expected abort"),
        }
        assert_eq!(seen, b"Wiki");
    }

    #[test]
    fn length_read_is_exact() {
        let mut t = ScriptedTransport::new(b"hello world".to_vec());
        let r = request();
        match read_length(&mut t, 5, "", &r, None).unwrap() {
            BodyOutcome::Buffered(body) => assert_eq!(body, b"hello"),
            _ => panic!("expected buffered body"),
        }
        assert!(read_length(&mut t, 100, "", &r, None).is_err());
    }

    #[test]
    fn read_to_close_collects_everything() {
        let mut t = ScriptedTransport::new(b"all of it".to_vec());
        let r = request();
        match read_to_close(&mut t, "", &r, None).unwrap() {
            BodyOutcome::Buffered(body) => assert_eq!(body, b"all of it"),
            _ => panic!("expected buffered body"),
        }
    }

    #[test]
    fn gzip_decoding() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"compressed payload").unwrap();
        let body = enc.finish().unwrap();
        assert_eq!(
            decode_body(body, Some("gzip")).unwrap(),
            b"compressed payload"
        );
    }

    #[test]
    fn unknown_encoding_rejected() {
        assert!(matches!(
            decode_body(b"x".to_vec(), Some("br")),
            Err(WebError::UnsupportedEncoding(_))
        ));
        assert!(matches!(
            decode_body(b"not gzip".to_vec(), Some("gzip")),
            Err(WebError::MalformedCompressed)
        ));
    }

    #[test]
    fn identity_passes_through() {
        assert_eq!(decode_body(b"x".to_vec(), None).unwrap(), b"x");
        assert_eq!(decode_body(b"x".to_vec(), Some("identity")).unwrap(), b"x");
    }
}
