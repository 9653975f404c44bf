/*
 * response.rs
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

//! Server response wrapper: raw bytes, lazily parsed status and headers.

use std::cell::OnceCell;

use crate::error::{Result, WebError};
use crate::http::headers::HeaderSet;

/// One HTTP response: the raw status line + header block + body as
/// received (after chunked reassembly and decompression). Headers are
/// parsed on first access and cached.
#[derive(Debug, Default)]
pub struct WebResponse {
    raw: Vec<u8>,
    headers: OnceCell<HeaderSet>,
}

fn find_separator(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

impl WebResponse {
    pub fn new(raw: Vec<u8>) -> Self {
        Self {
            raw,
            headers: OnceCell::new(),
        }
    }

    /// Raw response bytes, header block included.
    pub fn raw_contents(&self) -> &[u8] {
        &self.raw
    }

    /// Body bytes; empty when no header/body separator was seen.
    pub fn body(&self) -> &[u8] {
        match find_separator(&self.raw) {
            Some(pos) => &self.raw[pos + 4..],
            None => &[],
        }
    }

    /// Raw header block (without the separator). When no separator is
    /// present the whole contents count as headers.
    pub fn headers_data(&self) -> &[u8] {
        match find_separator(&self.raw) {
            Some(pos) => &self.raw[..pos],
            None => &self.raw,
        }
    }

    /// Parsed headers (computed once).
    pub fn headers(&self) -> &HeaderSet {
        self.headers
            .get_or_init(|| HeaderSet::parse(&String::from_utf8_lossy(self.headers_data())))
    }

    /// HTTP status code from the `HTTP/1.{0|1} NNN ...` status line.
    pub fn http_code(&self) -> Result<u16> {
        let line = self.headers_data();
        let line = match line.iter().position(|&b| b == b'\r') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let line = std::str::from_utf8(line)
            .map_err(|_| WebError::ResponseParse("status line is not UTF-8".into()))?;
        let rest = line
            .strip_prefix("HTTP/1.0")
            .or_else(|| line.strip_prefix("HTTP/1.1"))
            .ok_or_else(|| WebError::ResponseParse(format!("bad status line: {}", line)))?;
        if !rest.starts_with(char::is_whitespace) {
            return Err(WebError::ResponseParse(format!("bad status line: {}", line)));
        }
        let code = rest.trim_start();
        if code.len() < 3 || !code.as_bytes()[..3].iter().all(|b| b.is_ascii_digit()) {
            return Err(WebError::ResponseParse(format!("bad status line: {}", line)));
        }
        code[..3]
            .parse()
            .map_err(|_| WebError::ResponseParse(format!("bad status line: {}", line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_headers_and_body() {
        let r = WebResponse::new(b"HTTP/1.1 200 OK\r\nX-A: 1\r\n\r\nhello".to_vec());
        assert_eq!(r.http_code().unwrap(), 200);
        assert_eq!(r.headers().get("x-a"), Some("1"));
        assert_eq!(r.body(), b"hello");
    }

    #[test]
    fn headers_only_response() {
        let r = WebResponse::new(b"HTTP/1.0 304 Not Modified\r\n\r\n".to_vec());
        assert_eq!(r.http_code().unwrap(), 304);
        assert!(r.body().is_empty());
    }

    #[test]
    fn rejects_garbage_status_line() {
        let r = WebResponse::new(b"ICY 200 OK\r\n\r\n".to_vec());
        assert!(r.http_code().is_err());
        let r = WebResponse::new(b"HTTP/1.1 xx\r\n\r\n".to_vec());
        assert!(r.http_code().is_err());
    }
}
