/*
 * error.rs
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

//! Closed error enumeration for the whole engine.

use std::fmt;

/// Errors from transports, proxies, the wire layer, cookies, auth and the
/// request manager. Every failure aborts the current logical attempt; the
/// only retries are the bounded redirect loop and the single reauth.
#[derive(Debug)]
pub enum WebError {
    /// URL could not be parsed into scheme/host/port/path.
    UrlParse(String),
    /// Response status line or header block could not be parsed.
    ResponseParse(String),
    /// Set-Cookie value could not be parsed.
    CookieParse(String),
    /// Digest challenge options are missing or unsupported.
    DigestOptions(String),
    /// Could not connect to the target host.
    Connect(String),
    /// Could not read from the socket.
    Read(String),
    /// Could not write to the socket.
    Write(String),
    /// Hostname could not be resolved to an IPv4 address.
    Resolve(String),
    /// The active timeout budget was exhausted.
    Timeout,
    /// Proxy requires credentials that were not supplied.
    ProxyAuthRequired,
    /// Proxy handshake or authentication failed.
    ProxyAuth(String),
    /// Content-Encoding other than gzip/deflate/identity.
    UnsupportedEncoding(String),
    /// gzip/deflate body failed to decode.
    MalformedCompressed,
    /// Chunked transfer framing was invalid.
    MalformedChunk(String),
    /// Attachment byte source failed.
    FileAccess(String),
    /// Operation not supported by this component (e.g. secure upgrade on
    /// the polling socket, or attachments on a body-less method).
    Unsupported(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::UrlParse(m) => write!(f, "unable to parse URL: {}", m),
            WebError::ResponseParse(m) => write!(f, "unable to parse response: {}", m),
            WebError::CookieParse(m) => write!(f, "unable to parse cookie: {}", m),
            WebError::DigestOptions(m) => write!(f, "incorrect digest authentication options: {}", m),
            WebError::Connect(m) => write!(f, "unable to connect: {}", m),
            WebError::Read(m) => write!(f, "unable to read from socket: {}", m),
            WebError::Write(m) => write!(f, "unable to write to socket: {}", m),
            WebError::Resolve(m) => write!(f, "unable to resolve hostname: {}", m),
            WebError::Timeout => write!(f, "socket timeout"),
            WebError::ProxyAuthRequired => write!(f, "proxy authentication required"),
            WebError::ProxyAuth(m) => write!(f, "proxy authentication error: {}", m),
            WebError::UnsupportedEncoding(m) => write!(f, "unknown compression method: {}", m),
            WebError::MalformedCompressed => write!(f, "unable to decode compressed contents"),
            WebError::MalformedChunk(m) => write!(f, "incorrect chunked content: {}", m),
            WebError::FileAccess(m) => write!(f, "unable to read attachment data: {}", m),
            WebError::Unsupported(m) => write!(f, "unsupported operation: {}", m),
        }
    }
}

impl std::error::Error for WebError {}

pub type Result<T> = std::result::Result<T, WebError>;
