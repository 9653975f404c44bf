/*
 * util.rs
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

//! Address and encoding helpers shared across the engine.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{Result, WebError};

/// Form-encoding set: everything except `[A-Za-z0-9]`, `-`, `_`, `.`.
/// Space is encoded to `%20` here and rewritten to `+` afterwards.
const FORM: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// application/x-www-form-urlencoded encoding (space becomes `+`).
pub fn url_encode(s: &str) -> String {
    utf8_percent_encode(s, FORM).to_string().replace("%20", "+")
}

/// Inverse of `url_encode`: `+` becomes space, `%XX` sequences decoded.
pub fn url_decode(s: &str) -> String {
    let s = s.replace('+', " ");
    percent_decode_str(&s).decode_utf8_lossy().into_owned()
}

/// Encodes each `/`-separated segment of a request URI path separately.
/// Does not accept absolute URIs or URIs with a query.
pub fn url_encode_uri(uri: &str) -> String {
    uri.split('/').map(url_encode).collect::<Vec<_>>().join("/")
}

/// Strict dotted-quad check (each octet 0-255, no leading sign or spaces).
pub fn is_ipv4_address(addr: &str) -> bool {
    let parts: Vec<&str> = addr.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts.iter().all(|p| {
        !p.is_empty()
            && p.len() <= 3
            && p.bytes().all(|b| b.is_ascii_digit())
            && (p.len() == 1 || !p.starts_with('0'))
            && p.parse::<u16>().map(|n| n <= 255).unwrap_or(false)
    })
}

/// Resolves a hostname to an IPv4 address. An IPv4 literal passes through.
/// SOCKS4 and the polling socket need a literal address.
pub fn resolve_hostname(hostname: &str) -> Result<Ipv4Addr> {
    if is_ipv4_address(hostname) {
        return hostname
            .parse()
            .map_err(|_| WebError::Resolve(hostname.to_string()));
    }
    let addrs = (hostname, 0u16)
        .to_socket_addrs()
        .map_err(|e| WebError::Resolve(format!("{}: {}", hostname, e)))?;
    for addr in addrs {
        if let IpAddr::V4(v4) = addr.ip() {
            return Ok(v4);
        }
    }
    Err(WebError::Resolve(hostname.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_encoding_round_trip() {
        assert_eq!(url_encode("a b&c=d"), "a+b%26c%3Dd");
        assert_eq!(url_decode("a+b%26c%3Dd"), "a b&c=d");
        assert_eq!(url_encode("safe-chars_0.9"), "safe-chars_0.9");
    }

    #[test]
    fn uri_segments_encoded_separately() {
        assert_eq!(url_encode_uri("/a b/c"), "/a+b/c");
        assert_eq!(url_encode_uri("/"), "/");
    }

    #[test]
    fn ipv4_literals() {
        assert!(is_ipv4_address("127.0.0.1"));
        assert!(is_ipv4_address("255.255.255.255"));
        assert!(!is_ipv4_address("256.0.0.1"));
        assert!(!is_ipv4_address("1.2.3"));
        assert!(!is_ipv4_address("01.2.3.4"));
        assert!(!is_ipv4_address("example.com"));
    }
}
