/*
 * headers.rs
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

//! Ordered HTTP header collection with case-insensitive lookup.

/// Ordered sequence of `(name, value)` pairs. Lookups fold case; duplicate
/// names are preserved and all addressable.
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    headers: Vec<(String, String)>,
}

fn is_token_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw header block (one `name: value` per CRLF-separated
    /// line, no folding). Lines that do not look like a header are skipped,
    /// matching how a status line mixed into the block is ignored.
    pub fn parse(raw: &str) -> Self {
        let mut set = Self::new();
        for line in raw.split("\r\n") {
            if let Some(colon) = line.find(':') {
                let name = &line[..colon];
                let value = line[colon + 1..].trim();
                if is_token_name(name) && !value.is_empty() {
                    set.add(name, value);
                }
            }
        }
        set
    }

    /// Appends a header without replacing same-named entries.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Replaces the first same-named header, or appends if none exists.
    pub fn replace(&mut self, name: &str, value: impl Into<String>) {
        for (n, v) in self.headers.iter_mut() {
            if n.eq_ignore_ascii_case(name) {
                *v = value.into();
                return;
            }
        }
        self.add(name, value);
    }

    /// Removes every header with the given name.
    pub fn remove(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn clear(&mut self) {
        self.headers.clear();
    }

    /// First value for the given name, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for the given name, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Non-negative Content-Length, or None when absent or unparseable.
    pub fn content_length(&self) -> Option<u64> {
        self.get("Content-Length").and_then(|v| v.trim().parse().ok())
    }

    pub fn is_chunked(&self) -> bool {
        self.get("Transfer-Encoding") == Some("chunked")
    }

    /// Serializes the headers as CRLF-joined lines, no trailing EOL.
    pub fn to_wire(&self) -> String {
        self.headers
            .iter()
            .map(|(n, v)| format!("{}: {}", n, v))
            .collect::<Vec<_>>()
            .join("\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut h = HeaderSet::new();
        h.add("Content-Type", "text/html");
        assert_eq!(h.get("content-type"), Some("text/html"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/html"));
        assert!(h.has("Content-type"));
    }

    #[test]
    fn duplicates_preserved_and_addressable() {
        let mut h = HeaderSet::new();
        h.add("Set-Cookie", "a=1");
        h.add("Set-Cookie", "b=2");
        assert_eq!(h.get("set-cookie"), Some("a=1"));
        assert_eq!(h.get_all("SET-COOKIE"), vec!["a=1", "b=2"]);
    }

    #[test]
    fn replace_touches_first_match_only() {
        let mut h = HeaderSet::new();
        h.add("X-A", "1");
        h.add("X-A", "2");
        h.replace("x-a", "3");
        assert_eq!(h.get_all("X-A"), vec!["3", "2"]);
        h.remove("X-A");
        assert!(!h.has("X-A"));
    }

    #[test]
    fn parse_skips_status_line_and_garbage() {
        let raw = "HTTP/1.1 200 OK\r\nContent-Length: 42\r\nnot a header\r\nX: y";
        let h = HeaderSet::parse(raw);
        assert_eq!(h.content_length(), Some(42));
        assert_eq!(h.get("x"), Some("y"));
    }

    #[test]
    fn chunked_flag() {
        let mut h = HeaderSet::new();
        h.add("Transfer-Encoding", "chunked");
        assert!(h.is_chunked());
    }

    #[test]
    fn wire_format_keeps_order() {
        let mut h = HeaderSet::new();
        h.add("Host", "example.com");
        h.add("Connection", "close");
        assert_eq!(h.to_wire(), "Host: example.com\r\nConnection: close");
    }
}
