/*
 * mod.rs
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

//! Cookies: Set-Cookie parsing with domain defaulting, match rules for
//! outgoing requests and a jar that maintains the live set.

pub mod date;

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, WebError};
use crate::http::request::WebRequest;
use crate::util;

fn is_name_byte(b: u8) -> bool {
    matches!(b,
        0x21 | 0x23..=0x27 | 0x2a | 0x2b..=0x2e | 0x30..=0x39
        | 0x41..=0x5a | 0x5e..=0x7a | 0x7c | 0x7e)
}

fn is_value_byte(b: u8) -> bool {
    matches!(b, 0x21 | 0x23..=0x2b | 0x2d..=0x3a | 0x3c..=0x5b | 0x5d..=0x7e)
}

// attribute names and values share the loose "printable, no semicolon"
// charset
fn is_extension_str(s: &str) -> bool {
    s.bytes()
        .all(|b| (0x20..=0x3a).contains(&b) || (0x3c..=0x7e).contains(&b))
}

fn is_domain_attribute(s: &str) -> bool {
    let s = s.strip_prefix('.').unwrap_or(s);
    !s.is_empty()
        && s.split('.').all(|label| {
            !label.is_empty()
                && label
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-')
                && label
                    .bytes()
                    .last()
                    .is_some_and(|b| b.is_ascii_alphanumeric())
        })
}

fn ends_with_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// One cookie. `domain_exact` distinguishes a host-only cookie from a
/// `Domain` attribute cookie that also matches subdomains.
#[derive(Debug, Clone)]
pub struct HttpCookie {
    name: String,
    value: String,
    domain: String,
    domain_exact: bool,
    path: String,
    expires: Option<DateTime<Utc>>,
    secure: bool,
    http_only: bool,
}

impl HttpCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            domain_exact: true,
            path: String::new(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    /// Parses a Set-Cookie value. The originating request, when given,
    /// supplies the default domain and path and gates the Domain attribute
    /// against the request host.
    pub fn parse(raw: &str, request: Option<&WebRequest>) -> Result<Self> {
        let bytes = raw.as_bytes();
        let name_end = bytes.iter().position(|b| !is_name_byte(*b)).unwrap_or(bytes.len());
        if name_end == 0 || bytes.get(name_end) != Some(&b'=') {
            return Err(WebError::CookieParse(raw.to_string()));
        }
        let name = &raw[..name_end];
        let mut pos = name_end + 1;
        let quoted = bytes.get(pos) == Some(&b'"');
        if quoted {
            pos += 1;
        }
        let value_start = pos;
        while pos < bytes.len() && is_value_byte(bytes[pos]) && !(quoted && bytes[pos] == b'"') {
            pos += 1;
        }
        let value = &raw[value_start..pos];
        if quoted {
            if bytes.get(pos) != Some(&b'"') {
                return Err(WebError::CookieParse(raw.to_string()));
            }
            pos += 1;
        }
        let attributes = match &raw[pos..] {
            "" => "",
            rest => rest
                .strip_prefix("; ")
                .ok_or_else(|| WebError::CookieParse(raw.to_string()))?,
        };

        let mut cookie = HttpCookie::new(name, value);
        let mut saw_domain = false;
        let mut saw_path = false;
        let mut saw_max_age = false;
        for attribute in attributes.split(';') {
            let attribute = attribute.trim();
            if attribute.is_empty() {
                continue;
            }
            let (key, val) = match attribute.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (attribute, None),
            };
            match (key.to_ascii_lowercase().as_str(), val) {
                ("secure", None) => cookie.secure = true,
                ("httponly", None) => cookie.http_only = true,
                ("path", Some(v)) => {
                    if !is_extension_str(v) {
                        return Err(WebError::CookieParse(raw.to_string()));
                    }
                    cookie.path = v.to_string();
                    saw_path = true;
                }
                ("domain", Some(v)) => {
                    if !is_domain_attribute(v) {
                        return Err(WebError::CookieParse(raw.to_string()));
                    }
                    cookie.domain = v.strip_prefix('.').unwrap_or(v).to_string();
                    cookie.domain_exact = false;
                    saw_domain = true;
                }
                ("max-age", Some(v)) => {
                    if v.is_empty() || v.len() > 10 || !v.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(WebError::CookieParse(raw.to_string()));
                    }
                    let seconds: i64 = v
                        .parse()
                        .map_err(|_| WebError::CookieParse(raw.to_string()))?;
                    cookie.expires = if seconds == 0 {
                        Some(DateTime::<Utc>::UNIX_EPOCH)
                    } else {
                        Some(Utc::now() + Duration::seconds(seconds))
                    };
                    saw_max_age = true;
                }
                ("expires", Some(v)) => {
                    // Max-Age wins over Expires regardless of order
                    if !saw_max_age {
                        cookie.expires = Some(
                            date::parse_cookie_date(v)
                                .ok_or_else(|| WebError::CookieParse(raw.to_string()))?,
                        );
                    }
                }
                (_, v) => {
                    let ok = is_extension_str(key) && v.map_or(true, is_extension_str);
                    if !ok {
                        return Err(WebError::CookieParse(raw.to_string()));
                    }
                }
            }
        }

        if let Some(request) = request {
            let host = request.host();
            if !saw_path {
                cookie.path = request.request_uri_path().to_string();
            }
            if !saw_domain || util::is_ipv4_address(host) {
                cookie.domain = host.to_string();
                cookie.domain_exact = true;
            } else if !host.eq_ignore_ascii_case(&cookie.domain) {
                let suffix = format!(".{}", cookie.domain.to_ascii_lowercase());
                let matches_suffix = host.to_ascii_lowercase().ends_with(&suffix);
                if !matches_suffix || !cookie.domain.contains('.') {
                    return Err(WebError::CookieParse(format!(
                        "domain {} does not cover host {}",
                        cookie.domain, host
                    )));
                }
            }
        }
        Ok(cookie)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn set_domain(&mut self, domain: impl Into<String>, exact: bool) {
        self.domain = domain.into();
        self.domain_exact = exact;
    }

    pub fn is_domain_exact(&self) -> bool {
        self.domain_exact
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }

    pub fn set_expires(&mut self, expires: Option<DateTime<Utc>>) {
        self.expires = expires;
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    pub fn set_http_only(&mut self, http_only: bool) {
        self.http_only = http_only;
    }

    /// Whether this cookie should be sent to the given target. Empty
    /// cookie or target fields skip the corresponding check.
    pub fn is_accepted(&self, domain: &str, path: &str, secure: bool) -> bool {
        if self.secure && !secure {
            return false;
        }
        if !self.path.is_empty() && !path.is_empty() {
            let target = ends_with_slash(path);
            let own = ends_with_slash(&self.path);
            if own != target && !target.starts_with(&own) {
                return false;
            }
        }
        if !self.domain.is_empty() && !domain.is_empty() {
            let target = domain.to_ascii_lowercase();
            let own = self.domain.to_ascii_lowercase();
            if target != own {
                if self.domain_exact {
                    return false;
                }
                if util::is_ipv4_address(&target) || util::is_ipv4_address(&own) {
                    return false;
                }
                if !target.ends_with(&format!(".{}", own)) {
                    return false;
                }
            }
        }
        true
    }

    /// Session cookies (no expiry) live until the session ends: they are
    /// expired against "no current time" but never against a real one.
    pub fn is_expired(&self, current: Option<DateTime<Utc>>) -> bool {
        match (self.expires, current) {
            (None, None) => true,
            (None, Some(_)) => false,
            (Some(_), None) => false,
            (Some(expires), Some(current)) => expires < current,
        }
    }

    /// `name=value` form for a Cookie request header.
    pub fn to_request_string(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// Full Set-Cookie form with attributes.
    pub fn to_set_cookie_string(&self) -> String {
        let mut s = self.to_request_string();
        if let Some(expires) = self.expires {
            s.push_str("; Expires=");
            s.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        }
        if !self.path.is_empty() {
            s.push_str("; Path=");
            s.push_str(&self.path);
        }
        if !self.domain.is_empty() && !self.domain_exact {
            s.push_str("; Domain=");
            s.push_str(&self.domain);
        }
        if self.secure {
            s.push_str("; Secure");
        }
        if self.http_only {
            s.push_str("; HttpOnly");
        }
        s
    }
}

/// What a jar filter does with the cookie it was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    Next,
    Abort,
    RemoveNext,
    RemoveAbort,
}

/// Holds the live cookies for a manager. Adding a cookie replaces any
/// existing one with the same name.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Vec<HttpCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cookie: HttpCookie) {
        match self.cookies.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    pub fn all(&self) -> &[HttpCookie] {
        &self.cookies
    }

    pub fn get(&self, name: &str) -> Option<&HttpCookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Walks the jar, letting the callback keep or remove each cookie and
    /// optionally stop early. Removals are applied even on early stop.
    pub fn filter(&mut self, mut callback: impl FnMut(&HttpCookie) -> FilterAction) {
        let mut keep = vec![true; self.cookies.len()];
        for (i, cookie) in self.cookies.iter().enumerate() {
            match callback(cookie) {
                FilterAction::Next => {}
                FilterAction::Abort => break,
                FilterAction::RemoveNext => keep[i] = false,
                FilterAction::RemoveAbort => {
                    keep[i] = false;
                    break;
                }
            }
        }
        let mut it = keep.iter();
        self.cookies.retain(|_| *it.next().unwrap_or(&true));
    }

    /// Drops cookies expired at the given time (None drops only session
    /// cookies).
    pub fn cleanup(&mut self, current: Option<DateTime<Utc>>) {
        self.cookies.retain(|c| !c.is_expired(current));
    }

    /// Replaces the request's Cookie header with the matching cookies, or
    /// removes it when none match.
    pub fn attach_to(&self, request: &mut WebRequest) {
        let matched: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| {
                c.is_accepted(request.host(), request.request_uri_path(), request.is_secure())
            })
            .map(|c| c.to_request_string())
            .collect();
        if matched.is_empty() {
            request.headers_mut().remove("Cookie");
        } else {
            request.headers_mut().replace("Cookie", matched.join("; "));
        }
    }
}
