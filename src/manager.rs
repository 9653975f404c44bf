/*
 * manager.rs
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

//! Session orchestration: cookies, redirect following and the
//! authentication retry, on top of any transport.

use std::collections::HashMap;

use chrono::Utc;

use crate::auth::{self, AuthScheme};
use crate::cookie::{CookieJar, HttpCookie};
use crate::error::Result;
use crate::http::params::ParamValue;
use crate::http::request::{Method, WebRequest};
use crate::http::response::WebResponse;
use crate::transport::Transport;
use crate::util;

/// Invoked before a redirect is followed with the current request, the
/// response that triggered it, the derived request and the status code.
/// Returning false stops and yields the current response.
pub type RedirectCallback =
    Box<dyn FnMut(&WebRequest, &WebResponse, &WebRequest, u16) -> bool>;

const DEFAULT_MAX_REDIRECTS: i32 = 10;

/// Drives whole HTTP conversations over one transport: attaches and
/// stores cookies, follows redirects up to a bound and answers one
/// authentication challenge per run.
pub struct HttpRequestManager {
    socket: Box<dyn Transport>,
    cookies: Option<CookieJar>,
    max_redirects: i32,
    auto_referer: bool,
    on_redirect: Option<RedirectCallback>,
    auth_data: HashMap<String, (String, String)>,
    universal_auth: Option<(String, String)>,
}

impl HttpRequestManager {
    pub fn new(socket: Box<dyn Transport>) -> Self {
        Self {
            socket,
            cookies: Some(CookieJar::new()),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            auto_referer: true,
            on_redirect: None,
            auth_data: HashMap::new(),
            universal_auth: None,
        }
    }

    /// Bound on followed redirects; 0 disables following, -1 removes the
    /// bound.
    pub fn set_max_redirects(&mut self, max: i32) {
        self.max_redirects = max;
    }

    pub fn max_redirects(&self) -> i32 {
        self.max_redirects
    }

    /// Whether derived redirect requests carry a Referer header.
    pub fn set_auto_referer(&mut self, enabled: bool) {
        self.auto_referer = enabled;
    }

    pub fn set_on_redirect(&mut self, callback: Option<RedirectCallback>) {
        self.on_redirect = callback;
    }

    /// Disables or re-enables cookie handling. Disabling drops the jar.
    pub fn set_cookies_enabled(&mut self, enabled: bool) {
        match (enabled, self.cookies.is_some()) {
            (true, false) => self.cookies = Some(CookieJar::new()),
            (false, true) => self.cookies = None,
            _ => {}
        }
    }

    pub fn cookies(&self) -> Option<&CookieJar> {
        self.cookies.as_ref()
    }

    pub fn cookies_mut(&mut self) -> Option<&mut CookieJar> {
        self.cookies.as_mut()
    }

    /// Registers credentials for one realm.
    pub fn set_credentials(
        &mut self,
        realm: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) {
        self.auth_data
            .insert(realm.into(), (login.into(), password.into()));
    }

    /// Registers fallback credentials used for any realm without its own.
    pub fn set_universal_credentials(
        &mut self,
        login: impl Into<String>,
        password: impl Into<String>,
    ) {
        self.universal_auth = Some((login.into(), password.into()));
    }

    pub fn socket(&mut self) -> &mut dyn Transport {
        self.socket.as_mut()
    }

    /// Runs one conversation. `Ok(None)` surfaces a transport that
    /// consumed the request without producing a response.
    pub fn run(&mut self, request: &mut WebRequest) -> Result<Option<WebResponse>> {
        self.run_internal(request, 0, false)
    }

    fn run_internal(
        &mut self,
        request: &mut WebRequest,
        depth: u32,
        reauthenticating: bool,
    ) -> Result<Option<WebResponse>> {
        if let Some(jar) = &mut self.cookies {
            jar.cleanup(Some(Utc::now()));
            jar.attach_to(request);
        }

        let response = match self.socket.send_request(request)? {
            Some(response) => response,
            None => return Ok(None),
        };

        if let Some(jar) = &mut self.cookies {
            for raw in response.headers().get_all("Set-Cookie") {
                match HttpCookie::parse(raw, Some(request)) {
                    Ok(cookie) => jar.add(cookie),
                    Err(e) => log::debug!("ignoring cookie: {}", e),
                }
            }
            jar.cleanup(Some(Utc::now()));
        }

        if self.redirects_allowed(depth) {
            if let Some(code) = redirect_code(&response) {
                let location = response
                    .headers()
                    .get("Location")
                    .unwrap_or_default()
                    .to_string();
                if !location.is_empty() {
                    if let Some(mut next) = self.derive_redirect(request, &location, code)? {
                        let proceed = match &mut self.on_redirect {
                            Some(cb) => cb(request, &response, &next, code),
                            None => true,
                        };
                        if proceed {
                            log::debug!("redirect {} -> {}", code, next.full_address(false));
                            return self.run_internal(&mut next, depth + 1, false);
                        }
                        return Ok(Some(response));
                    }
                }
            }
        }

        if !reauthenticating {
            if let Some(challenge) = response
                .headers()
                .get("WWW-Authenticate")
                .and_then(auth::parse_challenge)
            {
                if let Some(realm) = challenge.realm.clone() {
                    let creds = self
                        .auth_data
                        .get(&realm)
                        .or(self.universal_auth.as_ref())
                        .cloned();
                    if let Some((login, password)) = creds {
                        log::debug!("answering {:?} challenge for realm {}", challenge.scheme, realm);
                        match challenge.scheme {
                            AuthScheme::Basic => {
                                request.set_basic_credentials(&login, &password);
                            }
                            AuthScheme::Digest => {
                                if request.boundary().is_none() {
                                    request.set_boundary(Some(auth::random_md5_token()));
                                }
                                request.set_digest_credentials(&challenge, &login, &password)?;
                            }
                        }
                        return self.run_internal(request, depth, true);
                    }
                }
            }
        }

        Ok(Some(response))
    }

    fn redirects_allowed(&self, depth: u32) -> bool {
        self.max_redirects < 0 || depth < self.max_redirects as u32
    }

    /// Builds the request for one redirect hop, or None when the Location
    /// value cannot be turned into a request.
    fn derive_redirect(
        &self,
        request: &WebRequest,
        location: &str,
        code: u16,
    ) -> Result<Option<WebRequest>> {
        let url = if location.contains("://") {
            location.to_string()
        } else if location.starts_with('/') {
            let base = request.full_address(false);
            let origin_end = origin_length(&base);
            format!("{}{}", &base[..origin_end], location)
        } else if location.starts_with('?') {
            format!(
                "{}{}{}",
                origin_of(request),
                request.request_uri(),
                location
            )
        } else {
            format!("{}{}{}", origin_of(request), request.request_uri_path(), location)
        };

        let mut next = match WebRequest::from_url(&url, false, false) {
            Ok(next) => next,
            Err(e) => {
                log::debug!("unresolvable Location {}: {}", location, e);
                return Ok(None);
            }
        };
        next.set_method(request.method());
        next.set_http_version(request.http_version());
        next.set_boundary(request.boundary().map(str::to_string));

        match code {
            301 | 302 | 303 => {
                if !matches!(next.method(), Method::Get | Method::Head) {
                    next.set_method(Method::Get);
                }
            }
            // 307/308 keep the method and carry the body across
            _ => {
                let encode = request.params().auto_url_encode();
                for (name, value) in request.params().body_params() {
                    let (name, value) = if encode {
                        (util::url_encode(name), encode_value(value))
                    } else {
                        (name.to_string(), value.clone())
                    };
                    next.set_param(name, value, false)?;
                }
            }
        }

        // never leak an https origin to an http target
        if self.auto_referer && (!request.is_secure() || next.is_secure()) {
            next.headers_mut()
                .replace("Referer", request.full_address(false));
        }
        Ok(Some(next))
    }
}

fn redirect_code(response: &WebResponse) -> Option<u16> {
    match response.http_code() {
        Ok(code @ (301 | 302 | 303 | 307 | 308)) => Some(code),
        _ => None,
    }
}

fn origin_of(request: &WebRequest) -> String {
    let base = request.full_address(false);
    let end = origin_length(&base);
    base[..end].to_string()
}

/// Length of the `scheme://host[:port]` prefix of an absolute URL.
fn origin_length(url: &str) -> usize {
    let after_scheme = url.find("://").map(|p| p + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(p) => after_scheme + p,
        None => url.len(),
    }
}

/// Re-encodes the text slots of a parameter value, leaving attachments as
/// they are.
fn encode_value(value: &ParamValue) -> ParamValue {
    use crate::http::params::ParamItem;
    let encode_item = |item: &ParamItem| match item {
        ParamItem::Text(s) => ParamItem::Text(util::url_encode(s)),
        ParamItem::Attachment(a) => ParamItem::Attachment(a.clone()),
    };
    match value {
        ParamValue::Single(item) => ParamValue::Single(encode_item(item)),
        ParamValue::Flag => ParamValue::Flag,
        ParamValue::List(items) => ParamValue::List(items.iter().map(encode_item).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;

    fn response(raw: &str) -> Option<WebResponse> {
        Some(WebResponse::new(raw.as_bytes().to_vec()))
    }

    fn manager_with(responses: Vec<Option<WebResponse>>) -> HttpRequestManager {
        let mut socket = ScriptedTransport::default();
        socket.responses = responses.into();
        HttpRequestManager::new(Box::new(socket))
    }

    #[test]
    fn plain_response_passes_through() {
        let mut m = manager_with(vec![response("HTTP/1.1 200 OK\r\n\r\nhello")]);
        let mut r = WebRequest::new("example.com", 80, Method::Get, "/");
        let out = m.run(&mut r).unwrap().unwrap();
        assert_eq!(out.http_code().unwrap(), 200);
        assert_eq!(out.body(), b"hello");
    }

    #[test]
    fn follows_absolute_redirect() {
        let mut m = manager_with(vec![
            response("HTTP/1.1 302 Found\r\nLocation: http://other.example/next\r\n\r\n"),
            response("HTTP/1.1 200 OK\r\n\r\ndone"),
        ]);
        let mut r = WebRequest::new("example.com", 80, Method::Post, "/form");
        let out = m.run(&mut r).unwrap().unwrap();
        assert_eq!(out.body(), b"done");
    }

    #[test]
    fn redirect_callback_sees_forced_get_and_can_veto() {
        let mut m = manager_with(vec![
            response("HTTP/1.1 303 See Other\r\nLocation: /next\r\n\r\nfirst"),
            response("HTTP/1.1 200 OK\r\n\r\nsecond"),
        ]);
        let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
        let captured = seen.clone();
        m.set_on_redirect(Some(Box::new(move |_, _, next, code| {
            *captured.borrow_mut() = Some((next.method(), next.full_address(false)));
            assert_eq!(code, 303);
            false
        })));
        let mut r = WebRequest::new("example.com", 80, Method::Post, "/form");
        let out = m.run(&mut r).unwrap().unwrap();
        assert_eq!(out.body(), b"first");
        assert_eq!(
            *seen.borrow(),
            Some((Method::Get, "http://example.com/next".to_string()))
        );
    }

    #[test]
    fn temporary_redirect_keeps_method_and_body() {
        let mut m = manager_with(vec![
            response("HTTP/1.1 307 Temporary Redirect\r\nLocation: /retry\r\n\r\n"),
            response("HTTP/1.1 200 OK\r\n\r\nok"),
        ]);
        let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
        let captured = seen.clone();
        m.set_on_redirect(Some(Box::new(move |_, _, next: &WebRequest, _| {
            let body = next
                .params()
                .raw_param_string(crate::http::params::ParamKind::BodyOnly, None);
            *captured.borrow_mut() = Some((next.method(), body));
            true
        })));
        let mut r = WebRequest::new("example.com", 80, Method::Post, "/form");
        r.params_mut().set_text("a", "1");
        m.run(&mut r).unwrap().unwrap();
        assert_eq!(
            *seen.borrow(),
            Some((Method::Post, "a=1".to_string()))
        );
    }

    #[test]
    fn redirect_bound_is_enforced() {
        let looping =
            "HTTP/1.1 302 Found\r\nLocation: /loop\r\n\r\n";
        let mut m = manager_with((0..20).map(|_| response(looping)).collect());
        m.set_max_redirects(3);
        let mut r = WebRequest::new("example.com", 80, Method::Get, "/");
        let out = m.run(&mut r).unwrap().unwrap();
        // the chain stops after 3 hops with the last 302 returned
        assert_eq!(out.http_code().unwrap(), 302);
    }

    #[test]
    fn redirects_disabled_with_zero() {
        let mut m = manager_with(vec![response(
            "HTTP/1.1 301 Moved\r\nLocation: /next\r\n\r\n",
        )]);
        m.set_max_redirects(0);
        let mut r = WebRequest::new("example.com", 80, Method::Get, "/");
        let out = m.run(&mut r).unwrap().unwrap();
        assert_eq!(out.http_code().unwrap(), 301);
    }

    #[test]
    fn basic_challenge_answered_once() {
        let challenge =
            "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"lair\"\r\n\r\n";
        let mut m = manager_with(vec![response(challenge), response(challenge)]);
        m.set_credentials("lair", "user", "pass");
        let mut r = WebRequest::new("example.com", 80, Method::Get, "/");
        let out = m.run(&mut r).unwrap().unwrap();
        // second 401 is returned as-is, no endless retry
        assert_eq!(out.http_code().unwrap(), 401);
        assert!(r.headers().get("Authorization").unwrap().starts_with("Basic "));
    }

    #[test]
    fn universal_credentials_cover_unknown_realms() {
        let mut m = manager_with(vec![
            response("HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"x\"\r\n\r\n"),
            response("HTTP/1.1 200 OK\r\n\r\nin"),
        ]);
        m.set_universal_credentials("u", "p");
        let mut r = WebRequest::new("example.com", 80, Method::Get, "/");
        let out = m.run(&mut r).unwrap().unwrap();
        assert_eq!(out.body(), b"in");
    }

    #[test]
    fn digest_challenge_gets_a_boundary_and_header() {
        let challenge = "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Digest \
                         realm=\"r\", nonce=\"n\", opaque=\"o\", qop=\"auth\"\r\n\r\n";
        let mut m = manager_with(vec![
            response(challenge),
            response("HTTP/1.1 200 OK\r\n\r\nok"),
        ]);
        m.set_credentials("r", "u", "p");
        let mut r = WebRequest::new("example.com", 80, Method::Get, "/");
        let out = m.run(&mut r).unwrap().unwrap();
        assert_eq!(out.body(), b"ok");
        assert!(r.boundary().is_some());
        assert!(r.headers().get("Authorization").unwrap().starts_with("Digest "));
    }

    #[test]
    fn cookies_stored_and_replayed() {
        let mut m = manager_with(vec![
            response("HTTP/1.1 302 Found\r\nSet-Cookie: sid=abc\r\nLocation: /next\r\n\r\n"),
            response("HTTP/1.1 200 OK\r\n\r\nok"),
        ]);
        let mut r = WebRequest::new("example.com", 80, Method::Get, "/");
        m.run(&mut r).unwrap().unwrap();
        assert_eq!(m.cookies().unwrap().get("sid").unwrap().value(), "abc");
    }

    #[test]
    fn unparseable_cookie_is_skipped() {
        let mut m = manager_with(vec![response(
            "HTTP/1.1 200 OK\r\nSet-Cookie: bad cookie!\r\nSet-Cookie: good=1\r\n\r\n",
        )]);
        let mut r = WebRequest::new("example.com", 80, Method::Get, "/");
        m.run(&mut r).unwrap().unwrap();
        let jar = m.cookies().unwrap();
        assert!(jar.get("bad").is_none());
        assert_eq!(jar.get("good").unwrap().value(), "1");
    }

    #[test]
    fn none_from_transport_is_surfaced() {
        let mut m = manager_with(vec![None]);
        let mut r = WebRequest::new("example.com", 80, Method::Get, "/");
        assert!(m.run(&mut r).unwrap().is_none());
    }
}
