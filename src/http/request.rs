/*
 * request.rs
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

//! Outgoing request: target, method, headers, parameters and wire
//! serialization.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::auth::{self, AuthChallenge};
use crate::error::{Result, WebError};
use crate::http::headers::HeaderSet;
use crate::http::params::{ParamKind, ParamManager, ParamValue};
use crate::http::response::WebResponse;
use crate::transport::{SinkTransport, Transport};
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Head,
    Delete,
    Trace,
    Connect,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Head => "HEAD",
            Method::Delete => "DELETE",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }

    /// POST and PUT carry their parameters in the request body.
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http10 => "1.0",
            HttpVersion::Http11 => "1.1",
        }
    }
}

/// One HTTP request. New requests default to HTTP/1.0 with `Connection:
/// close` and a `Host` header; port 443 implies TLS.
#[derive(Clone)]
pub struct WebRequest {
    host: String,
    port: u16,
    request_uri: String,
    method: Method,
    secure: bool,
    http_version: HttpVersion,
    headers: HeaderSet,
    params: ParamManager,
    boundary: Option<String>,
}

impl WebRequest {
    pub fn new(host: impl Into<String>, port: u16, method: Method, request_uri: impl Into<String>) -> Self {
        let host = host.into();
        let mut headers = HeaderSet::new();
        headers.add("Connection", "close");
        headers.add("Host", &host);
        Self {
            secure: port == 443,
            host,
            port,
            request_uri: request_uri.into(),
            method,
            http_version: HttpVersion::Http10,
            headers,
            params: ParamManager::new(true),
            boundary: None,
        }
    }

    /// Builds a GET request from an `http://` or `https://` URL. Query
    /// parameters become GET-only parameters, with a `name[]` suffix
    /// collecting repeated fields into a list. `encode_uri` re-encodes the
    /// path segments; `encode_params` sets the parameter auto-encode mode.
    pub fn from_url(url: &str, encode_uri: bool, encode_params: bool) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| WebError::UrlParse(url.to_string()))?;
        let secure = match scheme {
            "http" => false,
            "https" => true,
            _ => return Err(WebError::UrlParse(format!("unsupported scheme: {}", scheme))),
        };
        let (authority, path_query) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, "/"),
        };
        let (host, port) = match authority.split_once(':') {
            Some((h, p)) => {
                let port: u16 = p
                    .parse()
                    .map_err(|_| WebError::UrlParse(format!("bad port: {}", p)))?;
                (h, port)
            }
            None => (authority, if secure { 443 } else { 80 }),
        };
        if host.is_empty() {
            return Err(WebError::UrlParse(url.to_string()));
        }
        let (path, query) = match path_query.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path_query, None),
        };
        let path = if encode_uri {
            util::url_encode_uri(path)
        } else {
            path.to_string()
        };

        let mut request = WebRequest::new(host, port, Method::Get, path);
        request.secure = secure;
        request.params.set_auto_url_encode(encode_params);
        if let Some(query) = query {
            parse_query(query, &mut request.params)?;
        }
        Ok(request)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
        self.headers.replace("Host", &self.host);
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    pub fn http_version(&self) -> HttpVersion {
        self.http_version
    }

    /// Switches the protocol version. HTTP/1.1 flips the Connection header
    /// to keep-alive, HTTP/1.0 back to close.
    pub fn set_http_version(&mut self, version: HttpVersion) {
        self.http_version = version;
        let connection = match version {
            HttpVersion::Http11 => "keep-alive",
            HttpVersion::Http10 => "close",
        };
        self.headers.replace("Connection", connection);
    }

    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    pub fn set_request_uri(&mut self, uri: impl Into<String>, encode: bool) {
        let uri = uri.into();
        self.request_uri = if encode { util::url_encode_uri(&uri) } else { uri };
    }

    /// Directory part of the request URI (through the last `/`), used as
    /// the default cookie path and the base for relative redirects. Empty
    /// for CONNECT, whose URI is an authority, not a path.
    pub fn request_uri_path(&self) -> &str {
        if self.method == Method::Connect {
            return "";
        }
        match self.request_uri.rfind('/') {
            Some(pos) => &self.request_uri[..pos + 1],
            None => "",
        }
    }

    /// Absolute URL of this request. A request URI that already carries a
    /// scheme (proxy form) is returned untouched. Default ports are elided.
    pub fn full_address(&self, include_params: bool) -> String {
        if self.request_uri.contains("://") {
            return self.request_uri.clone();
        }
        let scheme = if self.secure { "https" } else { "http" };
        let default_port = (self.port == 80 && !self.secure) || (self.port == 443 && self.secure);
        let mut url = if default_port {
            format!("{}://{}{}", scheme, self.host, self.request_uri)
        } else {
            format!("{}://{}:{}{}", scheme, self.host, self.port, self.request_uri)
        };
        if include_params {
            let kind = if self.method.has_body() {
                ParamKind::GetOnly
            } else {
                ParamKind::All
            };
            let params = self.params.raw_param_string(kind, None);
            if !params.is_empty() {
                url.push('?');
                url.push_str(&params);
            }
        }
        url
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderSet {
        &mut self.headers
    }

    pub fn params(&self) -> &ParamManager {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParamManager {
        &mut self.params
    }

    /// Multipart boundary override. Digest authentication of a body-bearing
    /// request needs a fixed boundary so two serialization passes agree.
    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    pub fn set_boundary(&mut self, boundary: Option<String>) {
        self.boundary = boundary;
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: ParamValue, get_only: bool) -> Result<()> {
        self.params.set_param(name, value, get_only)
    }

    /// Sets an `Authorization` header for HTTP Basic.
    pub fn set_basic_credentials(&mut self, login: &str, password: &str) {
        self.headers
            .replace("Authorization", auth::basic_authorization(login, password));
    }

    /// Sets an `Authorization` header for HTTP Digest from a parsed
    /// challenge. The request is serialized into a sink to obtain the body
    /// bytes for qop=auth-int, so a body-bearing request must have its
    /// boundary fixed beforehand.
    pub fn set_digest_credentials(
        &mut self,
        challenge: &AuthChallenge,
        login: &str,
        password: &str,
    ) -> Result<()> {
        if self.boundary.is_none() {
            return Err(WebError::DigestOptions(
                "a fixed boundary is required for digest authentication".into(),
            ));
        }
        let mut sink = SinkTransport::new();
        self.write_to(&mut sink)?;
        let serialized = WebResponse::new(sink.into_contents());
        let body = serialized.body().to_vec();
        let uri = util::url_decode(&self.request_uri);
        let value =
            auth::digest_authorization(challenge, login, password, &body, self.method.as_str(), &uri)?;
        self.headers.replace("Authorization", value);
        Ok(())
    }

    /// Serializes the request onto a transport: request line, headers,
    /// blank line, then the body. POST/PUT parameters become either an
    /// urlencoded form or multipart/form-data when attachments are present;
    /// for other methods the parameters travel in the query string.
    pub fn write_to(&mut self, socket: &mut dyn Transport) -> Result<()> {
        let mut uri = self.request_uri.clone();
        let mut body = String::new();
        let mut boundary = None;

        if self.method.has_body() {
            let query = self.params.raw_param_string(ParamKind::GetOnly, None);
            if !query.is_empty() {
                uri.push('?');
                uri.push_str(&query);
            }
            if self.params.has_attachments() {
                let b = self
                    .boundary
                    .clone()
                    .unwrap_or_else(generate_boundary);
                body = self.params.raw_param_string(ParamKind::BodyOnly, Some(&b));
                let length = body.len() as u64 + self.params.raw_file_data_len(&b);
                self.headers.replace(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", b),
                );
                self.headers.replace("Content-Length", length.to_string());
                boundary = Some(b);
            } else {
                body = self.params.raw_param_string(ParamKind::BodyOnly, None);
                self.headers
                    .replace("Content-Type", "application/x-www-form-urlencoded");
                self.headers
                    .replace("Content-Length", body.len().to_string());
            }
        } else {
            if self.params.has_attachments() {
                return Err(WebError::Unsupported(format!(
                    "unable to send file attachments via {}",
                    self.method.as_str()
                )));
            }
            let query = self.params.raw_param_string(ParamKind::All, None);
            if !query.is_empty() {
                uri.push('?');
                uri.push_str(&query);
            }
            if self.headers.get("Content-Type") == Some("application/x-www-form-urlencoded") {
                self.headers.remove("Content-Type");
            }
            self.headers.remove("Content-Length");
        }

        let mut raw_headers = self.headers.to_wire();
        if !raw_headers.is_empty() {
            raw_headers.push_str("\r\n");
        }
        let head = format!(
            "{} {} HTTP/{}\r\n{}\r\n{}",
            self.method.as_str(),
            uri,
            self.http_version.as_str(),
            raw_headers,
            body,
        );
        socket.write_all(head.as_bytes())?;
        if let Some(b) = boundary {
            self.params.write_file_data(socket, &b)?;
        }
        Ok(())
    }
}

/// Random multipart boundary: base64 of a hash of a random value, with the
/// characters unsafe inside a boundary stripped.
fn generate_boundary() -> String {
    let token = auth::md5_hex(rand::random::<u32>().to_string().as_bytes());
    BASE64
        .encode(token.as_bytes())
        .replace(['/', '+', '='], "")
}

fn parse_query(query: &str, params: &mut ParamManager) -> Result<()> {
    let mut collected: Vec<(String, ParamValue)> = Vec::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (raw_name, value) = match pair.split_once('=') {
            Some((n, v)) => (n, Some(v)),
            None => (pair, None),
        };
        if let Some(name) = raw_name.strip_suffix("[]") {
            let value = value.unwrap_or("");
            match collected.iter_mut().find(|(n, _)| n == name) {
                Some((_, ParamValue::List(items))) => items.push(value.into()),
                Some(_) => {
                    return Err(WebError::UrlParse(format!(
                        "parameter {} mixes scalar and array forms",
                        name
                    )))
                }
                None => collected.push((name.to_string(), ParamValue::List(vec![value.into()]))),
            }
        } else {
            let new_value = match value {
                Some(v) => ParamValue::text(v),
                None => ParamValue::Flag,
            };
            match collected.iter_mut().find(|(n, _)| n == raw_name) {
                Some((_, ParamValue::List(_))) => {
                    return Err(WebError::UrlParse(format!(
                        "parameter {} mixes scalar and array forms",
                        raw_name
                    )))
                }
                Some((_, v)) => *v = new_value,
                None => collected.push((raw_name.to_string(), new_value)),
            }
        }
    }
    for (name, value) in collected {
        params.set_param(name, value, true)?;
    }
    Ok(())
}
