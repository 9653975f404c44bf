/*
 * http.rs
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

//! HTTP proxy transport. Plain requests are forwarded with an absolute
//! request URI; TLS targets and chained proxies get a CONNECT tunnel.

use crate::auth;
use crate::error::{Result, WebError};
use crate::http::request::{Method, WebRequest};
use crate::http::response::WebResponse;
use crate::http::wire;
use crate::proxy::tunnel_target;
use crate::transport::Transport;

pub struct HttpProxy {
    inner: Box<dyn Transport>,
    host: String,
    port: u16,
    login: Option<String>,
    password: Option<String>,
}

impl HttpProxy {
    pub fn new(host: impl Into<String>, port: u16, inner: Box<dyn Transport>) -> Self {
        Self {
            inner,
            host: host.into(),
            port,
            login: None,
            password: None,
        }
    }

    pub fn set_credentials(&mut self, login: impl Into<String>, password: impl Into<String>) {
        self.login = Some(login.into());
        self.password = Some(password.into());
    }

    fn proxy_authorization(&self) -> Option<String> {
        match (&self.login, &self.password) {
            (Some(login), Some(password)) => Some(auth::basic_authorization(login, password)),
            _ => None,
        }
    }

    /// Establishes a CONNECT tunnel to the given address.
    fn authorize(&mut self, host: &str, port: u16) -> Result<()> {
        log::debug!("CONNECT {}:{} via {}:{}", host, port, self.host, self.port);
        let mut connect =
            WebRequest::new(host, port, Method::Connect, format!("{}:{}", host, port));
        connect.set_secure(false);
        connect.headers_mut().clear();
        if let Some(value) = self.proxy_authorization() {
            connect.headers_mut().add("Proxy-Authorization", value);
        }
        connect.write_to(self)?;
        let raw = wire::read_header_block(self)?;
        let response = WebResponse::new(raw.into_bytes());
        match response.http_code()? {
            200 => Ok(()),
            407 => Err(WebError::ProxyAuthRequired),
            code => Err(WebError::ProxyAuth(format!(
                "CONNECT failed with status {}",
                code
            ))),
        }
    }

    /// Forwards a plain request through the proxy: the request URI is
    /// temporarily rewritten to its absolute form and restored afterwards.
    fn forward(&mut self, request: &mut WebRequest) -> Result<Option<WebResponse>> {
        let original_uri = request.request_uri().to_string();
        let absolute = format!(
            "http://{}:{}{}",
            request.host(),
            request.port(),
            original_uri
        );
        request.set_request_uri(absolute, false);
        let authorization = self.proxy_authorization();
        if let Some(value) = &authorization {
            request.headers_mut().replace("Proxy-Authorization", value.clone());
        }
        let result = self.inner.send_request(request);
        request.set_request_uri(original_uri, false);
        if authorization.is_some() {
            request.headers_mut().remove("Proxy-Authorization");
        }
        let response = result?;
        if let Some(response) = &response {
            if response.http_code()? == 407 {
                return Err(WebError::ProxyAuthRequired);
            }
        }
        Ok(response)
    }
}

impl Transport for HttpProxy {
    fn open(&mut self, host: &str, port: u16) -> Result<()> {
        self.inner.open(host, port)
    }

    fn read(&mut self, length: usize) -> Result<Vec<u8>> {
        self.inner.read(length)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<usize> {
        self.inner.write_all(data)
    }

    fn close(&mut self) {
        self.inner.close()
    }

    fn upgrade_secure(&mut self, secure: bool) -> Result<()> {
        self.inner.upgrade_secure(secure)
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn send_request(&mut self, request: &mut WebRequest) -> Result<Option<WebResponse>> {
        if !self.is_open() {
            let (host, port) = (self.host.clone(), self.port);
            self.open(&host, port)?;
        }
        if self.inner.is_proxy() || request.is_secure() {
            let (host, port) = tunnel_target(self.inner.as_ref(), request);
            if let Err(e) = self.authorize(&host, port) {
                // a refused CONNECT leaves the connection desynchronized
                self.close();
                return Err(e);
            }
            return self.inner.send_request(request);
        }
        self.forward(request)
    }

    fn is_proxy(&self) -> bool {
        true
    }

    fn proxy_addr(&self) -> Option<(String, u16)> {
        Some((self.host.clone(), self.port))
    }
}
