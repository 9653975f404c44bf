/*
 * socks.rs
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

//! SOCKS proxy transport covering protocol versions 4, 4a and 5.
//! SOCKS4 resolves hostnames locally; 4a and 5 pass them to the proxy.

use std::net::Ipv4Addr;

use crate::error::{Result, WebError};
use crate::http::request::WebRequest;
use crate::http::response::WebResponse;
use crate::http::wire;
use crate::proxy::tunnel_target;
use crate::transport::Transport;
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksVersion {
    V4,
    V4a,
    V5,
}

pub struct SocksProxy {
    version: SocksVersion,
    inner: Box<dyn Transport>,
    host: String,
    port: u16,
    login: Option<String>,
    password: Option<String>,
}

impl SocksProxy {
    pub fn new(
        version: SocksVersion,
        host: impl Into<String>,
        port: u16,
        inner: Box<dyn Transport>,
    ) -> Self {
        Self {
            version,
            inner,
            host: host.into(),
            port,
            login: None,
            password: None,
        }
    }

    /// SOCKS5 uses both values for the username/password subnegotiation;
    /// SOCKS4 and 4a send only the login as the user id.
    pub fn set_credentials(&mut self, login: impl Into<String>, password: impl Into<String>) {
        self.login = Some(login.into());
        self.password = Some(password.into());
    }

    fn authorize(&mut self, host: &str, port: u16) -> Result<()> {
        log::debug!(
            "SOCKS{:?} tunnel to {}:{} via {}:{}",
            self.version,
            host,
            port,
            self.host,
            self.port
        );
        match self.version {
            SocksVersion::V5 => self.authorize_v5(host, port),
            SocksVersion::V4 => {
                let ip = util::resolve_hostname(host)?;
                self.authorize_v4(ip, None, port)
            }
            SocksVersion::V4a => {
                if util::is_ipv4_address(host) {
                    let ip = util::resolve_hostname(host)?;
                    self.authorize_v4(ip, None, port)
                } else {
                    // placeholder address tells the proxy to resolve the
                    // trailing hostname itself
                    self.authorize_v4(Ipv4Addr::new(0, 0, 0, 1), Some(host), port)
                }
            }
        }
    }

    fn authorize_v5(&mut self, host: &str, port: u16) -> Result<()> {
        // offer no-auth and username/password
        self.write_all(&[5, 2, 0, 2])?;
        let method = wire::read_exact(self, 2)?;
        if method == [5, 2] {
            let (login, password) = match (&self.login, &self.password) {
                (Some(l), Some(p)) => (l.clone(), p.clone()),
                _ => return Err(WebError::ProxyAuthRequired),
            };
            let mut message = vec![1, login.len() as u8];
            message.extend_from_slice(login.as_bytes());
            message.push(password.len() as u8);
            message.extend_from_slice(password.as_bytes());
            self.write_all(&message)?;
            let status = wire::read_exact(self, 2)?;
            if status != [1, 0] {
                return Err(WebError::ProxyAuth("credentials rejected".into()));
            }
        } else if method != [5, 0] {
            return Err(WebError::ProxyAuth(
                "no acceptable authentication method".into(),
            ));
        }

        let mut message = vec![5, 1, 0];
        if util::is_ipv4_address(host) {
            message.push(1);
            message.extend_from_slice(&util::resolve_hostname(host)?.octets());
        } else {
            message.push(3);
            message.push(host.len() as u8);
            message.extend_from_slice(host.as_bytes());
        }
        message.extend_from_slice(&port.to_be_bytes());
        self.write_all(&message)?;

        let reply = wire::read_exact(self, 4)?;
        if reply[0] != 5 || reply[1] != 0 {
            return Err(WebError::ProxyAuth(format!(
                "connect rejected with code {}",
                reply[1]
            )));
        }
        // bound address, parsed by type and discarded
        match reply[3] {
            1 => {
                wire::read_exact(self, 4)?;
            }
            3 => {
                let len = wire::read_exact(self, 1)?[0] as usize;
                wire::read_exact(self, len)?;
            }
            4 => {
                wire::read_exact(self, 16)?;
            }
            other => {
                return Err(WebError::ProxyAuth(format!(
                    "unknown bound address type {}",
                    other
                )))
            }
        }
        wire::read_exact(self, 2)?;
        Ok(())
    }

    fn authorize_v4(&mut self, ip: Ipv4Addr, hostname: Option<&str>, port: u16) -> Result<()> {
        let mut message = vec![4, 1];
        message.extend_from_slice(&port.to_be_bytes());
        message.extend_from_slice(&ip.octets());
        if let Some(login) = &self.login {
            message.extend_from_slice(login.as_bytes());
        }
        message.push(0);
        if let Some(hostname) = hostname {
            message.extend_from_slice(hostname.as_bytes());
            message.push(0);
        }
        self.write_all(&message)?;

        let reply = wire::read_exact(self, 8)?;
        if reply[0] != 0 || reply[1] != 0x5a {
            return Err(WebError::ProxyAuth(format!(
                "request rejected with code {:#04x}",
                reply[1]
            )));
        }
        Ok(())
    }
}

impl Transport for SocksProxy {
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
        let (host, port) = tunnel_target(self.inner.as_ref(), request);
        if let Err(e) = self.authorize(&host, port) {
            // a failed handshake leaves the connection desynchronized
            self.close();
            return Err(e);
        }
        self.inner.send_request(request)
    }

    fn is_proxy(&self) -> bool {
        true
    }

    fn proxy_addr(&self) -> Option<(String, u16)> {
        Some((self.host.clone(), self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::Method;
    use crate::transport::testing::{ScriptedTransport, SharedTransport};

    fn ok_response() -> Option<WebResponse> {
        Some(WebResponse::new(b"HTTP/1.1 200 OK\r\n\r\nok".to_vec()))
    }

    fn shared(input: Vec<u8>) -> SharedTransport {
        let mut script = ScriptedTransport::new(input);
        script.responses.push_back(ok_response());
        SharedTransport::new(script)
    }

    #[test]
    fn v5_handshake_with_domain_target() {
        // no-auth method, then success reply with an IPv4 bound address
        let input = [&[5u8, 0][..], &[5, 0, 0, 1, 9, 9, 9, 9, 0, 80][..]].concat();
        let inner = shared(input);
        let handle = inner.clone();
        let mut proxy = SocksProxy::new(SocksVersion::V5, "socks.example", 1080, Box::new(inner));

        let mut request = WebRequest::new("www.example", 80, Method::Get, "/");
        let response = proxy.send_request(&mut request).unwrap().unwrap();
        assert_eq!(response.body(), b"ok");

        let script = handle.0.borrow();
        assert_eq!(script.opened_to, Some(("socks.example".to_string(), 1080)));
        let mut expected = vec![5, 2, 0, 2, 5, 1, 0, 3, 11];
        expected.extend_from_slice(b"www.example");
        expected.extend_from_slice(&[0, 80]);
        assert_eq!(script.written, expected);
    }

    #[test]
    fn v5_ipv4_target_uses_the_literal_form() {
        let input = [&[5u8, 0][..], &[5, 0, 0, 1, 9, 9, 9, 9, 0, 80][..]].concat();
        let inner = shared(input);
        let handle = inner.clone();
        let mut proxy = SocksProxy::new(SocksVersion::V5, "socks.example", 1080, Box::new(inner));

        let mut request = WebRequest::new("192.0.2.7", 8080, Method::Get, "/");
        proxy.send_request(&mut request).unwrap();
        let script = handle.0.borrow();
        assert_eq!(
            script.written,
            vec![5, 2, 0, 2, 5, 1, 0, 1, 192, 0, 2, 7, 0x1f, 0x90]
        );
    }

    #[test]
    fn v5_credentials_subnegotiation() {
        let input = [
            &[5u8, 2][..],
            &[1, 0][..],
            &[5, 0, 0, 1, 9, 9, 9, 9, 0, 80][..],
        ]
        .concat();
        let inner = shared(input);
        let handle = inner.clone();
        let mut proxy = SocksProxy::new(SocksVersion::V5, "socks.example", 1080, Box::new(inner));
        proxy.set_credentials("user", "pw");

        let mut request = WebRequest::new("192.0.2.7", 80, Method::Get, "/");
        proxy.send_request(&mut request).unwrap();
        let script = handle.0.borrow();
        let mut expected = vec![5, 2, 0, 2, 1, 4];
        expected.extend_from_slice(b"user");
        expected.push(2);
        expected.extend_from_slice(b"pw");
        expected.extend_from_slice(&[5, 1, 0, 1, 192, 0, 2, 7, 0, 80]);
        assert_eq!(script.written, expected);
    }

    #[test]
    fn v5_auth_demanded_without_credentials() {
        let inner = shared(vec![5, 2]);
        let handle = inner.clone();
        let mut proxy = SocksProxy::new(SocksVersion::V5, "socks.example", 1080, Box::new(inner));
        let mut request = WebRequest::new("192.0.2.7", 80, Method::Get, "/");
        assert!(matches!(
            proxy.send_request(&mut request),
            Err(WebError::ProxyAuthRequired)
        ));
        // nothing past the greeting went out
        assert_eq!(handle.0.borrow().written, vec![5, 2, 0, 2]);
    }

    #[test]
    fn v5_rejection_codes() {
        let input = [&[5u8, 0][..], &[5, 5, 0, 1, 0, 0, 0, 0, 0, 0][..]].concat();
        let inner = shared(input);
        let mut proxy = SocksProxy::new(SocksVersion::V5, "socks.example", 1080, Box::new(inner));
        let mut request = WebRequest::new("192.0.2.7", 80, Method::Get, "/");
        assert!(matches!(
            proxy.send_request(&mut request),
            Err(WebError::ProxyAuth(_))
        ));
    }

    #[test]
    fn failed_handshake_releases_the_connection() {
        let input = [&[5u8, 0][..], &[5, 5, 0, 1, 0, 0, 0, 0, 0, 0][..]].concat();
        let inner = shared(input);
        let handle = inner.clone();
        let mut proxy = SocksProxy::new(SocksVersion::V5, "socks.example", 1080, Box::new(inner));
        let mut request = WebRequest::new("192.0.2.7", 80, Method::Get, "/");
        assert!(proxy.send_request(&mut request).is_err());
        assert!(!proxy.is_open());
        assert!(!handle.0.borrow().is_open());
    }

    #[test]
    fn v4_request_frame() {
        let inner = shared(vec![0, 0x5a, 0, 0, 0, 0, 0, 0]);
        let handle = inner.clone();
        let mut proxy = SocksProxy::new(SocksVersion::V4, "socks.example", 1080, Box::new(inner));
        proxy.set_credentials("uid", "");

        let mut request = WebRequest::new("192.0.2.7", 80, Method::Get, "/");
        proxy.send_request(&mut request).unwrap();
        let mut expected = vec![4, 1, 0, 80, 192, 0, 2, 7];
        expected.extend_from_slice(b"uid");
        expected.push(0);
        assert_eq!(handle.0.borrow().written, expected);
    }

    #[test]
    fn v4_rejection() {
        let inner = shared(vec![0, 0x5b, 0, 0, 0, 0, 0, 0]);
        let mut proxy = SocksProxy::new(SocksVersion::V4, "socks.example", 1080, Box::new(inner));
        let mut request = WebRequest::new("192.0.2.7", 80, Method::Get, "/");
        assert!(matches!(
            proxy.send_request(&mut request),
            Err(WebError::ProxyAuth(_))
        ));
    }

    #[test]
    fn v4a_sends_hostname_after_placeholder() {
        let inner = shared(vec![0, 0x5a, 0, 0, 0, 0, 0, 0]);
        let handle = inner.clone();
        let mut proxy = SocksProxy::new(SocksVersion::V4a, "socks.example", 1080, Box::new(inner));

        let mut request = WebRequest::new("www.example", 80, Method::Get, "/");
        proxy.send_request(&mut request).unwrap();
        let mut expected = vec![4, 1, 0, 80, 0, 0, 0, 1, 0];
        expected.extend_from_slice(b"www.example");
        expected.push(0);
        assert_eq!(handle.0.borrow().written, expected);
    }

    #[test]
    fn chain_targets_the_next_proxy() {
        let input = [&[5u8, 0][..], &[5, 0, 0, 1, 9, 9, 9, 9, 0, 80][..]].concat();
        let mut script = ScriptedTransport::new(input);
        script.act_as_proxy = Some(("10.0.0.1".to_string(), 1081));
        script.responses.push_back(ok_response());
        let inner = SharedTransport::new(script);
        let handle = inner.clone();
        let mut proxy = SocksProxy::new(SocksVersion::V5, "socks.example", 1080, Box::new(inner));

        let mut request = WebRequest::new("www.example", 80, Method::Get, "/");
        proxy.send_request(&mut request).unwrap();
        let script = handle.0.borrow();
        assert_eq!(
            script.written,
            vec![5, 2, 0, 2, 5, 1, 0, 1, 10, 0, 0, 1, 0x04, 0x39]
        );
    }
}
