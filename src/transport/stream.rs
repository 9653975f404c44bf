/*
 * stream.rs
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

//! Blocking stream transport with optional TLS upgrade. OS-level socket
//! timeouts are refreshed from the remaining budget before each operation,
//! so enforcement is approximate but cheap.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConnection, StreamOwned};

use crate::error::{Result, WebError};
use crate::transport::timeout::TimeoutState;
use crate::transport::tls::insecure_client_config;
use crate::transport::{NetworkSocket, SocketCore};

enum Inner {
    Closed,
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

pub struct StreamCore {
    inner: Inner,
}

/// The default transport: a blocking TCP stream, upgradable to TLS.
pub type StreamSocket = NetworkSocket<StreamCore>;

impl StreamSocket {
    pub fn new() -> Self {
        NetworkSocket::with_core(StreamCore {
            inner: Inner::Closed,
        })
    }
}

impl Default for StreamSocket {
    fn default() -> Self {
        Self::new()
    }
}

fn budget(state: &TimeoutState) -> Result<Duration> {
    let available = state.available();
    if available.is_zero() {
        return Err(WebError::Timeout);
    }
    Ok(available)
}

fn map_io(e: std::io::Error) -> WebError {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => WebError::Timeout,
        _ => WebError::Read(e.to_string()),
    }
}

impl StreamCore {
    fn tcp(&self) -> Result<&TcpStream> {
        match &self.inner {
            Inner::Plain(s) => Ok(s),
            Inner::Tls(s) => Ok(s.get_ref()),
            Inner::Closed => Err(WebError::Read("socket is not open".into())),
        }
    }
}

impl SocketCore for StreamCore {
    fn connect(&mut self, host: &str, port: u16, state: &TimeoutState) -> Result<()> {
        let budget = budget(state)?;
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| WebError::Resolve(format!("{}: {}", host, e)))?
            .next()
            .ok_or_else(|| WebError::Resolve(host.to_string()))?;
        let stream = TcpStream::connect_timeout(&addr, budget)
            .map_err(|e| WebError::Connect(format!("{}:{}: {}", host, port, e)))?;
        self.inner = Inner::Plain(stream);
        Ok(())
    }

    fn read_part(&mut self, length: usize, state: &TimeoutState) -> Result<Vec<u8>> {
        let budget = budget(state)?;
        self.tcp()?
            .set_read_timeout(Some(budget))
            .map_err(|e| WebError::Read(e.to_string()))?;
        let mut buf = vec![0u8; length];
        let n = match &mut self.inner {
            Inner::Plain(s) => s.read(&mut buf),
            Inner::Tls(s) => s.read(&mut buf),
            Inner::Closed => return Err(WebError::Read("socket is not open".into())),
        }
        .map_err(map_io)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn write_part(&mut self, data: &[u8], state: &TimeoutState) -> Result<usize> {
        let budget = budget(state)?;
        self.tcp()?
            .set_write_timeout(Some(budget))
            .map_err(|e| WebError::Write(e.to_string()))?;
        match &mut self.inner {
            Inner::Plain(s) => s.write(data),
            Inner::Tls(s) => s.write(data),
            Inner::Closed => return Err(WebError::Write("socket is not open".into())),
        }
        .map_err(|e| match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => WebError::Timeout,
            _ => WebError::Write(e.to_string()),
        })
    }

    fn shutdown(&mut self) {
        self.inner = Inner::Closed;
    }

    fn set_secure(&mut self, secure: bool, host: &str, state: &TimeoutState) -> Result<()> {
        if !secure {
            return Err(WebError::Unsupported(
                "unable to drop TLS from an established stream".into(),
            ));
        }
        let budget = budget(state)?;
        let stream = match std::mem::replace(&mut self.inner, Inner::Closed) {
            Inner::Plain(s) => s,
            Inner::Tls(s) => {
                self.inner = Inner::Tls(s);
                return Ok(());
            }
            Inner::Closed => return Err(WebError::Connect("socket is not open".into())),
        };
        stream
            .set_read_timeout(Some(budget))
            .and_then(|_| stream.set_write_timeout(Some(budget)))
            .map_err(|e| WebError::Connect(e.to_string()))?;
        let name = ServerName::try_from(host.to_string())
            .map_err(|_| WebError::Connect(format!("invalid TLS server name: {}", host)))?;
        let mut conn = ClientConnection::new(insecure_client_config(), name)
            .map_err(|e| WebError::Connect(format!("TLS setup: {}", e)))?;
        let mut stream = stream;
        while conn.is_handshaking() {
            conn.complete_io(&mut stream).map_err(|e| match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => WebError::Timeout,
                _ => WebError::Connect(format!("TLS handshake: {}", e)),
            })?;
        }
        self.inner = Inner::Tls(Box::new(StreamOwned::new(conn, stream)));
        Ok(())
    }

    fn is_open(&self) -> bool {
        !matches!(self.inner, Inner::Closed)
    }

    fn is_secure(&self) -> bool {
        matches!(self.inner, Inner::Tls(_))
    }
}
