/*
 * poll.rs
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

//! Non-blocking transport. The socket runs in non-blocking mode and every
//! operation polls in a short sleep loop bounded by the remaining budget,
//! which enforces timeouts exactly. TLS is not available here.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use crate::error::{Result, WebError};
use crate::transport::timeout::TimeoutState;
use crate::transport::{NetworkSocket, SocketCore};
use crate::util;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct PollCore {
    stream: Option<TcpStream>,
}

/// Exact-timeout transport built on a non-blocking socket.
pub type PollSocket = NetworkSocket<PollCore>;

impl PollSocket {
    pub fn new() -> Self {
        NetworkSocket::with_core(PollCore { stream: None })
    }
}

impl Default for PollSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl PollCore {
    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| WebError::Read("socket is not open".into()))
    }
}

impl SocketCore for PollCore {
    fn connect(&mut self, host: &str, port: u16, state: &TimeoutState) -> Result<()> {
        let budget = state.available();
        if budget.is_zero() {
            return Err(WebError::Timeout);
        }
        let ip = util::resolve_hostname(host)?;
        let addr = SocketAddr::from((ip, port));
        let stream = TcpStream::connect_timeout(&addr, budget)
            .map_err(|e| WebError::Connect(format!("{}:{}: {}", host, port, e)))?;
        stream
            .set_nonblocking(true)
            .map_err(|e| WebError::Connect(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn read_part(&mut self, length: usize, state: &TimeoutState) -> Result<Vec<u8>> {
        let budget = state.available();
        let begin = Instant::now();
        let stream = self.stream()?;
        let mut buf = vec![0u8; length];
        loop {
            match stream.read(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if begin.elapsed() >= budget {
                        return Err(WebError::Timeout);
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(WebError::Read(e.to_string())),
            }
        }
    }

    fn write_part(&mut self, data: &[u8], state: &TimeoutState) -> Result<usize> {
        let budget = state.available();
        let begin = Instant::now();
        let stream = self.stream()?;
        loop {
            match stream.write(data) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if begin.elapsed() >= budget {
                        return Err(WebError::Timeout);
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(WebError::Write(e.to_string())),
            }
        }
    }

    fn shutdown(&mut self) {
        self.stream = None;
    }

    fn set_secure(&mut self, secure: bool, _host: &str, _state: &TimeoutState) -> Result<()> {
        if secure {
            return Err(WebError::Unsupported(
                "TLS is not available on the polling socket".into(),
            ));
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn is_secure(&self) -> bool {
        false
    }
}
