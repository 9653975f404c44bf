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

//! Transports: the [`Transport`] abstraction, the blocking and polling
//! socket implementations and a byte sink for offline serialization.

mod poll;
mod stream;
pub mod timeout;
mod tls;

pub use poll::PollSocket;
pub use stream::StreamSocket;
pub use timeout::{TimeoutMode, TimeoutState, DEFAULT_TIMEOUT};

use crate::error::{Result, WebError};
use crate::http::headers::HeaderSet;
use crate::http::request::WebRequest;
use crate::http::response::WebResponse;
use crate::http::wire::{self, BodyOutcome};

/// Called once the full header block has arrived; returning false stops
/// the exchange with a headers-only response.
pub type HeadersCallback = Box<dyn FnMut(&str, &WebRequest) -> bool>;

/// Called for every block of body data instead of buffering; returning
/// false abandons the rest of the body.
pub type BodyChunkCallback = Box<dyn FnMut(&str, &[u8], &WebRequest) -> bool>;

/// Anything a request can be sent over: the two socket flavors, the proxy
/// wrappers and the offline sink. Raw operations move bytes; `send_request`
/// runs one full request/response exchange.
pub trait Transport {
    fn open(&mut self, host: &str, port: u16) -> Result<()>;

    /// Reads up to `length` bytes. An empty result means the peer closed
    /// the connection.
    fn read(&mut self, length: usize) -> Result<Vec<u8>>;

    /// Writes the whole buffer, looping over partial writes.
    fn write_all(&mut self, data: &[u8]) -> Result<usize>;

    fn close(&mut self);

    /// Switches TLS on or off for the open connection.
    fn upgrade_secure(&mut self, secure: bool) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Runs one exchange. `Ok(None)` means the transport consumed the
    /// request without producing a response (the byte sink does this).
    fn send_request(&mut self, request: &mut WebRequest) -> Result<Option<WebResponse>>;

    /// True for proxy wrappers; lets an outer proxy tunnel to the inner
    /// proxy instead of the final target.
    fn is_proxy(&self) -> bool {
        false
    }

    /// The proxy's own address, for chained tunnels.
    fn proxy_addr(&self) -> Option<(String, u16)> {
        None
    }
}

/// Core socket operations behind [`NetworkSocket`]. Implementations move
/// bytes; the wrapper owns timeout accounting, callbacks and the HTTP
/// exchange.
pub trait SocketCore {
    fn connect(&mut self, host: &str, port: u16, state: &TimeoutState) -> Result<()>;
    fn read_part(&mut self, length: usize, state: &TimeoutState) -> Result<Vec<u8>>;
    fn write_part(&mut self, data: &[u8], state: &TimeoutState) -> Result<usize>;
    fn shutdown(&mut self);
    fn set_secure(&mut self, secure: bool, host: &str, state: &TimeoutState) -> Result<()>;
    fn is_open(&self) -> bool;
    fn is_secure(&self) -> bool;
}

/// A socket transport: timeout bracketing around every core operation plus
/// the request/response exchange. The connection is always closed once an
/// exchange finishes, successfully or not.
pub struct NetworkSocket<C: SocketCore> {
    core: C,
    state: TimeoutState,
    host: String,
    on_headers: Option<HeadersCallback>,
    on_body: Option<BodyChunkCallback>,
}

impl<C: SocketCore> NetworkSocket<C> {
    pub(crate) fn with_core(core: C) -> Self {
        Self {
            core,
            state: TimeoutState::new(),
            host: String::new(),
            on_headers: None,
            on_body: None,
        }
    }

    pub fn set_timeout(&mut self, timeout: std::time::Duration) {
        self.state.set_timeout(timeout);
    }

    pub fn timeout(&self) -> std::time::Duration {
        self.state.timeout()
    }

    pub fn set_timeout_mode(&mut self, mode: TimeoutMode) {
        self.state.set_mode(mode);
    }

    pub fn timeout_mode(&self) -> TimeoutMode {
        self.state.mode()
    }

    /// Remaining timeout budget.
    pub fn available_time(&self) -> std::time::Duration {
        self.state.available()
    }

    pub fn set_on_headers(&mut self, callback: Option<HeadersCallback>) {
        self.on_headers = callback;
    }

    pub fn set_on_body(&mut self, callback: Option<BodyChunkCallback>) {
        self.on_body = callback;
    }

    fn exchange(&mut self, request: &mut WebRequest) -> Result<Option<WebResponse>> {
        request.write_to(self)?;
        let raw_headers = wire::read_header_block(self)?;

        if let Some(mut cb) = self.on_headers.take() {
            let keep = cb(&raw_headers, request);
            self.on_headers = Some(cb);
            if !keep {
                log::debug!("headers callback stopped the exchange");
                return Ok(Some(WebResponse::new(raw_headers.into_bytes())));
            }
        }

        let parsed = HeaderSet::parse(&raw_headers);
        let encoding = parsed.get("Content-Encoding").map(str::to_string);
        let mut on_body = self.on_body.take();
        let cb = on_body.as_deref_mut();
        let outcome = match parsed.content_length() {
            Some(0) => Ok(BodyOutcome::Buffered(Vec::new())),
            Some(n) => wire::read_length(self, n as usize, &raw_headers, request, cb),
            None if parsed.is_chunked() => wire::read_chunked(self, &raw_headers, request, cb),
            None => wire::read_to_close(self, &raw_headers, request, cb),
        };
        self.on_body = on_body;

        match outcome? {
            BodyOutcome::Streamed | BodyOutcome::Aborted => {
                Ok(Some(WebResponse::new(raw_headers.into_bytes())))
            }
            BodyOutcome::Buffered(body) => {
                let body = wire::decode_body(body, encoding.as_deref())?;
                let mut raw = raw_headers.into_bytes();
                raw.extend_from_slice(&body);
                Ok(Some(WebResponse::new(raw)))
            }
        }
    }
}

impl<C: SocketCore> Transport for NetworkSocket<C> {
    fn open(&mut self, host: &str, port: u16) -> Result<()> {
        log::debug!("connecting to {}:{}", host, port);
        self.state.start(true);
        self.core.connect(host, port, &self.state)?;
        self.host = host.to_string();
        self.state.checkpoint()
    }

    fn read(&mut self, length: usize) -> Result<Vec<u8>> {
        self.state.start(false);
        let data = self.core.read_part(length, &self.state)?;
        self.state.checkpoint()?;
        Ok(data)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<usize> {
        let mut written = 0;
        while written < data.len() {
            self.state.start(false);
            let n = self.core.write_part(&data[written..], &self.state)?;
            if n == 0 {
                return Err(WebError::Write("socket accepted no data".into()));
            }
            written += n;
            self.state.checkpoint()?;
        }
        Ok(written)
    }

    fn close(&mut self) {
        self.core.shutdown();
    }

    fn upgrade_secure(&mut self, secure: bool) -> Result<()> {
        if self.core.is_secure() == secure {
            return Ok(());
        }
        if !self.core.is_open() {
            return Err(WebError::Unsupported(
                "secure mode can only change on an open connection".into(),
            ));
        }
        log::debug!("switching {} secure={}", self.host, secure);
        self.state.start(false);
        let host = self.host.clone();
        self.core.set_secure(secure, &host, &self.state)?;
        self.state.checkpoint()
    }

    fn is_open(&self) -> bool {
        self.core.is_open()
    }

    fn send_request(&mut self, request: &mut WebRequest) -> Result<Option<WebResponse>> {
        if !self.is_open() {
            let host = request.host().to_string();
            let port = request.port();
            self.open(&host, port)?;
        }
        self.upgrade_secure(request.is_secure())?;
        log::debug!("{} {}", request.method().as_str(), request.full_address(false));
        let result = self.exchange(request);
        // one exchange per connection, release the socket either way
        self.close();
        result
    }
}

/// Transport that swallows everything written to it. Used to serialize a
/// request offline (digest auth needs the body bytes before sending).
#[derive(Default)]
pub struct SinkTransport {
    contents: Vec<u8>,
    open: bool,
}

impl SinkTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn into_contents(self) -> Vec<u8> {
        self.contents
    }

    pub fn clear(&mut self) {
        self.contents.clear();
    }
}

impl Transport for SinkTransport {
    fn open(&mut self, _host: &str, _port: u16) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn read(&mut self, _length: usize) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<usize> {
        self.contents.extend_from_slice(data);
        Ok(data.len())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn upgrade_secure(&mut self, _secure: bool) -> Result<()> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn send_request(&mut self, request: &mut WebRequest) -> Result<Option<WebResponse>> {
        request.write_to(self)?;
        Ok(None)
    }
}
