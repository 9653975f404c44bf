/*
 * lib.rs
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

//! Ragnatela is a socket-level HTTP(S) client engine: pluggable
//! transports (blocking, polling, TLS), chainable HTTP CONNECT and
//! SOCKS4/4a/5 proxies, cookie handling, Basic/Digest authentication and
//! redirect following, all synchronous and built directly on TCP streams.
//!
//! The layers stack cleanly: a [`transport::Transport`] moves bytes and
//! runs single exchanges, [`proxy`] wrappers tunnel one transport through
//! another, and [`manager::HttpRequestManager`] drives multi-request
//! conversations on top of any of them.

pub mod auth;
pub mod cookie;
pub mod error;
pub mod http;
pub mod manager;
pub mod proxy;
pub mod transport;
mod util;

pub use auth::{AuthChallenge, AuthScheme};
pub use cookie::{CookieJar, FilterAction, HttpCookie};
pub use error::{Result, WebError};
pub use http::headers::HeaderSet;
pub use http::params::{Attachment, ContentSource, FileSource, ParamManager, ParamValue};
pub use http::request::{HttpVersion, Method, WebRequest};
pub use http::response::WebResponse;
pub use manager::HttpRequestManager;
pub use proxy::{HttpProxy, SocksProxy, SocksVersion};
pub use transport::{
    PollSocket, SinkTransport, StreamSocket, TimeoutMode, Transport,
};
