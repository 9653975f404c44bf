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

//! Proxy transports. Each proxy wraps another transport; wrapping a proxy
//! in a proxy builds a tunnel chain, where each hop authorizes a
//! connection to the next hop's address instead of the final target.

mod http;
mod socks;

pub use http::HttpProxy;
pub use socks::{SocksProxy, SocksVersion};

use crate::http::request::WebRequest;
use crate::transport::Transport;

/// The address a proxy must open a tunnel to: the next proxy in the chain,
/// or the request target at the last hop.
fn tunnel_target(inner: &dyn Transport, request: &WebRequest) -> (String, u16) {
    match inner.proxy_addr() {
        Some(addr) => addr,
        None => (request.host().to_string(), request.port()),
    }
}
