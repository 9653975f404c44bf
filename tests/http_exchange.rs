/*
 * http_exchange.rs
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

//! End-to-end exchanges against a scripted TCP server.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;

use ragnatela::{
    HttpRequestManager, Method, PollSocket, StreamSocket, Transport, WebError, WebRequest,
};

/// Serves one canned response per accepted connection and reports the raw
/// request bytes back over a channel.
fn spawn_server(listener: TcpListener, responses: Vec<Vec<u8>>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for response in responses {
            let (mut stream, _) = match listener.accept() {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let request = read_request(&mut stream);
            let _ = tx.send(request);
            let _ = stream.write_all(&response);
        }
    });
    rx
}

fn serve(responses: Vec<Vec<u8>>) -> (SocketAddr, mpsc::Receiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let rx = spawn_server(listener, responses);
    (addr, rx)
}

fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(1) => buf.push(byte[0]),
            _ => return buf,
        }
    }
    let head = String::from_utf8_lossy(&buf).to_ascii_lowercase();
    if let Some(rest) = head.split("content-length:").nth(1) {
        let length: usize = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let mut body = vec![0u8; length];
        if stream.read_exact(&mut body).is_ok() {
            buf.extend_from_slice(&body);
        }
    }
    buf
}

#[test]
fn get_with_content_length() {
    let (addr, requests) = serve(vec![
        b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello".to_vec(),
    ]);
    let mut socket = StreamSocket::new();
    let mut request = WebRequest::new("127.0.0.1", addr.port(), Method::Get, "/index.html");
    let response = socket.send_request(&mut request).unwrap().unwrap();
    assert_eq!(response.http_code().unwrap(), 200);
    assert_eq!(response.body(), b"hello");
    assert!(!socket.is_open());

    let seen = String::from_utf8(requests.recv().unwrap()).unwrap();
    assert!(seen.starts_with("GET /index.html HTTP/1.0\r\n"));
    assert!(seen.contains("Host: 127.0.0.1\r\n"));
    assert!(seen.contains("Connection: close\r\n"));
}

#[test]
fn chunked_response_is_reassembled() {
    let (addr, _requests) = serve(vec![
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n"
            .to_vec(),
    ]);
    let mut socket = StreamSocket::new();
    let mut request = WebRequest::new("127.0.0.1", addr.port(), Method::Get, "/");
    let response = socket.send_request(&mut request).unwrap().unwrap();
    assert_eq!(response.body(), b"Wikipedia");
}

#[test]
fn gzip_body_is_decoded() {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"compressed over the wire").unwrap();
    let payload = encoder.finish().unwrap();
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
        payload.len()
    )
    .into_bytes();
    response.extend_from_slice(&payload);

    let (addr, _requests) = serve(vec![response]);
    let mut socket = StreamSocket::new();
    let mut request = WebRequest::new("127.0.0.1", addr.port(), Method::Get, "/");
    let out = socket.send_request(&mut request).unwrap().unwrap();
    assert_eq!(out.body(), b"compressed over the wire");
}

#[test]
fn post_form_reaches_the_server() {
    let (addr, requests) = serve(vec![b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n"
        .to_vec()]);
    let mut socket = StreamSocket::new();
    let mut request = WebRequest::new("127.0.0.1", addr.port(), Method::Post, "/submit");
    request.params_mut().set_text("name", "mario rossi");
    request.params_mut().set_text("age", "42");
    socket.send_request(&mut request).unwrap().unwrap();

    let seen = String::from_utf8(requests.recv().unwrap()).unwrap();
    assert!(seen.starts_with("POST /submit HTTP/1.0\r\n"));
    assert!(seen.contains("Content-Type: application/x-www-form-urlencoded\r\n"));
    assert!(seen.ends_with("\r\n\r\nname=mario+rossi&age=42"));
}

#[test]
fn manager_follows_redirect_and_replays_cookie() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let first = format!(
        "HTTP/1.1 302 Found\r\nSet-Cookie: sid=xyz\r\nLocation: http://127.0.0.1:{}/next\r\nContent-Length: 0\r\n\r\n",
        addr.port()
    );
    let second = "HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone";
    let requests = spawn_server(listener, vec![first.into_bytes(), second.into()]);

    let mut manager = HttpRequestManager::new(Box::new(StreamSocket::new()));
    let mut request = WebRequest::new("127.0.0.1", addr.port(), Method::Get, "/start");
    let response = manager.run(&mut request).unwrap().unwrap();
    assert_eq!(response.http_code().unwrap(), 200);
    assert_eq!(response.body(), b"done");

    let _first_exchange = requests.recv().unwrap();
    let second_exchange = String::from_utf8(requests.recv().unwrap()).unwrap();
    assert!(second_exchange.starts_with("GET /next HTTP/1.0\r\n"));
    assert!(second_exchange.contains("Cookie: sid=xyz\r\n"));
    assert!(second_exchange.contains(&format!("Referer: http://127.0.0.1:{}/start", addr.port())));
}

#[test]
fn poll_socket_times_out_on_a_silent_server() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        // accept and hold the connection open without answering
        if let Ok((stream, _)) = listener.accept() {
            thread::sleep(Duration::from_secs(5));
            drop(stream);
        }
    });

    let mut socket = PollSocket::new();
    socket.set_timeout(Duration::from_millis(200));
    let mut request = WebRequest::new("127.0.0.1", addr.port(), Method::Get, "/");
    let start = std::time::Instant::now();
    let result = socket.send_request(&mut request);
    assert!(matches!(result, Err(WebError::Timeout)));
    assert!(start.elapsed() < Duration::from_secs(3));
}
