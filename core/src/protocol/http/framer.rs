/*
 * framer.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of pgrest-core, a memory-bounded PostgREST client.
 *
 * pgrest-core is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * pgrest-core is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with pgrest-core.  If not, see <http://www.gnu.org/licenses/>.
 */

//! One request/response exchange per connection.
//!
//! Connect, write the request line, headers and (for every verb but GET) the
//! serialized outbound document with a measured Content-Length, then wait for
//! the status line. Non-2xx aborts with the raw status line. On success the
//! header block is scanned line by line, optionally capturing one header or
//! cookie value, vendor preamble lines are skipped, and the JSON body is
//! parsed into the inbound document. The connection is closed on every path.

use std::fmt::Write as _;
use std::io;

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::request::{Capture, Request};
use super::response::{cookie_value, header_value, is_blank_line, is_success, status_code, trim_cr};
use crate::buffer::{ScratchArena, ScratchPhase, TokenBuf};
use crate::error::{ClientError, Result};
use crate::transport::{ByteStream, Transport};

/// Largest response body accepted (bytes).
pub const MAX_BODY_LENGTH: usize = 16 * 1024;

/// Counts serialized bytes without storing them.
struct CountingWriter(usize);

impl io::Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serialized length of `doc`.
fn measure(doc: &Value) -> Result<usize> {
    let mut w = CountingWriter(0);
    serde_json::to_writer(&mut w, doc).map_err(|_| ClientError::PayloadSerialize)?;
    Ok(w.0)
}

/// Stalls while reading the response surface as `Timeout`, not as I/O errors.
fn read_error(e: ClientError) -> ClientError {
    match e {
        ClientError::Io(ref io) if io.kind() == io::ErrorKind::TimedOut => {
            ClientError::Timeout("response read timed out")
        }
        other => other,
    }
}

/// HTTP/1.1 exchange driver over a `Transport`.
pub struct Framer<T> {
    stream: ByteStream<T>,
    scratch: ScratchArena,
    body: Vec<u8>,
}

impl<T: Transport> Framer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            stream: ByteStream::new(transport),
            scratch: ScratchArena::new(),
            body: Vec::with_capacity(MAX_BODY_LENGTH),
        }
    }

    pub fn transport(&self) -> &T {
        self.stream.get_ref()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.stream.get_mut()
    }

    /// Scratch arena, vacant between exchanges.
    pub fn scratch(&mut self) -> &mut ScratchArena {
        &mut self.scratch
    }

    /// Run one exchange. `inbound` is replaced only when the request expects
    /// JSON and the body parses.
    pub async fn exchange(
        &mut self,
        req: &Request<'_>,
        outbound: &Value,
        inbound: &mut Value,
    ) -> Result<()> {
        self.exchange_with(req, outbound, inbound, None).await.map(|_| ())
    }

    /// Run one exchange, storing the value selected by `req.capture` in
    /// `slot`. Returns whether the header (or cookie) was present.
    pub async fn exchange_capturing(
        &mut self,
        req: &Request<'_>,
        outbound: &Value,
        inbound: &mut Value,
        slot: &mut TokenBuf,
    ) -> Result<bool> {
        self.exchange_with(req, outbound, inbound, Some(slot)).await
    }

    async fn exchange_with(
        &mut self,
        req: &Request<'_>,
        outbound: &Value,
        inbound: &mut Value,
        slot: Option<&mut TokenBuf>,
    ) -> Result<bool> {
        debug!(
            method = req.method.as_str(),
            host = req.host,
            port = req.port,
            path = req.path,
            "exchange"
        );
        let result = match self.stream.connect(req.host, req.port).await {
            Ok(()) => {
                self.stream.set_read_timeout(req.timeout);
                self.run(req, outbound, inbound, slot).await.map_err(read_error)
            }
            Err(e) => {
                warn!(host = req.host, port = req.port, error = %e, "connect failed");
                Err(ClientError::TransportConnect(e.to_string()))
            }
        };
        self.stream.close().await;
        self.body.fill(0);
        self.body.clear();
        result
    }

    async fn run(
        &mut self,
        req: &Request<'_>,
        outbound: &Value,
        inbound: &mut Value,
        slot: Option<&mut TokenBuf>,
    ) -> Result<bool> {
        self.send(req, outbound).await?;

        if !self.stream.available(req.timeout).await? {
            warn!(host = req.host, "no response within {:?}", req.timeout);
            return Err(ClientError::Timeout("request timed out"));
        }
        self.read_status().await?;

        let capture = match (req.capture, slot) {
            (Capture::None, _) | (_, None) => None,
            (c, Some(slot)) => Some((c, slot)),
        };
        if capture.is_none() && !req.expect_json {
            return Ok(false);
        }
        let captured = self.read_headers(capture).await?;
        self.skip_lines(req.preamble_lines).await?;
        if req.expect_json {
            *inbound = self.read_json().await?;
        }
        Ok(captured)
    }

    async fn send(&mut self, req: &Request<'_>, outbound: &Value) -> Result<()> {
        let mut head = req.head();
        if req.method.has_body() {
            let length = measure(outbound)?;
            let payload =
                serde_json::to_vec(outbound).map_err(|_| ClientError::PayloadSerialize)?;
            if payload.len() != length {
                return Err(ClientError::PayloadSerialize);
            }
            let _ = write!(head, "Content-Length: {}\r\n\r\n", length);
            self.stream.write_all(head.as_bytes()).await?;
            self.stream.write_all(&payload).await?;
        } else {
            head.push_str("\r\n");
            self.stream.write_all(head.as_bytes()).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_status(&mut self) -> Result<()> {
        let mut line = self.scratch.enter(ScratchPhase::StatusLine);
        let n = self
            .stream
            .read_line_until(b'\n', &mut line)
            .await?
            .ok_or(ClientError::MalformedResponse)?;
        let status = trim_cr(&line[..n]);
        let code = status_code(status);
        if !is_success(code) {
            let text = String::from_utf8_lossy(status).into_owned();
            warn!(status = code, "request failed: {}", text);
            return Err(ClientError::HttpStatus(text));
        }
        trace!(status = code, "status");
        Ok(())
    }

    /// Consume header lines through the blank line ending the block. With a
    /// capture target, the first matching value is copied into the slot.
    async fn read_headers(&mut self, mut capture: Option<(Capture<'_>, &mut TokenBuf)>) -> Result<bool> {
        let mut captured = false;
        let mut line = self.scratch.enter(ScratchPhase::HeaderCapture);
        loop {
            let n = self
                .stream
                .read_line_until(b'\n', &mut line)
                .await?
                .ok_or(ClientError::MalformedResponse)?;
            let header = &line[..n];
            if is_blank_line(header) {
                return Ok(captured);
            }
            if captured {
                continue;
            }
            let value = match capture.as_ref().map(|(c, _)| *c) {
                Some(Capture::Cookie(name)) => {
                    header_value(header, "Set-Cookie").and_then(|v| cookie_value(v, name))
                }
                Some(Capture::Header(name)) => header_value(header, name),
                Some(Capture::None) | None => None,
            };
            if let (Some(value), Some((_, slot))) = (value, capture.as_mut()) {
                slot.set(value);
                captured = true;
            }
        }
    }

    async fn skip_lines(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let mut line = self.scratch.enter(ScratchPhase::StatusLine);
        for _ in 0..count {
            self.stream
                .read_line_until(b'\n', &mut line)
                .await?
                .ok_or(ClientError::MalformedResponse)?;
        }
        Ok(())
    }

    /// Parse the first JSON value of the body. Reads stop as soon as a
    /// complete value is buffered; trailing bytes are ignored. A bare number
    /// is complete only once a byte follows it or the stream ends.
    async fn read_json(&mut self) -> Result<Value> {
        self.body.clear();
        loop {
            let n = self
                .stream
                .read_into(&mut self.body, MAX_BODY_LENGTH)
                .await
                .map_err(|e| match e.kind() {
                    io::ErrorKind::InvalidData => ClientError::BodyDeserialize(e.to_string()),
                    _ => ClientError::Io(e),
                })?;
            if n == 0 {
                return serde_json::from_slice(&self.body)
                    .map_err(|e| ClientError::BodyDeserialize(e.to_string()));
            }
            let mut values = serde_json::Deserializer::from_slice(&self.body).into_iter::<Value>();
            match values.next() {
                // a number running to the end of the buffer may continue in the next read
                Some(Ok(value)) if value.is_number() && values.byte_offset() == self.body.len() => {
                    continue
                }
                Some(Ok(value)) => return Ok(value),
                Some(Err(e)) if e.is_eof() => continue,
                Some(Err(e)) => return Err(ClientError::BodyDeserialize(e.to_string())),
                None => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::buffer::TOKEN_CAPACITY;
    use crate::config::Endpoint;
    use crate::protocol::http::Method;
    use crate::transport::scripted::ScriptedTransport;

    fn endpoint() -> Endpoint {
        Endpoint::new("api.example.com", "/rest/v1")
    }

    fn framer_with(responses: &[&[u8]]) -> Framer<ScriptedTransport> {
        let mut t = ScriptedTransport::new();
        for r in responses {
            t.push_response(r);
        }
        Framer::new(t)
    }

    #[tokio::test]
    async fn get_sends_no_body_and_parses_json() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n[{\"id\":1}]"]);
        let req = Request::new(Method::Get, &ep, "/item").expect_json(true);
        let mut inbound = Value::Null;
        f.exchange(&req, &Value::Null, &mut inbound).await.unwrap();
        assert_eq!(inbound, json!([{"id": 1}]));

        let sent = f.transport().request_text(0);
        assert!(sent.starts_with("GET /rest/v1/item HTTP/1.1\r\nHost: api.example.com\r\n"));
        assert!(sent.ends_with("\r\n\r\n"));
        assert!(!sent.contains("Content-Length"));
        assert_eq!(f.transport().connects, vec![("api.example.com".to_string(), 443)]);
        assert!(!f.transport().is_open());
        assert_eq!(f.scratch().phase(), None);
    }

    #[tokio::test]
    async fn post_sends_measured_content_length() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1 201 Created\r\n\r\n"]);
        let req = Request::new(Method::Post, &ep, "/item");
        let body = json!({"name": "widget", "qty": 3});
        let mut inbound = Value::Null;
        f.exchange(&req, &body, &mut inbound).await.unwrap();

        let payload = serde_json::to_string(&body).unwrap();
        let sent = f.transport().request_text(0);
        assert!(sent.contains(&format!("Content-Length: {}\r\n\r\n", payload.len())));
        assert!(sent.ends_with(&payload));
        assert_eq!(inbound, Value::Null);
    }

    #[tokio::test]
    async fn non_success_status_returns_status_line() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1 401 Unauthorized\r\n\r\n{\"message\":\"JWT expired\"}"]);
        let req = Request::new(Method::Get, &ep, "/item").expect_json(true);
        let mut inbound = json!({"stale": true});
        let err = f.exchange(&req, &Value::Null, &mut inbound).await.unwrap_err();
        match err {
            ClientError::HttpStatus(line) => assert_eq!(line, "HTTP/1.1 401 Unauthorized"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(inbound, json!({"stale": true}));
        assert_eq!(f.transport().closes, 1);
    }

    #[tokio::test]
    async fn short_status_line_is_a_failure() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1\r\n\r\n"]);
        let req = Request::new(Method::Get, &ep, "/item");
        let err = f.exchange(&req, &Value::Null, &mut Value::Null).await.unwrap_err();
        assert!(matches!(err, ClientError::HttpStatus(ref l) if l == "HTTP/1.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_times_out_and_closes() {
        let ep = endpoint();
        let mut t = ScriptedTransport::new();
        t.push_stall();
        let mut f = Framer::new(t);
        let req = Request::new(Method::Get, &ep, "/item").timeout(Duration::from_millis(1500));
        let err = f.exchange(&req, &Value::Null, &mut Value::Null).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout("request timed out")));
        assert_eq!(f.transport().closes, 1);
    }

    #[tokio::test]
    async fn refused_connection_is_transport_connect() {
        let ep = endpoint();
        let mut t = ScriptedTransport::new();
        t.push_refuse();
        let mut f = Framer::new(t);
        let req = Request::new(Method::Get, &ep, "/item");
        let err = f.exchange(&req, &Value::Null, &mut Value::Null).await.unwrap_err();
        assert!(matches!(err, ClientError::TransportConnect(_)));
        assert!(f.transport().requests.is_empty());
    }

    #[tokio::test]
    async fn missing_header_boundary_is_malformed() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n"]);
        let req = Request::new(Method::Get, &ep, "/item").expect_json(true);
        let err = f.exchange(&req, &Value::Null, &mut Value::Null).await.unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse));
        assert_eq!(err.to_string(), "Invalid response");
    }

    #[tokio::test]
    async fn invalid_json_reports_parser_error() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1 200 OK\r\n\r\n{\"id\": oops}"]);
        let req = Request::new(Method::Get, &ep, "/item").expect_json(true);
        let err = f.exchange(&req, &Value::Null, &mut Value::Null).await.unwrap_err();
        assert!(matches!(err, ClientError::BodyDeserialize(_)));
    }

    #[tokio::test]
    async fn body_split_across_reads() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1 200 OK\r\nX-A: 1\r\n\r\n{\"name\":\"a long enough value\",\"n\":[1,2,3]}"]);
        f.transport_mut().set_chunk_size(5);
        let req = Request::new(Method::Get, &ep, "/item").expect_json(true);
        let mut inbound = Value::Null;
        f.exchange(&req, &Value::Null, &mut inbound).await.unwrap();
        assert_eq!(inbound["n"], json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn scalar_body_split_across_reads() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1 200 OK\r\n\r\n123456789"]);
        f.transport_mut().set_chunk_size(21);
        let req = Request::new(Method::Get, &ep, "/rpc/count_items").expect_json(true);
        let mut inbound = Value::Null;
        f.exchange(&req, &Value::Null, &mut inbound).await.unwrap();
        assert_eq!(inbound, json!(123456789));
    }

    #[tokio::test]
    async fn number_inside_array_split_across_reads() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1 200 OK\r\n\r\n[314159, 2718]\r\n"]);
        f.transport_mut().set_chunk_size(3);
        let req = Request::new(Method::Get, &ep, "/rpc/constants").expect_json(true);
        let mut inbound = Value::Null;
        f.exchange(&req, &Value::Null, &mut inbound).await.unwrap();
        assert_eq!(inbound, json!([314159, 2718]));
    }

    #[tokio::test]
    async fn oversized_header_is_truncated_and_body_still_parses() {
        let ep = endpoint();
        let jwt = "j".repeat(TOKEN_CAPACITY + 500);
        let mut response = b"HTTP/1.1 200 OK\r\nX-Before: 1\r\nset-auth-jwt: ".to_vec();
        response.extend_from_slice(jwt.as_bytes());
        response.extend_from_slice(b"\r\nX-After: 2\r\n\r\n{\"session\":{\"id\":\"s1\"}}");
        let mut f = framer_with(&[&response]);
        let req = Request::new(Method::Get, &ep, "/get-session")
            .capture(Capture::Header("set-auth-jwt"))
            .expect_json(true);
        let mut slot = TokenBuf::new();
        let mut inbound = Value::Null;
        let found = f
            .exchange_capturing(&req, &Value::Null, &mut inbound, &mut slot)
            .await
            .unwrap();
        assert!(found);
        assert!(!slot.is_empty());
        assert!(slot.len() < TOKEN_CAPACITY);
        assert!(slot.as_str().bytes().all(|b| b == b'j'));
        assert_eq!(inbound, json!({"session": {"id": "s1"}}));
        assert_eq!(f.scratch().phase(), None);
    }

    #[tokio::test]
    async fn preamble_line_is_skipped_before_body() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1 200 OK\r\n\r\n1f\r\n{\"access_token\":\"x\"}\r\n0\r\n\r\n"]);
        let req = Request::new(Method::Post, &ep, "/token")
            .preamble_lines(1)
            .expect_json(true);
        let mut inbound = Value::Null;
        f.exchange(&req, &json!({}), &mut inbound).await.unwrap();
        assert_eq!(inbound["access_token"], "x");
    }

    #[tokio::test]
    async fn captures_cookie_among_set_cookie_headers() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1 200 OK\r\n\
            Set-Cookie: other=1; Path=/\r\n\
            set-cookie: __Secure-neon-auth.session_token=abc123; Path=/; HttpOnly\r\n\
            Content-Type: application/json\r\n\
            \r\n\
            {\"user\":{}}"]);
        let req = Request::new(Method::Post, &ep, "/sign-in/email")
            .capture(Capture::Cookie("__Secure-neon-auth.session_token"))
            .expect_json(true);
        let mut slot = TokenBuf::new();
        let mut inbound = Value::Null;
        let found = f
            .exchange_capturing(&req, &json!({}), &mut inbound, &mut slot)
            .await
            .unwrap();
        assert!(found);
        assert_eq!(slot.as_str(), "abc123");
        assert_eq!(inbound, json!({"user": {}}));
    }

    #[tokio::test]
    async fn absent_capture_header_reports_not_found() {
        let ep = endpoint();
        let mut f = framer_with(&[b"HTTP/1.1 200 OK\r\nX-Other: 1\r\n\r\n{}"]);
        let req = Request::new(Method::Get, &ep, "/get-session")
            .capture(Capture::Header("set-auth-jwt"))
            .expect_json(true);
        let mut slot = TokenBuf::new();
        let found = f
            .exchange_capturing(&req, &Value::Null, &mut Value::Null, &mut slot)
            .await
            .unwrap();
        assert!(!found);
        assert!(slot.is_empty());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let ep = endpoint();
        let mut response = b"HTTP/1.1 200 OK\r\n\r\n[\"".to_vec();
        response.extend(std::iter::repeat(b'a').take(MAX_BODY_LENGTH + 10));
        response.extend_from_slice(b"\"]");
        let mut f = framer_with(&[&response]);
        let req = Request::new(Method::Get, &ep, "/item").expect_json(true);
        let err = f.exchange(&req, &Value::Null, &mut Value::Null).await.unwrap_err();
        assert!(matches!(err, ClientError::BodyDeserialize(_)));
    }

    #[test]
    fn measure_matches_serialized_length() {
        let doc = json!({"email": "a@b.c", "password": "p\"w"});
        assert_eq!(measure(&doc).unwrap(), serde_json::to_vec(&doc).unwrap().len());
    }
}
