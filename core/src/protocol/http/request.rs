/*
 * request.rs
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

//! HTTP request description for one framer exchange: method, target, extra
//! headers, and what to do with the response (header capture, preamble lines,
//! JSON body).

use std::borrow::Cow;
use std::time::Duration;

use crate::config::Endpoint;

/// Default wait for the first response byte.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(20_000);

/// HTTP request method. Only the verbs PostgREST and the auth endpoints use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Every verb except GET sends the outbound document with a Content-Length.
    pub fn has_body(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

/// Response header whose value should be captured before the body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture<'a> {
    None,
    /// Value of cookie `name` from a `Set-Cookie` header, up to `;`.
    Cookie(&'a str),
    /// Full value of the named header.
    Header(&'a str),
}

/// One request: target, headers, and response handling.
///
/// Built with `Request::new(method, endpoint, path)`; the request target is the
/// endpoint's path prefix followed by `path`.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    pub method: Method,
    pub host: &'a str,
    pub port: u16,
    pub path_prefix: &'a str,
    pub path: &'a str,
    pub headers: Vec<(&'a str, Cow<'a, str>)>,
    pub capture: Capture<'a>,
    /// Lines to discard after the header block, before the JSON body.
    pub preamble_lines: usize,
    pub expect_json: bool,
    pub timeout: Duration,
}

impl<'a> Request<'a> {
    pub fn new(method: Method, endpoint: &'a Endpoint, path: &'a str) -> Self {
        Self {
            method,
            host: &endpoint.host,
            port: endpoint.port,
            path_prefix: &endpoint.path,
            path,
            headers: Vec::new(),
            capture: Capture::None,
            preamble_lines: 0,
            expect_json: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Add a header. Names are written as given.
    pub fn header(mut self, name: &'a str, value: impl Into<Cow<'a, str>>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn capture(mut self, capture: Capture<'a>) -> Self {
        self.capture = capture;
        self
    }

    pub fn preamble_lines(mut self, n: usize) -> Self {
        self.preamble_lines = n;
        self
    }

    pub fn expect_json(mut self, expect: bool) -> Self {
        self.expect_json = expect;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Request line and headers up to (not including) Content-Length / blank line.
    pub(crate) fn head(&self) -> String {
        let mut head = format!(
            "{} {}{} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\n",
            self.method.as_str(),
            self.path_prefix,
            self.path,
            self.host
        );
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_has_request_line_host_and_headers() {
        let ep = Endpoint::new("db.example.com", "/rest/v1");
        let req = Request::new(Method::Patch, &ep, "/item?id=eq.5")
            .header("Authorization", format!("Bearer {}", "t0k"))
            .header("apikey", "k");
        assert_eq!(
            req.head(),
            "PATCH /rest/v1/item?id=eq.5 HTTP/1.1\r\n\
             Host: db.example.com\r\n\
             Content-Type: application/json\r\n\
             Authorization: Bearer t0k\r\n\
             apikey: k\r\n"
        );
    }

    #[test]
    fn only_get_has_no_body() {
        assert!(!Method::Get.has_body());
        assert!(Method::Post.has_body());
        assert!(Method::Patch.has_body());
        assert!(Method::Delete.has_body());
    }
}
