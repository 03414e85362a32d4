/*
 * scripted.rs
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

//! In-memory transport for tests: each `connect` takes the next scripted
//! response; everything written is recorded per connection.

use std::collections::VecDeque;
use std::io;

use super::Transport;

enum Script {
    Bytes(Vec<u8>),
    Stall,
    Refuse,
}

pub(crate) struct ScriptedTransport {
    script: VecDeque<Script>,
    current: Option<(Vec<u8>, usize)>,
    stalled: bool,
    chunk_size: usize,
    pub connects: Vec<(String, u16)>,
    pub requests: Vec<Vec<u8>>,
    pub closes: usize,
    open: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            current: None,
            stalled: false,
            chunk_size: 4096,
            connects: Vec::new(),
            requests: Vec::new(),
            closes: 0,
            open: false,
        }
    }

    /// Queue the full response for the next connection.
    pub fn push_response(&mut self, bytes: &[u8]) {
        self.script.push_back(Script::Bytes(bytes.to_vec()));
    }

    /// Next connection accepts the request and never answers.
    pub fn push_stall(&mut self) {
        self.script.push_back(Script::Stall);
    }

    /// Next connection attempt fails.
    pub fn push_refuse(&mut self) {
        self.script.push_back(Script::Refuse);
    }

    /// Deliver at most `n` bytes per read.
    pub fn set_chunk_size(&mut self, n: usize) {
        self.chunk_size = n.max(1);
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Request bytes of connection `i` as text.
    pub fn request_text(&self, i: usize) -> String {
        String::from_utf8_lossy(&self.requests[i]).into_owned()
    }
}

impl Transport for ScriptedTransport {
    async fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.connects.push((host.to_string(), port));
        match self.script.pop_front() {
            Some(Script::Bytes(b)) => {
                self.current = Some((b, 0));
                self.stalled = false;
            }
            Some(Script::Stall) => {
                self.current = None;
                self.stalled = true;
            }
            Some(Script::Refuse) | None => {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))
            }
        }
        self.requests.push(Vec::new());
        self.open = true;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "not connected"));
        }
        if self.stalled {
            std::future::pending::<()>().await;
        }
        let Some((bytes, pos)) = self.current.as_mut() else {
            return Ok(0);
        };
        let n = (bytes.len() - *pos).min(buf.len()).min(self.chunk_size);
        buf[..n].copy_from_slice(&bytes[*pos..*pos + n]);
        *pos += n;
        Ok(n)
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "not connected"));
        }
        if let Some(last) = self.requests.last_mut() {
            last.extend_from_slice(data);
        }
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn close(&mut self) {
        if self.open {
            self.closes += 1;
        }
        self.open = false;
        self.current = None;
        self.stalled = false;
    }
}
