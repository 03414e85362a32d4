/*
 * mod.rs
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

//! Byte-stream transport and the bounded reader the framer drives.
//!
//! `Transport` is the collaborator boundary: connect, raw read/write, flush,
//! close. TLS, if any, lives behind it (see `net::TcpTransport`).
//!
//! `ByteStream` wraps a transport with a fixed read-ahead buffer and the line
//! primitives the response parser needs: a bounded wait for the first byte,
//! `read_line_until`, and draining the body. No read ever buffers more than
//! `READ_AHEAD_CAPACITY` bytes.

use std::io;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::time::timeout;

#[cfg(test)]
pub(crate) mod scripted;

/// Read-ahead buffer size (bytes).
pub const READ_AHEAD_CAPACITY: usize = 4096;

/// Connection-oriented byte transport. One connection at a time; `connect`
/// on an open transport replaces the previous connection.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Open a connection to `host:port`.
    async fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    /// Read up to `buf.len()` bytes. Returns 0 at end of stream.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `data`.
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    async fn flush(&mut self) -> io::Result<()>;

    /// Close the connection. Closing a closed transport is a no-op.
    async fn close(&mut self);
}

/// Bounded reader/writer over a `Transport`.
pub struct ByteStream<T> {
    inner: T,
    read_buf: BytesMut,
    /// Upper bound for each wait on the transport.
    read_timeout: Duration,
    eof: bool,
}

impl<T: Transport> ByteStream<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            read_buf: BytesMut::with_capacity(READ_AHEAD_CAPACITY),
            read_timeout: Duration::from_secs(20),
            eof: false,
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn set_read_timeout(&mut self, read_timeout: Duration) {
        self.read_timeout = read_timeout;
    }

    /// Connect, discarding anything left from a previous connection.
    pub async fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.read_buf.clear();
        self.eof = false;
        self.inner.connect(host, port).await
    }

    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }

    pub async fn close(&mut self) {
        self.read_buf.clear();
        self.inner.close().await;
    }

    /// Refill the read-ahead buffer if empty. Returns bytes buffered, 0 at end
    /// of stream. A stalled transport fails with `TimedOut`.
    async fn fill(&mut self) -> io::Result<usize> {
        if !self.read_buf.is_empty() {
            return Ok(self.read_buf.len());
        }
        if self.eof {
            return Ok(0);
        }
        let mut tmp = [0u8; READ_AHEAD_CAPACITY];
        let n = timeout(self.read_timeout, self.inner.read(&mut tmp))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "response read timed out"))??;
        if n == 0 {
            self.eof = true;
        } else {
            self.read_buf.extend_from_slice(&tmp[..n]);
        }
        Ok(n)
    }

    /// Wait up to `wait` for at least one byte. `Ok(false)` when the wait
    /// elapsed; `UnexpectedEof` when the peer closed without sending anything.
    pub async fn available(&mut self, wait: Duration) -> io::Result<bool> {
        if !self.read_buf.is_empty() {
            return Ok(true);
        }
        let saved = self.read_timeout;
        self.read_timeout = wait;
        let result = self.fill().await;
        self.read_timeout = saved;
        match result {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before response",
            )),
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read bytes up to `delimiter` (consumed, not stored) into `out`.
    ///
    /// Bytes beyond `out.len()` are discarded up to the delimiter, so an
    /// over-long line is truncated rather than spilling into the next read.
    /// Returns `None` at end of stream when nothing was read, otherwise the
    /// number of bytes stored.
    pub async fn read_line_until(
        &mut self,
        delimiter: u8,
        out: &mut [u8],
    ) -> io::Result<Option<usize>> {
        let mut stored = 0usize;
        let mut seen_any = false;
        loop {
            if self.fill().await? == 0 {
                return Ok(if seen_any { Some(stored) } else { None });
            }
            seen_any = true;
            let chunk = &self.read_buf[..];
            let (line_part, found) = match chunk.iter().position(|&b| b == delimiter) {
                Some(i) => (&chunk[..i], true),
                None => (chunk, false),
            };
            let room = out.len() - stored;
            let take = line_part.len().min(room);
            out[stored..stored + take].copy_from_slice(&line_part[..take]);
            stored += take;
            let consumed = line_part.len() + usize::from(found);
            self.read_buf.advance(consumed);
            if found {
                return Ok(Some(stored));
            }
        }
    }

    /// Append buffered or newly read bytes to `out` without letting it exceed
    /// `limit`. Returns bytes appended; 0 at end of stream.
    pub async fn read_into(&mut self, out: &mut Vec<u8>, limit: usize) -> io::Result<usize> {
        if self.fill().await? == 0 {
            return Ok(0);
        }
        let room = limit.saturating_sub(out.len());
        if room == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("response body exceeds {} bytes", limit),
            ));
        }
        let take = room.min(self.read_buf.len());
        out.extend_from_slice(&self.read_buf[..take]);
        self.read_buf.advance(take);
        Ok(take)
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::ScriptedTransport;
    use super::*;

    async fn stream_over(bytes: &[u8], chunk: usize) -> ByteStream<ScriptedTransport> {
        let mut t = ScriptedTransport::new();
        t.push_response(bytes);
        t.set_chunk_size(chunk);
        let mut s = ByteStream::new(t);
        s.connect("example.com", 443).await.unwrap();
        s
    }

    #[tokio::test]
    async fn reads_lines_across_partial_reads() {
        let mut s = stream_over(b"HTTP/1.1 200 OK\r\nA: b\r\n", 3).await;
        let mut line = [0u8; 64];
        let n = s.read_line_until(b'\n', &mut line).await.unwrap().unwrap();
        assert_eq!(&line[..n], b"HTTP/1.1 200 OK\r");
        let n = s.read_line_until(b'\n', &mut line).await.unwrap().unwrap();
        assert_eq!(&line[..n], b"A: b\r");
        assert_eq!(s.read_line_until(b'\n', &mut line).await.unwrap(), None);
    }

    #[tokio::test]
    async fn long_line_is_truncated_and_rest_discarded() {
        let mut input = vec![b'x'; 100];
        input.extend_from_slice(b"\r\nnext\r\n");
        let mut s = stream_over(&input, 7).await;
        let mut line = [0u8; 16];
        let n = s.read_line_until(b'\n', &mut line).await.unwrap().unwrap();
        assert_eq!(n, 16);
        assert!(line.iter().all(|&b| b == b'x'));
        let n = s.read_line_until(b'\n', &mut line).await.unwrap().unwrap();
        assert_eq!(&line[..n], b"next\r");
    }

    #[tokio::test]
    async fn read_into_drains_after_lines() {
        let mut s = stream_over(b"H: v\r\n\r\nbody", 2).await;
        let mut line = [0u8; 16];
        s.read_line_until(b'\n', &mut line).await.unwrap();
        s.read_line_until(b'\n', &mut line).await.unwrap();
        let mut rest = Vec::new();
        while s.read_into(&mut rest, 64).await.unwrap() > 0 {}
        assert_eq!(rest, b"body");
    }

    #[tokio::test]
    async fn read_into_respects_limit() {
        let mut s = stream_over(&[b'a'; 40], 40).await;
        let mut out = Vec::new();
        assert_eq!(s.read_into(&mut out, 16).await.unwrap(), 16);
        let err = s.read_into(&mut out, 16).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test(start_paused = true)]
    async fn available_times_out_on_silent_peer() {
        let mut t = ScriptedTransport::new();
        t.push_stall();
        let mut s = ByteStream::new(t);
        s.connect("example.com", 443).await.unwrap();
        assert!(!s.available(Duration::from_millis(500)).await.unwrap());
    }

    #[tokio::test]
    async fn available_reports_early_close() {
        let mut s = stream_over(b"", 8).await;
        let err = s.available(Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
