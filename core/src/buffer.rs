/*
 * buffer.rs
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

//! Fixed-capacity buffers for session artifacts, and the shared scratch arena.
//!
//! Capacities are compile-time constants. Writes never grow a buffer: input
//! longer than the capacity is truncated.
//!
//! The scratch arena is one region reused for three phases of a flow: reading
//! the status line, scanning header lines for a cookie or token header, and
//! decoding a token payload. `ScratchArena::enter` hands out a guard for one
//! phase; the guard zeroes the region and marks the arena vacant when dropped,
//! so a phase always settles before the next one starts.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Maximum token length accepted anywhere in the client (bytes).
pub const TOKEN_CAPACITY: usize = 8192;

/// Session cookie staging capacity (bytes).
pub const COOKIE_CAPACITY: usize = 8192;

/// Scratch arena size (bytes).
pub const SCRATCH_CAPACITY: usize = 8192;

/// Status line buffer (bytes). Longer status lines are truncated.
pub const STATUS_LINE_CAPACITY: usize = 64;

/// Byte buffer with capacity `N` fixed at build time.
pub struct FixedBuf<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> FixedBuf<N> {
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        Self {
            bytes: [0u8; N],
            len: 0,
        }
    }

    /// Replace contents with `data`, truncated to capacity. Returns bytes stored.
    pub fn set(&mut self, data: &[u8]) -> usize {
        self.clear();
        let n = data.len().min(N);
        self.bytes[..n].copy_from_slice(&data[..n]);
        self.len = n;
        n
    }

    /// Zero the used region and reset length.
    pub fn clear(&mut self) {
        self.bytes[..self.len].fill(0);
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Contents as text. If truncation split a multi-byte character, the
    /// longest valid prefix is returned.
    pub fn as_str(&self) -> &str {
        match std::str::from_utf8(self.as_bytes()) {
            Ok(s) => s,
            Err(e) => std::str::from_utf8(&self.bytes[..e.valid_up_to()]).unwrap_or_default(),
        }
    }
}

impl<const N: usize> Default for FixedBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

// Contents are secrets (tokens, cookies); only the length is printed.
impl<const N: usize> fmt::Debug for FixedBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedBuf")
            .field("len", &self.len)
            .field("capacity", &N)
            .finish()
    }
}

/// Token slot in the session.
pub type TokenBuf = FixedBuf<TOKEN_CAPACITY>;

/// Neon session cookie slot.
pub type CookieBuf = FixedBuf<COOKIE_CAPACITY>;

/// Named uses of the scratch arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchPhase {
    /// Status line and preamble lines of a response.
    StatusLine,
    /// One response header line at a time while looking for a cookie or token header.
    HeaderCapture,
    /// Decoded token payload for claim scanning.
    Token,
}

impl ScratchPhase {
    /// Usable bytes for this phase.
    pub fn capacity(self) -> usize {
        match self {
            ScratchPhase::StatusLine => STATUS_LINE_CAPACITY,
            ScratchPhase::HeaderCapture | ScratchPhase::Token => SCRATCH_CAPACITY,
        }
    }
}

/// Single-owner scratch region shared by the phases of an exchange.
pub struct ScratchArena {
    bytes: [u8; SCRATCH_CAPACITY],
    phase: Option<ScratchPhase>,
}

impl ScratchArena {
    pub fn new() -> Self {
        Self {
            bytes: [0u8; SCRATCH_CAPACITY],
            phase: None,
        }
    }

    /// Current occupant, or `None` when vacant.
    pub fn phase(&self) -> Option<ScratchPhase> {
        self.phase
    }

    /// Occupy the arena for `phase`. The returned guard vacates it on drop.
    pub fn enter(&mut self, phase: ScratchPhase) -> ScratchGuard<'_> {
        debug_assert!(
            self.phase.is_none(),
            "scratch arena entered for {:?} while occupied by {:?}",
            phase,
            self.phase
        );
        self.bytes.fill(0);
        self.phase = Some(phase);
        ScratchGuard { arena: self, phase }
    }
}

impl Default for ScratchArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to the arena for one phase. Derefs to the phase's usable bytes.
pub struct ScratchGuard<'a> {
    arena: &'a mut ScratchArena,
    phase: ScratchPhase,
}

impl ScratchGuard<'_> {
    pub fn phase(&self) -> ScratchPhase {
        self.phase
    }
}

impl Deref for ScratchGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.arena.bytes[..self.phase.capacity()]
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.arena.bytes[..self.phase.capacity()]
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        self.arena.bytes.fill(0);
        self.arena.phase = None;
    }
}
