/*
 * session.rs
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

//! Session state: bearer token, when it was obtained, how long it lives, and
//! the credentials kept for automatic re-sign-in.
//!
//! Timing uses the local monotonic clock captured at sign-in, never the
//! token's own `iat`, so device clock skew does not matter.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::auth::Established;
use crate::buffer::TokenBuf;
use crate::error::{ClientError, Result};

/// Refresh when this many seconds or fewer of the lifetime remain.
pub const REFRESH_THRESHOLD_SECS: u64 = 60;

/// Email and password used for the last successful sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Session {
    signed_in: bool,
    token: TokenBuf,
    issued_at: Option<Instant>,
    /// Seconds; 0 when unknown.
    lifetime_secs: u32,
    credentials: Option<Credentials>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_signed_in(&self) -> bool {
        self.signed_in
    }

    /// Bearer token, empty when signed out.
    pub fn token(&self) -> &str {
        self.token.as_str()
    }

    pub fn lifetime_secs(&self) -> u32 {
        self.lifetime_secs
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Replace the whole session with a fresh sign-in result.
    pub fn establish(&mut self, established: Established, credentials: Credentials) {
        self.token.clear();
        self.token = established.token;
        self.lifetime_secs = established.lifetime_secs;
        self.issued_at = Some(Instant::now());
        self.credentials = Some(credentials);
        self.signed_in = true;
    }

    /// Forget token, timing and credentials.
    pub fn clear(&mut self) {
        self.signed_in = false;
        self.token.clear();
        self.issued_at = None;
        self.lifetime_secs = 0;
        self.credentials = None;
    }

    /// Whether the token must be renewed before the next call.
    pub fn needs_refresh(&self) -> Result<bool> {
        self.needs_refresh_at(Instant::now())
    }

    /// `needs_refresh` against an explicit clock reading. Unknown lifetime
    /// always needs a refresh; otherwise refresh once
    /// `elapsed + REFRESH_THRESHOLD_SECS >= lifetime`.
    pub fn needs_refresh_at(&self, now: Instant) -> Result<bool> {
        if !self.signed_in {
            return Err(ClientError::NotAuthenticated);
        }
        if self.lifetime_secs == 0 {
            return Ok(true);
        }
        let elapsed = self.elapsed_at(now).as_secs();
        Ok(elapsed + REFRESH_THRESHOLD_SECS >= u64::from(self.lifetime_secs))
    }

    /// Time left before the token lapses, or `None` when signed out or the
    /// lifetime is unknown.
    pub fn expires_in(&self) -> Option<Duration> {
        if !self.signed_in || self.lifetime_secs == 0 {
            return None;
        }
        let lifetime = Duration::from_secs(u64::from(self.lifetime_secs));
        Some(lifetime.saturating_sub(self.elapsed_at(Instant::now())))
    }

    fn elapsed_at(&self, now: Instant) -> Duration {
        self.issued_at
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn established(token: &str, lifetime_secs: u32) -> Established {
        let mut buf = TokenBuf::new();
        buf.set(token.as_bytes());
        Established {
            token: buf,
            lifetime_secs,
        }
    }

    #[test]
    fn signed_out_session_is_not_authenticated() {
        let s = Session::new();
        assert!(!s.is_signed_in());
        assert!(matches!(s.needs_refresh(), Err(ClientError::NotAuthenticated)));
        assert_eq!(s.expires_in(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_boundary_is_inclusive() {
        let mut s = Session::new();
        s.establish(established("t", 600), Credentials::new("a@b.c", "pw"));
        assert!(!s.needs_refresh().unwrap());

        tokio::time::advance(Duration::from_secs(539)).await;
        assert!(!s.needs_refresh().unwrap());
        assert_eq!(s.expires_in(), Some(Duration::from_secs(61)));

        tokio::time::advance(Duration::from_secs(1)).await;
        // exactly 60 s left
        assert!(s.needs_refresh().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_lifetime_always_refreshes() {
        let mut s = Session::new();
        s.establish(established("t", 0), Credentials::new("a@b.c", "pw"));
        assert!(s.needs_refresh().unwrap());
        assert_eq!(s.expires_in(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn short_lifetime_refreshes_immediately() {
        let mut s = Session::new();
        s.establish(established("t", 45), Credentials::new("a@b.c", "pw"));
        assert!(s.needs_refresh().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn establish_replaces_everything() {
        let mut s = Session::new();
        s.establish(established("first-token", 600), Credentials::new("a@b.c", "pw"));
        tokio::time::advance(Duration::from_secs(580)).await;
        assert!(s.needs_refresh().unwrap());

        s.establish(established("second", 3600), Credentials::new("x@y.z", "pw2"));
        assert_eq!(s.token(), "second");
        assert_eq!(s.lifetime_secs(), 3600);
        assert_eq!(s.credentials().unwrap().email, "x@y.z");
        assert!(!s.needs_refresh().unwrap());
    }

    #[test]
    fn clear_forgets_credentials() {
        let mut s = Session::new();
        s.establish(established("t", 600), Credentials::new("a@b.c", "pw"));
        s.clear();
        assert!(!s.is_signed_in());
        assert_eq!(s.token(), "");
        assert!(s.credentials().is_none());
        // clearing twice is fine
        s.clear();
    }

    #[test]
    fn credentials_debug_hides_password() {
        let c = Credentials::new("a@b.c", "hunter2");
        assert!(!format!("{:?}", c).contains("hunter2"));
    }
}
