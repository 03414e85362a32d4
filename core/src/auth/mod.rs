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

//! Vendor auth flows: self-hosted PostgREST, Supabase (GoTrue) and Neon Auth.
//!
//! `Vendor` is chosen when the client is built. Every flow runs against an
//! `AuthContext` borrowed from the client (framer, endpoints, document slots,
//! Neon cookie slot) and a successful sign-in returns an `Established` session
//! for the client to swap in.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::{json, Value};

use crate::buffer::{CookieBuf, ScratchPhase, TokenBuf, TOKEN_CAPACITY};
use crate::config::EndpointConfig;
use crate::error::{ClientError, Result};
use crate::jwt;
use crate::protocol::http::{Framer, Request};
use crate::transport::Transport;

mod neon;
mod self_hosted;
mod supabase;

/// Backend flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    /// PostgREST with an `auth.login` RPC returning `{ "token": ... }`.
    SelfHosted,
    Supabase,
    Neon,
}

impl Vendor {
    /// Short identifier used in configuration files.
    pub fn id(self) -> &'static str {
        match self {
            Vendor::SelfHosted => "self-hosted",
            Vendor::Supabase => "supabase",
            Vendor::Neon => "neon",
        }
    }

    /// Header added to every request (auth and data) for this vendor.
    pub fn extra_header<'a>(self, endpoints: &'a EndpointConfig) -> Option<(&'static str, &'a str)> {
        match self {
            Vendor::Supabase => endpoints
                .api_key
                .as_deref()
                .filter(|key| !key.is_empty())
                .map(|key| ("apikey", key)),
            Vendor::SelfHosted | Vendor::Neon => None,
        }
    }

    /// Lines between the header block and the JSON body.
    pub fn preamble_lines(self) -> usize {
        match self {
            // Supabase responses carry one framing line before the JSON
            Vendor::Supabase => 1,
            Vendor::SelfHosted | Vendor::Neon => 0,
        }
    }

    /// Add this vendor's header, if any, to a request.
    pub fn decorate<'a>(self, req: Request<'a>, endpoints: &'a EndpointConfig) -> Request<'a> {
        match self.extra_header(endpoints) {
            Some((name, value)) => req.header(name, value),
            None => req,
        }
    }

    /// Exchange credentials for a bearer token.
    pub async fn sign_in<T: Transport>(
        self,
        cx: &mut AuthContext<'_, T>,
        email: &str,
        password: &str,
    ) -> Result<Established> {
        match self {
            Vendor::SelfHosted => self_hosted::sign_in(cx, email, password).await,
            Vendor::Supabase => supabase::sign_in(cx, email, password).await,
            Vendor::Neon => neon::sign_in(cx, email, password).await,
        }
    }

    /// Register a new user. Only Neon supports this from the device.
    pub async fn sign_up<T: Transport>(
        self,
        cx: &mut AuthContext<'_, T>,
        name: &str,
        email: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<()> {
        match self {
            Vendor::Neon => neon::sign_up(cx, name, email, password, timeout).await,
            other => Err(ClientError::NotImplementedForVendor(other)),
        }
    }

    /// Confirm an email address with a one-time code. Only Neon supports this.
    pub async fn verify_email<T: Transport>(
        self,
        cx: &mut AuthContext<'_, T>,
        email: &str,
        otp: &str,
        timeout: Duration,
    ) -> Result<()> {
        match self {
            Vendor::Neon => neon::verify_email(cx, email, otp, timeout).await,
            other => Err(ClientError::NotImplementedForVendor(other)),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Vendor {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "self-hosted" | "selfhosted" | "postgrest" => Ok(Vendor::SelfHosted),
            "supabase" => Ok(Vendor::Supabase),
            "neon" => Ok(Vendor::Neon),
            _ => Err(ClientError::Config(format!("unknown vendor: {}", s))),
        }
    }
}

/// Client state an auth flow works on.
pub struct AuthContext<'a, T> {
    pub framer: &'a mut Framer<T>,
    pub endpoints: &'a EndpointConfig,
    pub request: &'a mut Value,
    pub response: &'a mut Value,
    /// Neon session cookie, valid between sign-in and get-session.
    pub cookie: &'a mut CookieBuf,
}

/// Result of a successful sign-in, not yet installed in a session.
#[derive(Debug)]
pub struct Established {
    pub token: TokenBuf,
    /// Seconds; 0 when unknown.
    pub lifetime_secs: u32,
}

fn credentials_body(email: &str, password: &str) -> Value {
    json!({ "email": email, "password": password })
}

/// Copy the string field `field` of a sign-in response into a token buffer.
fn token_from_field(response: &Value, field: &str) -> Result<TokenBuf> {
    let token = response
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::validation("no access_token in sign-in response"))?;
    if token.is_empty() || token.len() >= TOKEN_CAPACITY {
        return Err(ClientError::validation("invalid access_token length"));
    }
    let mut buf = TokenBuf::new();
    buf.set(token.as_bytes());
    Ok(buf)
}

/// `exp - iat` of the token itself, decoded in the arena's token phase.
fn lifetime_from_claims<T: Transport>(framer: &mut Framer<T>, token: &TokenBuf) -> u32 {
    let mut scratch = framer.scratch().enter(ScratchPhase::Token);
    jwt::token_lifetime_in(token.as_str(), &mut scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;

    #[test]
    fn vendor_ids_round_trip() {
        for v in [Vendor::SelfHosted, Vendor::Supabase, Vendor::Neon] {
            assert_eq!(v.id().parse::<Vendor>().unwrap(), v);
        }
        assert_eq!("PostgREST".parse::<Vendor>().unwrap(), Vendor::SelfHosted);
        assert!("firebase".parse::<Vendor>().is_err());
    }

    #[test]
    fn only_supabase_adds_apikey_and_preamble() {
        let endpoints = EndpointConfig::new(Endpoint::new("a", "/auth/v1"), Endpoint::new("a", "/rest/v1"))
            .with_api_key("anon");
        assert_eq!(Vendor::Supabase.extra_header(&endpoints), Some(("apikey", "anon")));
        assert_eq!(Vendor::Neon.extra_header(&endpoints), None);
        assert_eq!(Vendor::SelfHosted.extra_header(&endpoints), None);
        assert_eq!(Vendor::Supabase.preamble_lines(), 1);
        assert_eq!(Vendor::Neon.preamble_lines(), 0);
    }

    #[test]
    fn token_field_validation() {
        let err = token_from_field(&json!({}), "token").unwrap_err();
        assert_eq!(err.to_string(), "no access_token in sign-in response");
        let err = token_from_field(&json!({"token": 5}), "token").unwrap_err();
        assert_eq!(err.to_string(), "no access_token in sign-in response");
        let err = token_from_field(&json!({"token": ""}), "token").unwrap_err();
        assert_eq!(err.to_string(), "invalid access_token length");
        let long = "a".repeat(TOKEN_CAPACITY);
        let err = token_from_field(&json!({ "token": long }), "token").unwrap_err();
        assert_eq!(err.to_string(), "invalid access_token length");
        let ok = token_from_field(&json!({"token": "abc"}), "token").unwrap();
        assert_eq!(ok.as_str(), "abc");
    }

    #[test]
    fn unsupported_vendor_error_text() {
        let err = ClientError::NotImplementedForVendor(Vendor::Supabase);
        assert_eq!(
            err.to_string(),
            "not implemented for supabase, perform this step out-of-band"
        );
    }
}
