/*
 * neon.rs
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

//! Neon Auth (Better Auth). Sign-in is two exchanges: `POST /sign-in/email`
//! sets a session cookie, then `GET /get-session` with that cookie returns the
//! JWT in the `set-auth-jwt` response header. Sign-up and email verification
//! check the echoed user object.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use super::{credentials_body, lifetime_from_claims, AuthContext, Established};
use crate::buffer::TokenBuf;
use crate::config::EndpointConfig;
use crate::error::{ClientError, Result};
use crate::protocol::http::{Capture, Method, Request};
use crate::transport::Transport;

const SIGN_IN_PATH: &str = "/sign-in/email";
const SIGN_UP_PATH: &str = "/sign-up/email";
const VERIFY_PATH: &str = "/email-otp/verify-email";
const GET_SESSION_PATH: &str = "/get-session";

/// Neon Auth rejects requests without an Origin.
const ORIGIN: &str = "https://example.com";

const SESSION_COOKIE: &str = "__Secure-neon-auth.session_token";
const JWT_HEADER: &str = "set-auth-jwt";

fn auth_post<'a>(endpoints: &'a EndpointConfig, path: &'a str) -> Request<'a> {
    Request::new(Method::Post, &endpoints.auth, path)
        .header("Accept", "application/json")
        .header("Origin", ORIGIN)
        .expect_json(true)
}

/// String field of a user object.
fn user_str<'v>(user: &'v Value, key: &str) -> Option<&'v str> {
    user.get(key).and_then(Value::as_str)
}

pub(super) async fn sign_in<T: Transport>(
    cx: &mut AuthContext<'_, T>,
    email: &str,
    password: &str,
) -> Result<Established> {
    let endpoints = cx.endpoints;
    cx.cookie.clear();
    *cx.request = credentials_body(email, password);
    *cx.response = Value::Null;

    let req = auth_post(endpoints, SIGN_IN_PATH).capture(Capture::Cookie(SESSION_COOKIE));
    let found = cx
        .framer
        .exchange_capturing(&req, cx.request, cx.response, cx.cookie)
        .await?;
    if !found || cx.cookie.is_empty() {
        return Err(ClientError::MissingSessionArtifact(
            "no session token in sign-in response",
        ));
    }
    *cx.request = Value::Null;
    *cx.response = Value::Null;

    let cookie = format!("{}={}", SESSION_COOKIE, cx.cookie.as_str());
    let req = Request::new(Method::Get, &endpoints.auth, GET_SESSION_PATH)
        .header("Accept", "application/json")
        .header("Origin", ORIGIN)
        .header("Cookie", cookie)
        .capture(Capture::Header(JWT_HEADER))
        .expect_json(true);
    let mut token = TokenBuf::new();
    let found = cx
        .framer
        .exchange_capturing(&req, cx.request, cx.response, &mut token)
        .await?;
    if !found || token.is_empty() {
        return Err(ClientError::MissingSessionArtifact(
            "no jwt in get-session response",
        ));
    }

    let lifetime_secs = lifetime_from_claims(cx.framer, &token);
    debug!(lifetime_secs, "neon sign-in");

    *cx.request = Value::Null;
    *cx.response = Value::Null;
    Ok(Established { token, lifetime_secs })
}

pub(super) async fn sign_up<T: Transport>(
    cx: &mut AuthContext<'_, T>,
    name: &str,
    email: &str,
    password: &str,
    timeout: Duration,
) -> Result<()> {
    let endpoints = cx.endpoints;
    *cx.request = json!({ "email": email, "password": password, "name": name });
    let req = auth_post(endpoints, SIGN_UP_PATH).timeout(timeout);
    cx.framer.exchange(&req, cx.request, cx.response).await?;

    let user = cx
        .response
        .get("user")
        .filter(|u| u.is_object())
        .ok_or_else(|| ClientError::validation("no user in response"))?;
    let (Some(res_email), Some(res_name)) = (user_str(user, "email"), user_str(user, "name")) else {
        return Err(ClientError::validation("user missing email or name"));
    };
    if res_email != email {
        return Err(ClientError::validation("email mismatch"));
    }
    if res_name != name {
        return Err(ClientError::validation("name mismatch"));
    }
    debug!("neon sign-up accepted");

    *cx.request = Value::Null;
    *cx.response = Value::Null;
    Ok(())
}

pub(super) async fn verify_email<T: Transport>(
    cx: &mut AuthContext<'_, T>,
    email: &str,
    otp: &str,
    timeout: Duration,
) -> Result<()> {
    let endpoints = cx.endpoints;
    *cx.request = json!({ "email": email, "otp": otp });
    let req = auth_post(endpoints, VERIFY_PATH).timeout(timeout);
    cx.framer.exchange(&req, cx.request, cx.response).await?;

    if !cx.response.get("status").and_then(Value::as_bool).unwrap_or(false) {
        return Err(ClientError::validation("verification status false"));
    }
    let user = cx
        .response
        .get("user")
        .filter(|u| u.is_object())
        .ok_or_else(|| ClientError::validation("no user in response"))?;
    let res_email =
        user_str(user, "email").ok_or_else(|| ClientError::validation("user missing email"))?;
    if res_email != email {
        return Err(ClientError::validation("email mismatch"));
    }
    if !user.get("emailVerified").and_then(Value::as_bool).unwrap_or(false) {
        return Err(ClientError::validation("email not verified"));
    }
    debug!("neon email verified");

    *cx.request = Value::Null;
    *cx.response = Value::Null;
    Ok(())
}
