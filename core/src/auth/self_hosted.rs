/*
 * self_hosted.rs
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

//! Self-hosted PostgREST: `POST {auth}/rpc/login` against a SQL login function
//! in schema `auth`, answering `{ "token": "<jwt>" }`. The token lifetime is
//! read from its own `iat`/`exp` claims.

use serde_json::Value;
use tracing::debug;

use super::{credentials_body, lifetime_from_claims, token_from_field, AuthContext, Established};
use crate::error::Result;
use crate::protocol::http::{Method, Request};
use crate::transport::Transport;

const LOGIN_PATH: &str = "/rpc/login";

pub(super) async fn sign_in<T: Transport>(
    cx: &mut AuthContext<'_, T>,
    email: &str,
    password: &str,
) -> Result<Established> {
    let endpoints = cx.endpoints;
    *cx.request = credentials_body(email, password);
    *cx.response = Value::Null;
    let req = Request::new(Method::Post, &endpoints.auth, LOGIN_PATH)
        .header("Accept", "application/json")
        .header("Content-Profile", "auth")
        .expect_json(true);
    cx.framer.exchange(&req, cx.request, cx.response).await?;

    let token = token_from_field(cx.response, "token")?;
    let lifetime_secs = lifetime_from_claims(cx.framer, &token);
    debug!(lifetime_secs, "self-hosted sign-in");

    *cx.request = Value::Null;
    *cx.response = Value::Null;
    Ok(Established { token, lifetime_secs })
}
