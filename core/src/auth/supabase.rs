/*
 * supabase.rs
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

//! Supabase (GoTrue): `POST {auth}/token?grant_type=password` with the project
//! API key. The response carries `access_token` and `expires_in`.

use serde_json::Value;
use tracing::debug;

use super::{credentials_body, token_from_field, AuthContext, Established, Vendor};
use crate::error::Result;
use crate::protocol::http::{Method, Request};
use crate::transport::Transport;

const TOKEN_PATH: &str = "/token?grant_type=password";

pub(super) async fn sign_in<T: Transport>(
    cx: &mut AuthContext<'_, T>,
    email: &str,
    password: &str,
) -> Result<Established> {
    let endpoints = cx.endpoints;
    *cx.request = credentials_body(email, password);
    *cx.response = Value::Null;
    let req = Request::new(Method::Post, &endpoints.auth, TOKEN_PATH)
        .header("Accept", "application/json")
        .preamble_lines(Vendor::Supabase.preamble_lines())
        .expect_json(true);
    let req = Vendor::Supabase.decorate(req, endpoints);
    cx.framer.exchange(&req, cx.request, cx.response).await?;

    let token = token_from_field(cx.response, "access_token")?;
    // missing, negative or out of range: unknown
    let lifetime_secs = cx
        .response
        .get("expires_in")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);
    debug!(lifetime_secs, "supabase sign-in");

    *cx.request = Value::Null;
    *cx.response = Value::Null;
    Ok(Established { token, lifetime_secs })
}
