/*
 * client.rs
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

//! PostgREST client: vendor sign-in, automatic token refresh, and the four
//! data verbs.
//!
//! The client owns one transport, one outbound and one inbound JSON document.
//! Fill `request_mut()` before `create` or `update`; read `result()` after
//! `fetch`. Routes are passed through verbatim after the data path prefix,
//! e.g. `"/item?id=eq.5"` or `"/people?age=lt.13"`.

use std::mem;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{AuthContext, Vendor};
use crate::buffer::CookieBuf;
use crate::config::{ClientConfig, Endpoint, EndpointConfig};
use crate::error::{ClientError, Result};
use crate::protocol::http::{Framer, Method, Request};
use crate::session::{Credentials, Session};
use crate::transport::Transport;

pub use crate::protocol::http::DEFAULT_TIMEOUT;

pub struct PostgrestClient<T> {
    framer: Framer<T>,
    vendor: Vendor,
    endpoints: EndpointConfig,
    session: Session,
    cookie: CookieBuf,
    request: Value,
    response: Value,
}

impl<T: Transport> PostgrestClient<T> {
    pub fn new(transport: T, vendor: Vendor, endpoints: EndpointConfig) -> Self {
        Self {
            framer: Framer::new(transport),
            vendor,
            endpoints,
            session: Session::new(),
            cookie: CookieBuf::new(),
            request: Value::Null,
            response: Value::Null,
        }
    }

    pub fn from_config(transport: T, config: ClientConfig) -> Self {
        Self::new(transport, config.vendor, config.endpoints)
    }

    /// Self-hosted PostgREST with the `auth.login` RPC.
    pub fn self_hosted(transport: T, auth: Endpoint, api: Endpoint) -> Self {
        Self::new(transport, Vendor::SelfHosted, EndpointConfig::new(auth, api))
    }

    /// Supabase project; `api_key` is the anonymous public key.
    pub fn supabase(transport: T, auth: Endpoint, api: Endpoint, api_key: impl Into<String>) -> Self {
        Self::new(
            transport,
            Vendor::Supabase,
            EndpointConfig::new(auth, api).with_api_key(api_key),
        )
    }

    pub fn neon(transport: T, auth: Endpoint, api: Endpoint) -> Self {
        Self::new(transport, Vendor::Neon, EndpointConfig::new(auth, api))
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn endpoints(&self) -> &EndpointConfig {
        &self.endpoints
    }

    fn auth_context(&mut self) -> AuthContext<'_, T> {
        AuthContext {
            framer: &mut self.framer,
            endpoints: &self.endpoints,
            request: &mut self.request,
            response: &mut self.response,
            cookie: &mut self.cookie,
        }
    }

    /// Register a user (Neon only). Do this out-of-band for other vendors.
    pub async fn sign_up(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<()> {
        let vendor = self.vendor;
        vendor
            .sign_up(&mut self.auth_context(), name, email, password, timeout)
            .await
    }

    /// Confirm an email address with the emailed one-time code (Neon only).
    pub async fn verify_email(&mut self, email: &str, otp: &str, timeout: Duration) -> Result<()> {
        let vendor = self.vendor;
        vendor
            .verify_email(&mut self.auth_context(), email, otp, timeout)
            .await
    }

    /// Sign in and keep the credentials for automatic refresh. On failure the
    /// previous session, if any, is left as it was.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<()> {
        let vendor = self.vendor;
        let result = vendor.sign_in(&mut self.auth_context(), email, password).await;
        match result {
            Ok(established) => {
                debug!(vendor = %vendor, lifetime_secs = established.lifetime_secs, "signed in");
                self.session
                    .establish(established, Credentials::new(email, password));
                Ok(())
            }
            Err(e) => {
                warn!(vendor = %vendor, "sign-in failed: {}", e);
                Err(e)
            }
        }
    }

    /// Forget the token, the session cookie and the stored credentials.
    pub fn sign_out(&mut self) {
        self.session.clear();
        self.cookie.clear();
    }

    /// Sign in again with the stored credentials when the token has 60 s or
    /// less left, or its lifetime is unknown. The outbound and inbound
    /// documents are preserved across the re-sign-in.
    pub async fn refresh_if_needed(&mut self) -> Result<()> {
        if !self.session.needs_refresh()? {
            return Ok(());
        }
        let credentials = self
            .session
            .credentials()
            .cloned()
            .ok_or(ClientError::NoStoredCredentials)?;
        debug!(vendor = %self.vendor, "refreshing token");
        let outbound = mem::take(&mut self.request);
        let inbound = mem::take(&mut self.response);
        let result = self.sign_in(&credentials.email, &credentials.password).await;
        self.request = outbound;
        self.response = inbound;
        result
    }

    /// GET `route`; the parsed body is available from `result()`.
    pub async fn fetch(&mut self, route: &str, timeout: Duration) -> Result<()> {
        self.data_call(Method::Get, route, timeout).await
    }

    /// POST the outbound document to `route`.
    pub async fn create(&mut self, route: &str, timeout: Duration) -> Result<()> {
        self.data_call(Method::Post, route, timeout).await
    }

    /// PATCH the rows selected by `route` with the outbound document.
    pub async fn update(&mut self, route: &str, timeout: Duration) -> Result<()> {
        self.data_call(Method::Patch, route, timeout).await
    }

    /// DELETE the rows selected by `route`.
    pub async fn delete(&mut self, route: &str, timeout: Duration) -> Result<()> {
        self.data_call(Method::Delete, route, timeout).await
    }

    async fn data_call(&mut self, method: Method, route: &str, timeout: Duration) -> Result<()> {
        let result = self.invoke_data_api(method, route, timeout).await;
        self.request = Value::Null;
        result
    }

    async fn invoke_data_api(&mut self, method: Method, route: &str, timeout: Duration) -> Result<()> {
        if !self.session.is_signed_in() {
            return Err(ClientError::NotAuthenticated);
        }
        self.refresh_if_needed().await?;

        let expect_json = method == Method::Get;
        if expect_json {
            self.response = Value::Null;
        }
        let bearer = format!("Bearer {}", self.session.token());
        let req = Request::new(method, &self.endpoints.api, route)
            .header("Authorization", bearer)
            .preamble_lines(self.vendor.preamble_lines())
            .expect_json(expect_json)
            .timeout(timeout);
        let req = self.vendor.decorate(req, &self.endpoints);
        self.framer
            .exchange(&req, &self.request, &mut self.response)
            .await
    }

    /// Outbound document for the next `create` / `update`.
    pub fn request_mut(&mut self) -> &mut Value {
        &mut self.request
    }

    /// Replace the outbound document with `body` serialized to JSON.
    pub fn set_request<S: Serialize>(&mut self, body: &S) -> Result<()> {
        self.request = serde_json::to_value(body).map_err(|_| ClientError::PayloadSerialize)?;
        Ok(())
    }

    /// Inbound document from the last `fetch`.
    pub fn result(&self) -> &Value {
        &self.response
    }

    /// Inbound document deserialized into `D`.
    pub fn result_as<D: DeserializeOwned>(&self) -> Result<D> {
        D::deserialize(&self.response).map_err(|e| ClientError::BodyDeserialize(e.to_string()))
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_signed_in()
    }

    /// Current bearer token; empty when signed out.
    pub fn token(&self) -> &str {
        self.session.token()
    }

    /// Token lifetime in seconds; 0 when unknown.
    pub fn lifetime_secs(&self) -> u32 {
        self.session.lifetime_secs()
    }

    /// Time left before the token lapses; `None` when signed out or unknown.
    pub fn expires_in(&self) -> Option<Duration> {
        self.session.expires_in()
    }

    pub fn transport(&self) -> &T {
        self.framer.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.framer.transport_mut()
    }
}
