/*
 * error.rs
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

//! Client errors. Every public operation returns `Result<T, ClientError>`; the
//! `Display` text matches the messages the device library has always printed.

use std::io;

use crate::auth::Vendor;

/// Errors from the transport framer, vendor auth flows, session manager and data API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A data API call or refresh was attempted without a prior successful sign-in.
    #[error("Not signed in")]
    NotAuthenticated,

    /// TCP connect or TLS handshake failed.
    #[error("cannot connect: {0}")]
    TransportConnect(String),

    /// No response byte arrived within the caller's timeout, or the stream stalled mid-response.
    #[error("{0}")]
    Timeout(&'static str),

    /// Status code outside 200..300. Holds the raw status line without CRLF.
    #[error("{0}")]
    HttpStatus(String),

    /// The header/body boundary was never found.
    #[error("Invalid response")]
    MalformedResponse,

    /// The response body is not a JSON document (parser message).
    #[error("{0}")]
    BodyDeserialize(String),

    /// Bytes written differ from the measured payload length.
    #[error("payload serialization error")]
    PayloadSerialize,

    /// Response body present but failed business validation (e.g. email mismatch).
    #[error("{0}")]
    VendorValidation(String),

    /// A session cookie or token header expected in the response headers was absent.
    #[error("{0}")]
    MissingSessionArtifact(&'static str),

    /// Sign-up and email verification must be done out-of-band for this vendor.
    #[error("not implemented for {0}, perform this step out-of-band")]
    NotImplementedForVendor(Vendor),

    /// Token lapsed and no credentials are stored to sign in again.
    #[error("no credentials to refresh token")]
    NoStoredCredentials,

    /// Invalid endpoint or configuration file.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport read/write failure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::VendorValidation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
