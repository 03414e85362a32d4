/*
 * lib.rs
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

//! Memory-bounded client for PostgREST backends: self-hosted PostgREST,
//! Supabase and Neon.
//!
//! - `client`: `PostgrestClient`, sign-in/out, automatic refresh, data verbs.
//! - `auth`: per-vendor sign-in, sign-up and email verification flows.
//! - `session`: token, lifetime and refresh decision.
//! - `protocol::http`: one HTTP/1.1 exchange per connection over a `Transport`.
//! - `transport`, `net`: the byte-stream boundary and its tokio TCP/TLS implementation.
//! - `jwt`: claim scanning on the raw token payload.
//! - `buffer`: fixed-capacity buffers and the shared scratch arena.
//! - `config`: endpoints from code, URLs or an XML file.
//!
//! ```no_run
//! use std::time::Duration;
//! use pgrest_core::{Endpoint, PostgrestClient, TcpTransport};
//!
//! # async fn demo() -> pgrest_core::Result<()> {
//! let mut client = PostgrestClient::supabase(
//!     TcpTransport::new(),
//!     Endpoint::from_url("https://project.supabase.co/auth/v1")?,
//!     Endpoint::from_url("https://project.supabase.co/rest/v1")?,
//!     "anon-key",
//! );
//! client.sign_in("you@example.com", "secret").await?;
//! client.fetch("/todos?select=*", Duration::from_secs(20)).await?;
//! println!("{}", client.result());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod jwt;
pub mod net;
pub mod protocol;
pub mod session;
pub mod transport;

pub use auth::Vendor;
pub use client::{PostgrestClient, DEFAULT_TIMEOUT};
pub use config::{load_config_file, load_config_xml, ClientConfig, Endpoint, EndpointConfig};
pub use error::{ClientError, Result};
pub use net::{TcpTransport, TlsMode};
pub use session::Credentials;
pub use transport::Transport;
