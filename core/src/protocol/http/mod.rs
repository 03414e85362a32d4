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

//! HTTP/1.1 framing for the auth and data endpoints.
//!
//! One exchange per connection; connections are never reused. Status, headers
//! and preamble lines are read into the shared scratch arena; the body is
//! read into a bounded buffer and parsed as a single JSON value.

mod framer;
mod request;
mod response;

pub use framer::{Framer, MAX_BODY_LENGTH};
pub use request::{Capture, Method, Request, DEFAULT_TIMEOUT};
pub use response::{cookie_value, header_value, status_code};
