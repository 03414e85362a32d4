/*
 * config.rs
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

//! Endpoint configuration: auth and data hosts, path prefixes, vendor API key.
//!
//! Built in code, from two URLs, or from a small XML file read with quick_xml:
//!
//! ```xml
//! <postgrest vendor="supabase">
//!   <auth-url>https://project.supabase.co/auth/v1/</auth-url>
//!   <api-url>https://project.supabase.co/rest/v1/</api-url>
//!   <api-key>anon-key</api-key>
//! </postgrest>
//! ```

use std::fs;
use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::auth::Vendor;
use crate::error::{ClientError, Result};

/// Characters escaped in a path prefix taken from a URL.
const PATH: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

/// Default port for every endpoint.
pub const DEFAULT_PORT: u16 = 443;

/// One HTTP endpoint: host, port and a path prefix prepended to every request
/// target. The prefix is either empty or starts with `/`, without a trailing `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_port(host, DEFAULT_PORT, path)
    }

    pub fn with_port(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
        }
    }

    /// Parse `https://host[:port][/path]` or `http://host[:port][/path]`.
    /// Default port is 443 for https and 80 for http; a trailing `/` is dropped.
    pub fn from_url(url: &str) -> Result<Self> {
        let (rest, default_port) = if let Some(r) = url.strip_prefix("https://") {
            (r, 443)
        } else if let Some(r) = url.strip_prefix("http://") {
            (r, 80)
        } else {
            return Err(ClientError::Config(format!("expected http(s):// URL: {}", url)));
        };
        let (host_port, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };
        let (host, port) = match host_port.find(':') {
            Some(i) => (
                &host_port[..i],
                host_port[i + 1..]
                    .parse::<u16>()
                    .map_err(|_| ClientError::Config(format!("invalid port in URL: {}", url)))?,
            ),
            None => (host_port, default_port),
        };
        if host.is_empty() {
            return Err(ClientError::Config(format!("no host in URL: {}", url)));
        }
        let path = path.trim_end_matches('/');
        Ok(Self::with_port(
            host,
            port,
            utf8_percent_encode(path, PATH).to_string(),
        ))
    }
}

/// Auth and data endpoints for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub auth: Endpoint,
    pub api: Endpoint,
    /// Sent as `apikey` by Supabase on every request.
    pub api_key: Option<String>,
}

impl EndpointConfig {
    pub fn new(auth: Endpoint, api: Endpoint) -> Self {
        Self {
            auth,
            api,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn from_urls(auth_url: &str, api_url: &str) -> Result<Self> {
        Ok(Self::new(Endpoint::from_url(auth_url)?, Endpoint::from_url(api_url)?))
    }
}

/// Vendor plus endpoints, as read from a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub vendor: Vendor,
    pub endpoints: EndpointConfig,
}

/// Load a configuration file. See the module docs for the format.
pub fn load_config_file(path: &Path) -> Result<ClientConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
    load_config_xml(&content)
}

/// Parse configuration XML.
pub fn load_config_xml(content: &str) -> Result<ClientConfig> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut vendor: Option<Vendor> = None;
    let mut auth_url = String::new();
    let mut api_url = String::new();
    let mut api_key = String::new();
    let mut in_root = false;
    let mut element_name = Vec::<u8>::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(ClientError::Config(format!("XML parse error: {}", e))),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = e.name();
                let name = name.as_ref();
                if name == b"postgrest" {
                    in_root = true;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| ClientError::Config(e.to_string()))?;
                        if attr.key.as_ref() == b"vendor" {
                            let value = attr
                                .unescape_value()
                                .map_err(|e| ClientError::Config(e.to_string()))?;
                            vendor = Some(value.trim().parse()?);
                        }
                    }
                } else if in_root
                    && (name == b"auth-url" || name == b"api-url" || name == b"api-key")
                {
                    element_name.clear();
                    element_name.extend_from_slice(name);
                }
            }
            Ok(Event::Text(e)) => {
                if !in_root || element_name.is_empty() {
                    continue;
                }
                let text = e
                    .unescape()
                    .map_err(|e| ClientError::Config(e.to_string()))?
                    .trim()
                    .to_string();
                match element_name.as_slice() {
                    b"auth-url" => auth_url = text,
                    b"api-url" => api_url = text,
                    b"api-key" => api_key = text,
                    _ => {}
                }
                element_name.clear();
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"postgrest" {
                    in_root = false;
                }
                element_name.clear();
            }
            _ => {}
        }
        buf.clear();
    }

    let vendor = vendor.ok_or_else(|| ClientError::Config("missing vendor attribute".into()))?;
    if auth_url.is_empty() {
        return Err(ClientError::Config("missing <auth-url>".into()));
    }
    if api_url.is_empty() {
        return Err(ClientError::Config("missing <api-url>".into()));
    }
    let mut endpoints = EndpointConfig::from_urls(&auth_url, &api_url)?;
    if !api_key.is_empty() {
        endpoints.api_key = Some(api_key);
    } else if vendor == Vendor::Supabase {
        return Err(ClientError::Config("supabase requires <api-key>".into()));
    }
    Ok(ClientConfig { vendor, endpoints })
}
