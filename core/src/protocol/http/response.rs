/*
 * response.rs
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

//! Response line parsing on raw bytes: status code, header name matching,
//! cookie value extraction. All functions work on borrowed slices of a line
//! already read into a bounded buffer.

/// Offset of the status code in `HTTP/1.1 NNN ...`.
const STATUS_CODE_OFFSET: usize = 9;

/// Status code of a status line, or 0 when the line is shorter than
/// `HTTP/1.1 NNN` or has no digits at the code position.
///
/// The code is read at a fixed offset, as device firmware has always done;
/// `HTTP/1.0 ` and `HTTP/2 ` lines with a different prefix width are not
/// re-tokenized.
pub fn status_code(line: &[u8]) -> u16 {
    if line.len() < STATUS_CODE_OFFSET + 3 {
        return 0;
    }
    let mut code: u16 = 0;
    for &b in &line[STATUS_CODE_OFFSET..STATUS_CODE_OFFSET + 3] {
        if !b.is_ascii_digit() {
            break;
        }
        code = code * 10 + (b - b'0') as u16;
    }
    code
}

pub fn is_success(code: u16) -> bool {
    (200..300).contains(&code)
}

/// Strip a trailing `\r` left by reading up to `\n`.
pub fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn trim_leading_ws(mut s: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = s {
        s = rest;
    }
    s
}

/// True for the empty line ending a header block (`\r` or nothing once `\n` is stripped).
pub fn is_blank_line(line: &[u8]) -> bool {
    trim_cr(line).is_empty()
}

/// If `line` is header `name` (case-insensitive), return its value with
/// leading whitespace and trailing `\r` removed.
pub fn header_value<'a>(line: &'a [u8], name: &str) -> Option<&'a [u8]> {
    let line = trim_leading_ws(line);
    let name = name.as_bytes();
    if line.len() <= name.len()
        || line[name.len()] != b':'
        || !line[..name.len()].eq_ignore_ascii_case(name)
    {
        return None;
    }
    Some(trim_cr(trim_leading_ws(&line[name.len() + 1..])))
}

/// Value of cookie `cookie` within a `Set-Cookie` header value: the bytes
/// after `cookie=` up to `;`, `\r` or `\n`.
pub fn cookie_value<'a>(header_value: &'a [u8], cookie: &str) -> Option<&'a [u8]> {
    let key = cookie.as_bytes();
    let start = header_value
        .windows(key.len() + 1)
        .position(|w| &w[..key.len()] == key && w[key.len()] == b'=')?;
    let value = &header_value[start + key.len() + 1..];
    let end = value
        .iter()
        .position(|&b| b == b';' || b == b'\r' || b == b'\n')
        .unwrap_or(value.len());
    Some(&value[..end])
}
