/*
 * jwt.rs
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

//! JWT claim scanning without a JSON decoder.
//!
//! Only the payload segment is decoded (base64url, no padding in the token) and
//! searched for a literal quoted key such as `"exp"`. Signatures are not
//! checked: the token came from our own auth endpoint over TLS and is only
//! inspected to learn its lifetime.
//!
//! A return value of 0 means "absent or malformed". A claim whose value really
//! is 0 cannot be told apart from that; callers treat 0 as unknown.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

use crate::buffer::TOKEN_CAPACITY;

/// Longest token the scanner will look at.
pub const MAX_TOKEN_LENGTH: usize = TOKEN_CAPACITY;

/// Issued-at claim key, quoted.
pub const CLAIM_IAT: &str = "\"iat\"";

/// Expiry claim key, quoted.
pub const CLAIM_EXP: &str = "\"exp\"";

/// Largest decoded payload for a token of `MAX_TOKEN_LENGTH`.
pub const MAX_PAYLOAD_LENGTH: usize = (MAX_TOKEN_LENGTH + 3) / 4 * 3;

/// Decode a base64url segment without padding into `out`.
///
/// The segment is padded with `=` to a multiple of 4 and decoded into the first
/// `padded_len / 4 * 3` bytes of `out`. Returns the decoded length, or `None`
/// when the segment is empty, too long, not valid base64url, decodes to
/// nothing, or does not fit in `out`.
pub fn decode_segment(segment: &[u8], out: &mut [u8]) -> Option<usize> {
    if segment.is_empty() || segment.len() > MAX_TOKEN_LENGTH {
        return None;
    }
    let pad = (4 - segment.len() % 4) % 4;
    let padded_len = segment.len() + pad;
    let decoded_max = padded_len / 4 * 3;
    if decoded_max > out.len() {
        return None;
    }

    let mut padded = [0u8; MAX_TOKEN_LENGTH + 3];
    padded[..segment.len()].copy_from_slice(segment);
    padded[segment.len()..padded_len].fill(b'=');

    match URL_SAFE.decode_slice(&padded[..padded_len], &mut out[..decoded_max]) {
        Ok(0) | Err(_) => None,
        Ok(n) if n > decoded_max => None,
        Ok(n) => Some(n),
    }
}

/// Scan `token`'s payload for `claim` (e.g. `"\"exp\""`) and return its
/// unsigned integer value, using `scratch` for the decoded payload.
pub fn claim_u32_in(token: &str, claim: &str, scratch: &mut [u8]) -> u32 {
    let token = token.as_bytes();
    if token.is_empty() || token.len() > MAX_TOKEN_LENGTH || claim.is_empty() {
        return 0;
    }
    let Some(dot1) = token.iter().position(|&b| b == b'.') else {
        return 0;
    };
    let Some(dot2) = token[dot1 + 1..].iter().position(|&b| b == b'.') else {
        return 0;
    };
    let payload = &token[dot1 + 1..dot1 + 1 + dot2];

    let Some(decoded_len) = decode_segment(payload, scratch) else {
        return 0;
    };
    scan_u32(&scratch[..decoded_len], claim.as_bytes()).unwrap_or(0)
}

/// Same as [`claim_u32_in`] with a stack scratch buffer.
pub fn claim_u32(token: &str, claim: &str) -> u32 {
    let mut scratch = [0u8; MAX_PAYLOAD_LENGTH];
    claim_u32_in(token, claim, &mut scratch)
}

/// Token lifetime in seconds: `exp - iat`, or 0 when either claim is missing
/// or `exp` precedes `iat`.
pub fn token_lifetime_in(token: &str, scratch: &mut [u8]) -> u32 {
    let iat = claim_u32_in(token, CLAIM_IAT, scratch);
    let exp = claim_u32_in(token, CLAIM_EXP, scratch);
    if iat == 0 || exp == 0 {
        return 0;
    }
    exp.saturating_sub(iat)
}

/// Literal search for `key`, then `ws* ':' ws* digit+`. Rejects on overflow.
fn scan_u32(payload: &[u8], key: &[u8]) -> Option<u32> {
    let start = find_subslice(payload, key)?;
    let mut rest = &payload[start + key.len()..];

    rest = skip_ws(rest);
    let (&colon, tail) = rest.split_first()?;
    if colon != b':' {
        return None;
    }
    rest = skip_ws(tail);
    if !rest.first()?.is_ascii_digit() {
        return None;
    }

    let mut value: u32 = 0;
    for &b in rest.iter().take_while(|b| b.is_ascii_digit()) {
        let d = (b - b'0') as u32;
        if value > u32::MAX / 10 || (value == u32::MAX / 10 && d > u32::MAX % 10) {
            return None;
        }
        value = value * 10 + d;
    }
    Some(value)
}

fn skip_ws(mut s: &[u8]) -> &[u8] {
    while let Some((&b, tail)) = s.split_first() {
        if !b.is_ascii_whitespace() {
            break;
        }
        s = tail;
    }
    s
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Unsigned test token carrying `payload` as its claims.
#[cfg(test)]
pub(crate) fn token_with_payload(payload: &str) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload),
        "c2lnbmF0dXJl"
    )
}
