//! Inspection of an access token's self-describing expiration
//!
//! A bearer token in compact JWS form carries its own expiration in the `exp`
//! claim of its payload segment. Decoding that claim locally lets the renewal
//! coordinator decide whether a session needs renewing without contacting the
//! network.
//!
//! Decoding never fails loudly: a malformed token yields
//! [`TokenExpiry::Unknown`], which every consumer treats as already expired.

use aliri_clock::{DurationSecs, UnixTime};
use base64::Engine as _;
use serde_json::Value;

use crate::AccessTokenRef;

/// The expiration of an access token, as decoded from the token itself
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenExpiry {
    /// The token expires at the given instant
    At(UnixTime),
    /// The expiration could not be determined
    ///
    /// Treated as already expired wherever a decision is required.
    Unknown,
}

impl TokenExpiry {
    /// Whether the token should be renewed as of `now`
    ///
    /// A token whose remaining lifetime is exactly `margin` is due for
    /// renewal; one second more is not. An unknown expiry always needs
    /// renewal.
    pub fn needs_refresh(self, now: UnixTime, margin: DurationSecs) -> bool {
        match self {
            TokenExpiry::At(expiry) => expiry.0.saturating_sub(now.0) <= margin.0,
            TokenExpiry::Unknown => true,
        }
    }

    /// Whether the token is strictly past its expiration as of `now`
    ///
    /// An unknown expiry is considered expired.
    pub fn is_expired(self, now: UnixTime) -> bool {
        match self {
            TokenExpiry::At(expiry) => expiry.0 < now.0,
            TokenExpiry::Unknown => true,
        }
    }
}

/// Decodes the expiration instant embedded in an access token
///
/// The token is expected in compact JWS form (`header.payload.signature`).
/// The payload segment is base64url-decoded and its numeric `exp` claim is
/// read. Any defect along the way — wrong segment count, an empty or
/// undecodable payload, or a missing or non-numeric claim — produces
/// [`TokenExpiry::Unknown`] and a warning, never an error.
pub fn token_expiry(token: &AccessTokenRef) -> TokenExpiry {
    let mut segments = token.as_str().split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if segments.next().is_none() && !payload.is_empty() => {
            payload
        }
        _ => {
            tracing::warn!("access token is not in compact JWS form");
            return TokenExpiry::Unknown;
        }
    };

    let claims = match decode_payload(payload) {
        Some(claims) => claims,
        None => {
            tracing::warn!("unable to decode access token payload");
            return TokenExpiry::Unknown;
        }
    };

    match claims.get("exp").and_then(Value::as_u64) {
        Some(exp) => TokenExpiry::At(UnixTime(exp)),
        None => {
            tracing::warn!("access token carries no usable exp claim");
            TokenExpiry::Unknown
        }
    }
}

fn decode_payload(payload: &str) -> Option<Value> {
    // Tokens minted with the standard alphabet are normalized to base64url
    // before decoding, and padding is stripped rather than required.
    let normalized = payload
        .replace('+', "-")
        .replace('/', "_")
        .trim_end_matches('=')
        .to_owned();
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(normalized)
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}
