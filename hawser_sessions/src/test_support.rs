//! Shared helpers for in-crate tests

use aliri_clock::DurationSecs;
use base64::Engine as _;

use crate::{AccessToken, RefreshToken, RefreshTokenId, Session};

/// Builds a session with arbitrary (non-JWT) token strings
pub(crate) fn sample_session(access: &str, refresh: &str) -> Session {
    Session {
        access_token: AccessToken::from(access.to_owned()),
        access_token_expires_in: DurationSecs(900),
        refresh_token: RefreshToken::from(refresh.to_owned()),
        refresh_token_id: RefreshTokenId::from_static("rt-1"),
        user: None,
    }
}

/// Mints an unsigned compact-JWS access token with the given `exp` claim
pub(crate) fn token_expiring_at(exp: u64) -> AccessToken {
    let header = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .encode(format!("{{\"exp\":{exp}}}").as_bytes());
    AccessToken::from(format!("{header}.{payload}.sig"))
}

/// Builds a session whose access token expires at `exp`
pub(crate) fn session_expiring_at(exp: u64, refresh: &str) -> Session {
    Session {
        access_token: token_expiring_at(exp),
        access_token_expires_in: DurationSecs(900),
        refresh_token: RefreshToken::from(refresh.to_owned()),
        refresh_token_id: RefreshTokenId::from_static("rt-1"),
        user: None,
    }
}
