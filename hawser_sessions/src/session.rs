use aliri_clock::DurationSecs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AccessToken, RefreshToken, RefreshTokenId};

/// The atomic persisted unit of an authenticated session
///
/// A session is either fully present or absent: deserialization fails unless
/// both credential fields are present, and stores replace the value wholesale
/// rather than patching individual fields. It is created by a successful
/// sign-in or renewal response and destroyed on sign-out or when the refresh
/// credential is rejected as invalid.
///
/// Field names follow the wire format of the authentication service
/// (camelCase).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// The bearer token attached to outgoing requests
    pub access_token: AccessToken,
    /// The nominal lifetime of the access token, in seconds
    ///
    /// Informational only; freshness decisions are made from the expiration
    /// claim embedded in the access token itself.
    pub access_token_expires_in: DurationSecs,
    /// The credential exchanged for a new session when the access token
    /// approaches expiry
    pub refresh_token: RefreshToken,
    /// The server-side identifier of the refresh token
    pub refresh_token_id: RefreshTokenId,
    /// The identity the session belongs to, when the authority includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

/// The identity associated with a session
///
/// Only the common fields are typed; anything else the authority includes is
/// preserved in `extra` so a round trip through a store is lossless.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The user's unique identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The user's display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// The user's email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether the email address has been verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    /// A URL to the user's avatar image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// The role assumed when a request does not specify one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_role: Option<String>,
    /// All roles available to the user
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Additional fields returned by the authority
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
