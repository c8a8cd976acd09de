//! The renewal client seam
//!
//! The coordinator needs exactly one capability from the authentication
//! service: exchanging a refresh credential for a new session. That
//! capability is expressed as the [`RefreshClient`] trait so the renewal
//! pipeline carries no dependency on any particular service client; a
//! generated API client, a mock, or the bundled [`HttpRefreshClient`] all
//! serve equally.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::{RefreshTokenRef, Session};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The HTTP status with which the authority rejects an invalid or expired
/// refresh credential
pub const INVALID_REFRESH_STATUS: u16 = 401;

/// The machine-readable code the authority attaches to that rejection
pub const INVALID_REFRESH_CODE: &str = "invalid-refresh-token";

/// An error while exchanging a refresh credential for a new session
#[derive(Debug, Error)]
pub enum RenewalError {
    /// The authority rejected the renewal request with an error body
    #[error("authority rejected the renewal request ({status} {code}): {message}")]
    Rejected {
        /// The HTTP status of the rejection
        status: u16,
        /// The machine-readable error code from the response body
        code: String,
        /// The human-readable message from the response body
        message: String,
    },
    /// Unable to send the renewal request to the authority
    #[error("error sending renewal request to authority")]
    RequestSend(#[source] BoxError),
    /// Unable to read the renewal response
    #[error("error reading renewal response body")]
    BodyRead(#[source] BoxError),
    /// Unable to deserialize a session from the renewal response
    #[error("error deserializing session from renewal response")]
    SessionBody(#[from] serde_json::Error),
}

impl RenewalError {
    /// Whether this failure means the refresh credential itself is no longer
    /// valid
    ///
    /// A rejection with this character is terminal: retrying with the same
    /// credential cannot succeed, and the session holding it should be
    /// discarded.
    pub fn is_invalid_refresh_token(&self) -> bool {
        matches!(
            self,
            RenewalError::Rejected {
                status: INVALID_REFRESH_STATUS,
                ..
            }
        )
    }
}

/// The single capability the renewal coordinator requires: exchanging a
/// refresh credential for a new session
#[async_trait]
pub trait RefreshClient: Send + Sync + fmt::Debug {
    /// Exchanges the refresh credential for a new session
    async fn exchange_refresh_token(
        &self,
        refresh_token: &RefreshTokenRef,
    ) -> Result<Session, RenewalError>;
}

#[cfg(feature = "reqwest")]
pub use self::http::HttpRefreshClient;

#[cfg(feature = "reqwest")]
mod http {
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    use super::{RefreshClient, RenewalError};
    use crate::{RefreshTokenRef, Session};

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct RefreshRequest<'a> {
        refresh_token: &'a RefreshTokenRef,
    }

    #[derive(Debug, Default, Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        message: Option<String>,
    }

    /// A renewal client that exchanges the refresh credential over HTTP
    ///
    /// Posts `{ "refreshToken": … }` as JSON to the configured token
    /// endpoint and expects a session in the response body. The client is a
    /// plain [`reqwest::Client`] on purpose: routing renewal calls through
    /// the authenticated middleware chain would recurse.
    #[derive(Clone, Debug)]
    pub struct HttpRefreshClient {
        client: reqwest::Client,
        token_url: reqwest::Url,
    }

    impl HttpRefreshClient {
        /// Constructs a new HTTP renewal client for the given token endpoint
        pub fn new(client: reqwest::Client, token_url: reqwest::Url) -> Self {
            Self { client, token_url }
        }
    }

    #[async_trait]
    impl RefreshClient for HttpRefreshClient {
        #[tracing::instrument(
            err,
            skip(self, refresh_token),
            fields(token_url = %self.token_url),
        )]
        async fn exchange_refresh_token(
            &self,
            refresh_token: &RefreshTokenRef,
        ) -> Result<Session, RenewalError> {
            tracing::trace!("exchanging refresh credential for a new session");

            let resp = self
                .client
                .post(self.token_url.clone())
                .json(&RefreshRequest { refresh_token })
                .send()
                .await
                .map_err(|e| RenewalError::RequestSend(e.into()))?;

            let status = resp.status();
            tracing::debug!(
                response.status = status.as_u16(),
                "received renewal response from authority"
            );

            let body = resp
                .bytes()
                .await
                .map_err(|e| RenewalError::BodyRead(e.into()))?;

            if !status.is_success() {
                let error_body: ErrorBody = serde_json::from_slice(&body).unwrap_or_default();
                return Err(RenewalError::Rejected {
                    status: status.as_u16(),
                    code: error_body.error.unwrap_or_else(|| "unknown".to_owned()),
                    message: error_body.message.unwrap_or_default(),
                });
            }

            let session: Session = serde_json::from_slice(&body)?;

            tracing::info!(
                has_user = session.user.is_some(),
                lifetime = session.access_token_expires_in.0,
                "received renewed session"
            );

            Ok(session)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_refresh_rejection_is_terminal() {
        let error = RenewalError::Rejected {
            status: INVALID_REFRESH_STATUS,
            code: INVALID_REFRESH_CODE.to_owned(),
            message: "refresh token is invalid or expired".to_owned(),
        };
        assert!(error.is_invalid_refresh_token());
    }

    #[test]
    fn other_rejections_are_not_terminal() {
        let error = RenewalError::Rejected {
            status: 503,
            code: "unavailable".to_owned(),
            message: String::new(),
        };
        assert!(!error.is_invalid_refresh_token());
    }

    #[test]
    fn transport_failures_are_not_terminal() {
        let error = RenewalError::RequestSend("connection refused".into());
        assert!(!error.is_invalid_refresh_token());
    }
}
