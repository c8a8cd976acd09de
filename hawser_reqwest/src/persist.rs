use std::{error, sync::Arc};

use hawser_sessions::{store::SessionStore, Session};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use serde_json::Value;

/// How the persist stage treats a request, judged by its path
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RequestKind {
    /// A sign-out: any response clears the store
    SignOut,
    /// An authentication exchange whose response may carry a session
    SessionBearing,
    /// Anything else; the response passes through untouched
    Other,
}

fn classify(path: &str) -> RequestKind {
    if path.ends_with("/signout") {
        RequestKind::SignOut
    } else if path.ends_with("/token") || path.contains("/signin/") || path.contains("/signup/") {
        RequestKind::SessionBearing
    } else {
        RequestKind::Other
    }
}

fn session_envelope(body: &Value) -> Option<&Value> {
    body.get("session")
}

fn data_session_envelope(body: &Value) -> Option<&Value> {
    body.get("data")?.get("session")
}

fn bare_session(body: &Value) -> Option<&Value> {
    Some(body)
}

/// The body shapes a session may arrive in, tried in order
const EXTRACTION_STRATEGIES: &[(&str, fn(&Value) -> Option<&Value>)] = &[
    ("session-envelope", session_envelope),
    ("data-session-envelope", data_session_envelope),
    ("bare-session", bare_session),
];

fn extract_session(body: &Value) -> Option<(&'static str, Session)> {
    for &(shape, extract) in EXTRACTION_STRATEGIES {
        let Some(candidate) = extract(body) else {
            continue;
        };
        if let Ok(session) = serde_json::from_value::<Session>(candidate.clone()) {
            if !session.access_token.as_str().is_empty()
                && !session.refresh_token.as_str().is_empty()
            {
                return Some((shape, session));
            }
        }
    }
    None
}

/// A stage that carries sessions from authentication responses into the store
///
/// Responses to sign-in, sign-up, and token-renewal requests may hand back a
/// new session in one of a few body shapes; a response to a sign-out clears
/// the store instead, whatever its status, since the caller's intent to
/// discard the session stands even when the service errs. All other traffic
/// passes through untouched.
///
/// Reading a response body consumes it, so after a session is captured the
/// stage reassembles an equivalent response and hands that to the caller;
/// the body remains readable downstream.
#[derive(Clone, Debug)]
pub struct PersistSessionMiddleware {
    store: Arc<dyn SessionStore>,
}

impl PersistSessionMiddleware {
    /// Constructs a new persist stage over a session store
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    async fn capture_session(&self, response: Response) -> Response {
        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(
                    error = &error as &dyn error::Error,
                    "unable to read an authentication response body"
                );
                bytes::Bytes::new()
            }
        };

        if let Ok(json) = serde_json::from_slice::<Value>(&body) {
            if let Some((shape, session)) = extract_session(&json) {
                tracing::debug!(shape, "captured a session from an authentication response");
                if let Err(error) = self.store.set(&session).await {
                    tracing::warn!(
                        error = &error as &dyn error::Error,
                        "unable to persist a captured session"
                    );
                }
            }
        }

        let mut rebuilt = http::Response::new(body);
        *rebuilt.status_mut() = status;
        *rebuilt.version_mut() = version;
        *rebuilt.headers_mut() = headers;
        rebuilt.into()
    }
}

#[async_trait::async_trait]
impl Middleware for PersistSessionMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        // Classified up front: the request is consumed by the inner chain.
        let kind = classify(req.url().path());

        let response = next.run(req, extensions).await?;

        match kind {
            RequestKind::SignOut => {
                if let Err(error) = self.store.remove().await {
                    tracing::warn!(
                        error = &error as &dyn error::Error,
                        "unable to clear the store after sign-out"
                    );
                }
                Ok(response)
            }
            RequestKind::SessionBearing if response.status().is_success() => {
                Ok(self.capture_session(response).await)
            }
            _ => Ok(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use hawser_sessions::store::MemoryStore;

    use super::*;
    use crate::{
        test_support::{sample_session, ShortCircuit},
        FetchChain,
    };

    fn chain_over(store: Arc<dyn SessionStore>, terminal: ShortCircuit) -> FetchChain {
        FetchChain::new(reqwest::Client::new())
            .with(PersistSessionMiddleware::new(store))
            .with(terminal)
    }

    fn session_json() -> String {
        serde_json::to_string(&sample_session("captured-access", "captured-refresh")).unwrap()
    }

    #[tokio::test]
    async fn captures_an_enveloped_session() {
        let store = Arc::new(MemoryStore::new());
        let body = format!(r#"{{"session":{}}}"#, session_json());
        let chain = chain_over(store.clone(), ShortCircuit::json(body));

        chain
            .build()
            .post("https://auth.example.com/v1/signin/email-password")
            .send()
            .await
            .unwrap();

        assert_eq!(
            store.get().await,
            Some(sample_session("captured-access", "captured-refresh"))
        );
    }

    #[tokio::test]
    async fn captures_a_data_enveloped_session() {
        let store = Arc::new(MemoryStore::new());
        let body = format!(r#"{{"data":{{"session":{}}}}}"#, session_json());
        let chain = chain_over(store.clone(), ShortCircuit::json(body));

        chain
            .build()
            .post("https://auth.example.com/v1/signup/email-password")
            .send()
            .await
            .unwrap();

        assert_eq!(
            store.get().await,
            Some(sample_session("captured-access", "captured-refresh"))
        );
    }

    #[tokio::test]
    async fn captures_a_bare_session() {
        let store = Arc::new(MemoryStore::new());
        let chain = chain_over(store.clone(), ShortCircuit::json(session_json()));

        chain
            .build()
            .post("https://auth.example.com/v1/token")
            .send()
            .await
            .unwrap();

        assert_eq!(
            store.get().await,
            Some(sample_session("captured-access", "captured-refresh"))
        );
    }

    #[tokio::test]
    async fn the_body_remains_readable_after_capture() {
        let store = Arc::new(MemoryStore::new());
        let body = format!(r#"{{"session":{}}}"#, session_json());
        let chain = chain_over(store.clone(), ShortCircuit::json(body.clone()));

        let resp = chain
            .build()
            .post("https://auth.example.com/v1/token")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(
            resp.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(resp.text().await.unwrap(), body);
    }

    #[tokio::test]
    async fn a_successful_sign_out_clears_the_store() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&sample_session("old-access", "old-refresh"))
            .await
            .unwrap();
        let chain = chain_over(store.clone(), ShortCircuit::default());

        chain
            .build()
            .post("https://auth.example.com/v1/signout")
            .send()
            .await
            .unwrap();

        assert_eq!(store.get().await, None);
    }

    #[tokio::test]
    async fn a_failed_sign_out_still_clears_the_store() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&sample_session("old-access", "old-refresh"))
            .await
            .unwrap();
        let chain = chain_over(
            store.clone(),
            ShortCircuit::default().with_status(http::StatusCode::INTERNAL_SERVER_ERROR),
        );

        let resp = chain
            .build()
            .post("https://auth.example.com/v1/signout")
            .send()
            .await
            .unwrap();

        // The caller asked to be signed out; the service erring does not
        // keep the session alive locally.
        assert_eq!(resp.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.get().await, None);
    }

    #[tokio::test]
    async fn ordinary_traffic_passes_through_untouched() {
        let store = Arc::new(MemoryStore::new());
        let chain = chain_over(store.clone(), ShortCircuit::json(session_json()));

        let resp = chain
            .build()
            .get("https://api.example.com/v1/things")
            .send()
            .await
            .unwrap();

        // A session-shaped body on a non-authentication path is not captured.
        assert_eq!(store.get().await, None);
        assert_eq!(resp.text().await.unwrap(), session_json());
    }

    #[tokio::test]
    async fn a_sessionless_body_leaves_the_store_alone() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&sample_session("kept-access", "kept-refresh"))
            .await
            .unwrap();
        let chain = chain_over(
            store.clone(),
            ShortCircuit::json(r#"{"mfa":{"ticket":"mfaTotp:abc"}}"#),
        );

        chain
            .build()
            .post("https://auth.example.com/v1/signin/email-password")
            .send()
            .await
            .unwrap();

        assert_eq!(
            store.get().await,
            Some(sample_session("kept-access", "kept-refresh"))
        );
    }

    #[tokio::test]
    async fn empty_token_fields_are_not_captured() {
        let store = Arc::new(MemoryStore::new());
        let mut hollow = sample_session("", "");
        hollow.refresh_token_id = hawser_sessions::RefreshTokenId::from_static("rt-hollow");
        let body = format!(
            r#"{{"session":{}}}"#,
            serde_json::to_string(&hollow).unwrap()
        );
        let chain = chain_over(store.clone(), ShortCircuit::json(body));

        chain
            .build()
            .post("https://auth.example.com/v1/token")
            .send()
            .await
            .unwrap();

        assert_eq!(store.get().await, None);
    }

    #[test]
    fn paths_classify_as_expected() {
        assert_eq!(classify("/v1/signout"), RequestKind::SignOut);
        assert_eq!(classify("/v1/token"), RequestKind::SessionBearing);
        assert_eq!(
            classify("/v1/signin/email-password"),
            RequestKind::SessionBearing
        );
        assert_eq!(classify("/v1/signin/anonymous"), RequestKind::SessionBearing);
        assert_eq!(
            classify("/v1/signup/email-password"),
            RequestKind::SessionBearing
        );
        assert_eq!(classify("/v1/things"), RequestKind::Other);
        assert_eq!(classify("/v1/user/password"), RequestKind::Other);
        // Substrings without the segment separator do not count.
        assert_eq!(classify("/v1/signing"), RequestKind::Other);
        assert_eq!(classify("/v1/resignin-report"), RequestKind::Other);
        assert_eq!(classify("/v1/signup-help"), RequestKind::Other);
    }
}
