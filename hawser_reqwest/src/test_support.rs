//! Shared helpers for in-crate tests

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use aliri_clock::DurationSecs;
use base64::Engine as _;
use hawser_sessions::{AccessToken, RefreshToken, RefreshTokenId, Session};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

/// A terminal stage that answers every request locally, without touching
/// the network or its inner successor
#[derive(Default)]
pub(crate) struct ShortCircuit {
    pub body: String,
    pub status: http::StatusCode,
    pub hits: AtomicUsize,
}

impl ShortCircuit {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            status: http::StatusCode::OK,
            hits: AtomicUsize::new(0),
        }
    }

    pub fn with_status(mut self, status: http::StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Acquire)
    }
}

#[async_trait::async_trait]
impl Middleware for ShortCircuit {
    async fn handle(
        &self,
        _req: Request,
        _extensions: &mut http::Extensions,
        _next: Next<'_>,
    ) -> Result<Response> {
        self.hits.fetch_add(1, Ordering::AcqRel);
        let response = http::Response::builder()
            .status(self.status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(self.body.clone())
            .unwrap();
        Ok(response.into())
    }
}

/// A stage that records its name in a shared log before delegating
pub(crate) struct RecordingStage {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingStage {
    pub fn new(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self { name, log }
    }
}

#[async_trait::async_trait]
impl Middleware for RecordingStage {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        self.log.lock().unwrap().push(self.name);
        next.run(req, extensions).await
    }
}

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

/// Builds a session whose access token is a compact JWS expiring at `exp`
pub(crate) fn session_expiring_at(exp: u64, refresh: &str) -> Session {
    let header = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .encode(format!("{{\"exp\":{exp}}}").as_bytes());
    Session {
        access_token: AccessToken::from(format!("{header}.{payload}.sig")),
        access_token_expires_in: DurationSecs(900),
        refresh_token: RefreshToken::from(refresh.to_owned()),
        refresh_token_id: RefreshTokenId::from_static("rt-1"),
        user: None,
    }
}
