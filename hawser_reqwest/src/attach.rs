use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use hawser_sessions::{store::SessionStore, Session};
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

/// A stage that attaches the stored session's access token as a bearer
/// `Authorization` header
///
/// If the request already carries an `Authorization` header, or the store
/// holds no session, the request is forwarded untouched. This stage never
/// touches the network itself.
#[derive(Clone, Debug)]
pub struct AttachSessionTokenMiddleware {
    store: Arc<dyn SessionStore>,
}

impl AttachSessionTokenMiddleware {
    /// Constructs a new attach stage over a session store
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

fn bearer_header(session: &Session) -> Option<header::HeaderValue> {
    let token = session.access_token.as_str();
    let mut header_value = BytesMut::with_capacity(token.len() + 7);
    header_value.put_slice(b"Bearer ");
    header_value.put_slice(token.as_bytes());
    match header::HeaderValue::from_maybe_shared(header_value) {
        Ok(mut value) => {
            value.set_sensitive(true);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("stored access token contains bytes not valid in a header, skipping");
            None
        }
    }
}

#[async_trait::async_trait]
impl Middleware for AttachSessionTokenMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if !req.headers().contains_key(header::AUTHORIZATION) {
            match self.store.get().await {
                Some(session) => {
                    if let Some(value) = bearer_header(&session) {
                        req.headers_mut().insert(header::AUTHORIZATION, value);
                    }
                }
                None => {
                    tracing::trace!("no session available, request proceeds unauthenticated");
                }
            }
        }

        next.run(req, extensions).await
    }
}
