use std::{borrow::Cow, sync::Arc};

use aliri_clock::{Clock, System};
use hawser_sessions::coordinator::RefreshCoordinator;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

const DEFAULT_RENEWAL_SUFFIX: &str = "/token";

/// A stage that renews the stored session before the request goes out
///
/// Renewal happens through a [`RefreshCoordinator`], so concurrent requests
/// against the same store share a single renewal. Two kinds of requests
/// bypass the stage entirely: requests that already carry an `Authorization`
/// header, and requests aimed at the renewal endpoint itself, which would
/// otherwise recurse.
///
/// The request proceeds whether or not a session could be produced; the
/// attach stage simply has nothing to add when renewal came up empty.
#[derive(Debug)]
pub struct RefreshSessionMiddleware<C = System> {
    coordinator: Arc<RefreshCoordinator<C>>,
    renewal_suffix: Cow<'static, str>,
}

impl<C> RefreshSessionMiddleware<C> {
    /// Constructs a new refresh stage over a coordinator
    pub fn new(coordinator: Arc<RefreshCoordinator<C>>) -> Self {
        Self {
            coordinator,
            renewal_suffix: Cow::Borrowed(DEFAULT_RENEWAL_SUFFIX),
        }
    }

    /// Overrides the path suffix identifying the renewal endpoint
    ///
    /// Requests whose path ends with this suffix are never refreshed.
    pub fn with_renewal_suffix(mut self, suffix: impl Into<Cow<'static, str>>) -> Self {
        self.renewal_suffix = suffix.into();
        self
    }

    fn should_bypass(&self, req: &Request) -> bool {
        req.headers().contains_key(header::AUTHORIZATION)
            || req.url().path().ends_with(self.renewal_suffix.as_ref())
    }
}

#[async_trait::async_trait]
impl<C> Middleware for RefreshSessionMiddleware<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if !self.should_bypass(&req) && self.coordinator.fresh_session().await.is_none() {
            tracing::debug!("no usable session, request proceeds unauthenticated");
        }

        next.run(req, extensions).await
    }
}
