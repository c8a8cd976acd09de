//! Middleware to keep outgoing requests authenticated with a stored session
//!
//! Three stages cover the whole credential lifecycle around a request:
//!
//! * [`RefreshSessionMiddleware`] renews the stored session before the
//!   request goes out, through a single-flight
//!   [`RefreshCoordinator`][hawser_sessions::coordinator::RefreshCoordinator];
//! * [`AttachSessionTokenMiddleware`] attaches the current access token as a
//!   bearer `Authorization` header;
//! * [`PersistSessionMiddleware`] captures sessions carried by
//!   authentication responses back into the store, and clears the store on
//!   sign-out.
//!
//! Stages compose through [`FetchChain`], an immutable builder over
//! [`reqwest_middleware`]: extending a chain yields a new chain, so handing
//! a chain to several clients never lets one client's additions leak into
//! another's. [`session_chain`] assembles the standard three-stage order.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hawser_reqwest::session_chain;
//! use hawser_sessions::{
//!     coordinator::RefreshCoordinator,
//!     renewal::HttpRefreshClient,
//!     store::{MemoryStore, SessionStore},
//! };
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
//! let refresh = HttpRefreshClient::new(
//!     reqwest::Client::new(),
//!     "https://auth.example.com/v1/token".parse().unwrap(),
//! );
//! let coordinator = Arc::new(RefreshCoordinator::new(
//!     Arc::clone(&store),
//!     Arc::new(refresh),
//! ));
//!
//! let client = session_chain(reqwest::Client::new(), store, Some(coordinator)).build();
//!
//! let resp = client
//!     .get("https://api.example.com/v1/things")
//!     .send()
//!     .await
//!     .unwrap();
//! # }
//! ```
//!
//! If a request already carries an `Authorization` header by the time the
//! stages run, both the refresh and attach stages leave it alone, allowing
//! overrides to be specified as required.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::{fmt, sync::Arc};

use aliri_clock::Clock;
use hawser_sessions::{coordinator::RefreshCoordinator, store::SessionStore};
use reqwest_middleware::{ClientWithMiddleware, Middleware};

mod attach;
mod persist;
mod refresh;

pub use attach::AttachSessionTokenMiddleware;
pub use persist::PersistSessionMiddleware;
pub use refresh::RefreshSessionMiddleware;

/// An immutable, incrementally extensible middleware chain
///
/// A chain is an ordered list of stages around a base [`reqwest::Client`];
/// [`build`][Self::build] composes them into a
/// [`ClientWithMiddleware`], with the first stage added outermost. Each
/// stage decides whether and how to call its inner successor: it may
/// short-circuit, transform the request or response around the call, or
/// (though no built-in stage does) call it more than once.
///
/// Extension never mutates shared state: [`with`][Self::with] consumes the
/// chain and returns a longer one, and a chain can be cloned first to keep
/// the shorter composition alive. A chain remains extensible after having
/// been built.
#[derive(Clone)]
pub struct FetchChain {
    client: reqwest::Client,
    stages: Vec<Arc<dyn Middleware>>,
}

impl FetchChain {
    /// Constructs an empty chain around a base client
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            stages: Vec::new(),
        }
    }

    /// Appends a stage, returning the extended chain
    #[must_use]
    pub fn with<M: Middleware + 'static>(self, stage: M) -> Self {
        self.with_arc(Arc::new(stage))
    }

    /// Appends a shared stage, returning the extended chain
    #[must_use]
    pub fn with_arc(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.stages.push(stage);
        self
    }

    /// The number of stages currently composed
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Composes the stages into a ready-to-use client
    pub fn build(&self) -> ClientWithMiddleware {
        let mut builder = reqwest_middleware::ClientBuilder::new(self.client.clone());
        for stage in &self.stages {
            builder = builder.with_arc(Arc::clone(stage));
        }
        builder.build()
    }
}

impl fmt::Debug for FetchChain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FetchChain")
            .field("stages", &self.stages.len())
            .finish()
    }
}

/// Assembles the standard session-management chain
///
/// Stage order, outermost first: refresh-on-demand (only when a coordinator
/// is supplied — omit it for contexts that must never renew, such as
/// server-side rendering against a request-scoped cookie), then
/// persist-from-response, then attach-credential.
pub fn session_chain<C>(
    client: reqwest::Client,
    store: Arc<dyn SessionStore>,
    coordinator: Option<Arc<RefreshCoordinator<C>>>,
) -> FetchChain
where
    C: Clock + Send + Sync + 'static,
{
    let mut chain = FetchChain::new(client);
    if let Some(coordinator) = coordinator {
        chain = chain.with(RefreshSessionMiddleware::new(coordinator));
    }
    chain
        .with(PersistSessionMiddleware::new(Arc::clone(&store)))
        .with(AttachSessionTokenMiddleware::new(store))
}

#[cfg(test)]
mod test_support;
