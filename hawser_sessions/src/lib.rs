//! Session persistence and single-flight renewal for bearer-authenticated clients
//!
//! This library provides the pieces needed to keep a bearer-authenticated API
//! client signed in without the application having to think about token
//! lifetimes: pluggable session stores, inspection of the access token's
//! embedded expiration, and a renewal coordinator that guarantees at most one
//! in-flight renewal call no matter how many concurrent requests notice the
//! token going stale at the same time.
//!
//! The general flow is:
//!
//! 1. A [`Session`] is persisted in a [`SessionStore`][store::SessionStore]
//!    backend after a successful sign-in or renewal. Backends exist for
//!    in-memory use, the local filesystem, and a same-site cookie that can be
//!    read identically by client and server-rendering contexts.
//! 2. Before an outgoing request is sent, the
//!    [`RefreshCoordinator`][coordinator::RefreshCoordinator] checks whether
//!    the stored access token is within its renewal margin and, if so,
//!    exchanges the refresh credential for a new session through a
//!    [`RefreshClient`][renewal::RefreshClient].
//! 3. Concurrent callers are funneled through a shared/exclusive
//!    [`RenewalLock`][coordinator::RenewalLock] with a double-checked
//!    re-evaluation, so only the first caller to win the exclusive section
//!    performs the network exchange; everyone else observes either the
//!    pre-renewal or the freshly-renewed session, never a torn one.
//!
//! Renewal failures degrade gracefully: while the old token is merely within
//! its margin (not yet strictly expired), a failed exchange is treated as
//! transient and the still-valid session is returned. Only a renewal rejected
//! as an invalid refresh credential discards the session.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hawser_sessions::{
//!     coordinator::RefreshCoordinator,
//!     renewal::HttpRefreshClient,
//!     store::{MemoryStore, ObservedStore, SessionStore},
//! };
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let store = Arc::new(ObservedStore::new(MemoryStore::new()).await);
//! let mut sessions = store.subscribe();
//!
//! let client = HttpRefreshClient::new(
//!     reqwest::Client::new(),
//!     "https://auth.example.com/v1/token".parse().unwrap(),
//! );
//!
//! let coordinator = RefreshCoordinator::new(store, Arc::new(client));
//!
//! // Returns the current session, renewing it first if it is about to expire.
//! let session = coordinator.fresh_session().await;
//! # }
//! ```
//!
//! # Features
//!
//! The following features are supported by this crate, all of which are
//! enabled by default:
//!
//! * `file`: Provides a session store backed by a JSON file on disk.
//! * `reqwest`: Provides [`HttpRefreshClient`][renewal::HttpRefreshClient],
//!   a renewal client that exchanges the refresh credential over HTTP.

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

mod braids;
pub mod coordinator;
pub mod expiry;
pub mod renewal;
mod session;
pub mod store;
#[cfg(test)]
mod test_support;

pub use braids::*;
pub use coordinator::{RefreshCoordinator, RenewalLock};
pub use expiry::{token_expiry, TokenExpiry};
pub use renewal::{RefreshClient, RenewalError};
pub use session::{Session, UserProfile};
pub use store::{SessionStore, StoreError};
