//! Session stores
//!
//! A store owns exactly one persisted [`Session`] (or none) and is the sole
//! writer of session state. All backends obey the same laws: `get` after
//! `set(S)` returns a value deep-equal to `S`; `get` before the first `set`
//! or after `remove` returns `None`; and malformed persisted data is treated
//! as absent, with the corrupt record removed so it cannot resurface.

use std::{fmt, io};

use async_trait::async_trait;
use thiserror::Error;

use crate::Session;

mod cookie;
#[cfg(feature = "file")]
mod file;
mod memory;
mod observed;

pub use cookie::{CookieJar, CookieStore, MemoryJar, SameSite, DEFAULT_SESSION_COOKIE};
#[cfg(feature = "file")]
pub use file::FileStore;
pub use memory::MemoryStore;
pub use observed::ObservedStore;

/// An error while persisting or removing a session
///
/// Reads never surface errors: a store that cannot produce a well-formed
/// session reports `None` from [`SessionStore::get`] after healing itself.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing medium could not be read or written
    #[error("failed to access the persisted session")]
    Io(#[from] io::Error),
    /// The session could not be serialized
    #[error("failed to serialize the session")]
    Serialize(#[from] serde_json::Error),
}

/// Pluggable persistence for a session
///
/// Mutation is wholesale: `set` replaces the entire persisted value and
/// `remove` clears it. Implementations must make both appear atomic to
/// readers, so that no reader ever observes a partially-written session.
#[async_trait]
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// Gets the persisted session, if a well-formed one is present
    ///
    /// Corrupt persisted data is self-healed: the record is removed, a
    /// warning is logged, and `None` is returned.
    async fn get(&self) -> Option<Session>;

    /// Persists the session, replacing any previous value
    async fn set(&self, session: &Session) -> Result<(), StoreError>;

    /// Removes the persisted session, if any
    async fn remove(&self) -> Result<(), StoreError>;
}
