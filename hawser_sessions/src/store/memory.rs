use std::sync::RwLock;

use async_trait::async_trait;

use super::{SessionStore, StoreError};
use crate::Session;

/// A session store that lives only for the lifetime of the process
///
/// Suited to non-interactive and server contexts where nothing should
/// outlive the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    session: RwLock<Option<Session>>,
}

impl MemoryStore {
    /// Constructs a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn set(&self, session: &Session) -> Result<(), StoreError> {
        *self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session.clone());
        Ok(())
    }

    async fn remove(&self) -> Result<(), StoreError> {
        *self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}
