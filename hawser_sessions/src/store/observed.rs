use async_trait::async_trait;
use tokio::sync::watch;

use super::{SessionStore, StoreError};
use crate::Session;

/// A decorator that layers change notification over any session store
///
/// Writes are forwarded to the wrapped backend and then published on a
/// [`watch`] channel, but only when the stored value actually changed;
/// writing the same session twice produces a single notification. The
/// listener set's lifecycle is independent of the session's: receivers may
/// come and go freely, and notifications are dropped (not buffered) when no
/// one is subscribed.
#[derive(Debug)]
pub struct ObservedStore<S> {
    inner: S,
    tx: watch::Sender<Option<Session>>,
}

impl<S: SessionStore> ObservedStore<S> {
    /// Wraps a backend, seeding the change channel with its current value
    pub async fn new(inner: S) -> Self {
        let current = inner.get().await;
        let (tx, _rx) = watch::channel(current);
        Self { inner, tx }
    }

    /// Subscribes to session changes
    ///
    /// The receiver observes the session as of subscription time and is
    /// notified of every subsequent change, with `None` published when the
    /// session is removed.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    fn publish(&self, session: Option<&Session>) {
        self.tx.send_if_modified(|current| {
            if current.as_ref() == session {
                false
            } else {
                *current = session.cloned();
                true
            }
        });
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for ObservedStore<S> {
    async fn get(&self) -> Option<Session> {
        self.inner.get().await
    }

    async fn set(&self, session: &Session) -> Result<(), StoreError> {
        self.inner.set(session).await?;
        self.publish(Some(session));
        Ok(())
    }

    async fn remove(&self) -> Result<(), StoreError> {
        self.inner.remove().await?;
        self.publish(None);
        Ok(())
    }
}
