//! Single-flight renewal coordination
//!
//! Many concurrent requests can notice an expiring token at the same moment;
//! left alone they would all race to renew it, hammering the authority and
//! rotating the refresh credential out from under one another. The
//! [`RefreshCoordinator`] funnels them through a shared/exclusive
//! [`RenewalLock`] with a double-checked re-evaluation so at most one network
//! renewal is in flight per store, while the common case — a still-fresh
//! token — stays on the cheap shared path.

use std::{error, fmt, sync::Arc};

use aliri_clock::{Clock, DurationSecs, System};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    expiry::token_expiry,
    renewal::{RefreshClient, RenewalError},
    store::SessionStore,
    Session,
};

/// The default renewal margin: renew once less than a minute of validity
/// remains
pub const DEFAULT_RENEWAL_MARGIN: DurationSecs = DurationSecs(60);

/// The mutual-exclusion domain guarding one store's renewals
///
/// Logically "one session, one lock": every coordinator owns exactly one.
/// The [`passthrough`][RenewalLock::passthrough] variant grants all requests
/// immediately; it preserves correctness for strictly non-concurrent callers
/// but forfeits the single-flight guarantee, the documented degradation for
/// environments that cannot provide real exclusion.
#[derive(Debug)]
pub struct RenewalLock {
    inner: Option<RwLock<()>>,
}

impl Default for RenewalLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RenewalLock {
    /// Constructs a real shared/exclusive lock
    pub fn new() -> Self {
        Self {
            inner: Some(RwLock::new(())),
        }
    }

    /// Constructs a lock that grants every request immediately
    pub fn passthrough() -> Self {
        Self { inner: None }
    }

    async fn shared(&self) -> Option<RwLockReadGuard<'_, ()>> {
        match &self.inner {
            Some(lock) => Some(lock.read().await),
            None => None,
        }
    }

    async fn exclusive(&self) -> Option<RwLockWriteGuard<'_, ()>> {
        match &self.inner {
            Some(lock) => Some(lock.write().await),
            None => None,
        }
    }
}

struct Freshness {
    session: Session,
    needs_refresh: bool,
    expired: bool,
}

/// Coordinates session renewal against one store
///
/// [`fresh_session`][Self::fresh_session] is the only entry point: it
/// returns a session that was valid at the time of the call, renewing it
/// first when it is within the configured margin of expiry, or `None` when
/// no usable session exists. It never surfaces lock or decode errors; the
/// caller observes only "a session" or "no session".
pub struct RefreshCoordinator<C = System> {
    store: Arc<dyn SessionStore>,
    client: Arc<dyn RefreshClient>,
    margin: DurationSecs,
    lock: RenewalLock,
    clock: C,
}

impl RefreshCoordinator<System> {
    /// Constructs a coordinator with the default margin, a real lock, and
    /// the system clock
    pub fn new(store: Arc<dyn SessionStore>, client: Arc<dyn RefreshClient>) -> Self {
        Self {
            store,
            client,
            margin: DEFAULT_RENEWAL_MARGIN,
            lock: RenewalLock::new(),
            clock: System,
        }
    }
}

impl<C> RefreshCoordinator<C> {
    /// Uses a custom renewal margin
    ///
    /// A session whose token has exactly `margin` of validity remaining is
    /// due for renewal. A margin of zero renews only once the token has
    /// actually expired.
    pub fn with_margin(mut self, margin: DurationSecs) -> Self {
        self.margin = margin;
        self
    }

    /// Uses a custom lock, typically [`RenewalLock::passthrough`]
    pub fn with_lock(mut self, lock: RenewalLock) -> Self {
        self.lock = lock;
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> RefreshCoordinator<D> {
        RefreshCoordinator {
            store: self.store,
            client: self.client,
            margin: self.margin,
            lock: self.lock,
            clock,
        }
    }

    /// The store this coordinator renews against
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }
}

impl<C> fmt::Debug for RefreshCoordinator<C>
where
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("store", &self.store)
            .field("client", &self.client)
            .field("margin", &self.margin)
            .field("lock", &self.lock)
            .field("clock", &self.clock)
            .finish()
    }
}

impl<C: Clock + Send + Sync> RefreshCoordinator<C> {
    /// Returns a currently-valid session, renewing it first if needed
    ///
    /// A renewal failure is retried once from the top. If the retry fails
    /// because the refresh credential itself was rejected as invalid, the
    /// session is unrecoverable: it is removed from the store and `None`
    /// returned. Any other repeated failure returns `None` with the store
    /// left untouched.
    pub async fn fresh_session(&self) -> Option<Session> {
        match self.renew_if_stale().await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(
                    error = &error as &dyn error::Error,
                    "session renewal failed, retrying once"
                );
                match self.renew_if_stale().await {
                    Ok(outcome) => outcome,
                    Err(error) if error.is_invalid_refresh_token() => {
                        tracing::error!(
                            "refresh credential rejected as invalid, discarding session"
                        );
                        if let Err(error) = self.store.remove().await {
                            tracing::warn!(
                                error = &error as &dyn error::Error,
                                "unable to discard rejected session"
                            );
                        }
                        None
                    }
                    Err(error) => {
                        tracing::warn!(
                            error = &error as &dyn error::Error,
                            "session renewal failed again, giving up"
                        );
                        None
                    }
                }
            }
        }
    }

    async fn renew_if_stale(&self) -> Result<Option<Session>, RenewalError> {
        let freshness = {
            let _shared = self.lock.shared().await;
            self.evaluate().await
        };

        let Some(freshness) = freshness else {
            return Ok(None);
        };
        if !freshness.needs_refresh {
            return Ok(Some(freshness.session));
        }

        let _exclusive = self.lock.exclusive().await;

        // Double-checked: another caller may have renewed the session while
        // this one waited for the exclusive lock.
        let Some(freshness) = self.evaluate().await else {
            return Ok(None);
        };
        if !freshness.needs_refresh {
            tracing::debug!("session was renewed by a concurrent caller");
            return Ok(Some(freshness.session));
        }

        match self
            .client
            .exchange_refresh_token(&freshness.session.refresh_token)
            .await
        {
            Ok(renewed) => {
                if let Err(error) = self.store.set(&renewed).await {
                    tracing::warn!(
                        error = &error as &dyn error::Error,
                        "unable to persist renewed session"
                    );
                }
                Ok(Some(renewed))
            }
            Err(error) if !freshness.expired => {
                tracing::warn!(
                    error = &error as &dyn error::Error,
                    "renewal failed but the current token is still valid, continuing with it"
                );
                Ok(Some(freshness.session))
            }
            Err(error) => Err(error),
        }
    }

    async fn evaluate(&self) -> Option<Freshness> {
        let session = self.store.get().await?;
        let expiry = token_expiry(&session.access_token);
        let now = self.clock.now();
        Some(Freshness {
            needs_refresh: expiry.needs_refresh(now, self.margin),
            expired: expiry.is_expired(now),
            session,
        })
    }
}
