//! A cookie-backed session store
//!
//! The session is serialized into a single same-site cookie so a client
//! context and a server-rendering context can read the same session. The
//! store builds complete `Set-Cookie` strings; how those strings reach the
//! outside world — a response header, a browser bridge, or nothing more
//! than process memory — is the concern of the [`CookieJar`] it writes to.

use std::{collections::HashMap, error, fmt, sync::RwLock};

use aliri_clock::DurationSecs;
use async_trait::async_trait;

use super::{SessionStore, StoreError};
use crate::Session;

/// The default name of the session cookie
pub const DEFAULT_SESSION_COOKIE: &str = "hawserSession";

/// The default lifetime of the session cookie: 30 days
const DEFAULT_MAX_AGE: DurationSecs = DurationSecs(30 * 24 * 60 * 60);

/// The `SameSite` policy applied to the session cookie
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    /// The cookie is only sent on same-site requests
    Strict,
    /// The cookie is also sent on top-level cross-site navigation
    Lax,
    /// The cookie is sent on all requests (requires `Secure`)
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// The channel through which cookie writes and reads reach their medium
///
/// `read` returns the raw (still URL-encoded) value of the named cookie;
/// `write` applies a complete `Set-Cookie` string, honoring removal
/// semantics (`Max-Age=0`).
pub trait CookieJar: Send + Sync {
    /// Reads the raw value of the named cookie
    fn read(&self, name: &str) -> Option<String>;

    /// Applies a `Set-Cookie` string to the medium
    fn write(&self, set_cookie: &str);
}

impl<J: CookieJar + ?Sized> CookieJar for std::sync::Arc<J> {
    fn read(&self, name: &str) -> Option<String> {
        (**self).read(name)
    }

    fn write(&self, set_cookie: &str) {
        (**self).write(set_cookie)
    }
}

/// A session store that serializes the session into a same-site cookie
///
/// `set` overwrites the cookie wholesale; `remove` expires it immediately.
/// The cookie value is the URL-encoded JSON serialization of the session,
/// with `Path=/`, a configurable lifetime (default 30 days), and
/// configurable `Secure` (default on) and `SameSite` (default `Lax`)
/// attributes.
#[derive(Debug)]
pub struct CookieStore<J> {
    jar: J,
    name: String,
    max_age: DurationSecs,
    secure: bool,
    same_site: SameSite,
}

impl<J: CookieJar> CookieStore<J> {
    /// Constructs a cookie store with the default attributes
    pub fn new(jar: J) -> Self {
        Self {
            jar,
            name: DEFAULT_SESSION_COOKIE.to_owned(),
            max_age: DEFAULT_MAX_AGE,
            secure: true,
            same_site: SameSite::Lax,
        }
    }

    /// Uses a custom cookie name
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Uses a custom cookie lifetime
    pub fn with_max_age(mut self, max_age: DurationSecs) -> Self {
        self.max_age = max_age;
        self
    }

    /// Controls the `Secure` attribute
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Uses a custom `SameSite` policy
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    fn set_cookie(&self, serialized: &str) -> String {
        let mut cookie = format!(
            "{}={}; Max-Age={}; Path=/",
            self.name,
            urlencoding::encode(serialized),
            self.max_age.0
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(self.same_site.as_str());
        cookie
    }

    fn clear_cookie(&self) -> String {
        let mut cookie = format!(
            "{}=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; Path=/",
            self.name
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(self.same_site.as_str());
        cookie
    }

    fn heal(&self, error: &(dyn error::Error + 'static)) {
        tracing::warn!(
            error,
            cookie = %self.name,
            "session cookie is corrupt, expiring it"
        );
        self.jar.write(&self.clear_cookie());
    }
}

#[async_trait]
impl<J: CookieJar + fmt::Debug> SessionStore for CookieStore<J> {
    async fn get(&self) -> Option<Session> {
        let raw = self.jar.read(&self.name)?;
        let decoded = match urlencoding::decode(&raw) {
            Ok(decoded) => decoded,
            Err(error) => {
                self.heal(&error);
                return None;
            }
        };
        match serde_json::from_str(&decoded) {
            Ok(session) => Some(session),
            Err(error) => {
                self.heal(&error);
                None
            }
        }
    }

    async fn set(&self, session: &Session) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(session)?;
        self.jar.write(&self.set_cookie(&serialized));
        Ok(())
    }

    async fn remove(&self) -> Result<(), StoreError> {
        self.jar.write(&self.clear_cookie());
        Ok(())
    }
}

/// An in-process cookie jar
///
/// Stands in for the ambient cookie channel in server contexts and tests.
/// Understands just enough of the `Set-Cookie` grammar to honor writes
/// produced by [`CookieStore`]: the leading `name=value` pair and the
/// `Max-Age=0` removal convention.
#[derive(Debug, Default)]
pub struct MemoryJar {
    cookies: RwLock<HashMap<String, String>>,
}

impl MemoryJar {
    /// Constructs a new, empty jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a raw cookie value directly, bypassing `Set-Cookie` parsing
    ///
    /// Useful for seeding a jar from an incoming `Cookie` request header or
    /// for tests.
    pub fn insert_raw(&self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.into(), value.into());
    }
}

impl CookieJar for MemoryJar {
    fn read(&self, name: &str) -> Option<String> {
        self.cookies
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    fn write(&self, set_cookie: &str) {
        let pair = set_cookie.split(';').next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        let removal = set_cookie
            .split(';')
            .any(|attr| attr.trim().eq_ignore_ascii_case("Max-Age=0"));

        let mut cookies = self
            .cookies
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if removal {
            cookies.remove(name);
        } else {
            cookies.insert(name.to_owned(), value.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::sample_session;

    #[tokio::test]
    async fn round_trips_a_session() {
        let store = CookieStore::new(MemoryJar::new());
        assert_eq!(store.get().await, None);

        let session = sample_session("access", "refresh");
        store.set(&session).await.unwrap();
        assert_eq!(store.get().await, Some(session));
    }

    #[tokio::test]
    async fn remove_expires_the_cookie() {
        let jar = Arc::new(MemoryJar::new());
        let store = CookieStore::new(Arc::clone(&jar));
        store
            .set(&sample_session("access", "refresh"))
            .await
            .unwrap();
        store.remove().await.unwrap();
        assert_eq!(store.get().await, None);
        assert_eq!(jar.read(DEFAULT_SESSION_COOKIE), None);
    }

    #[tokio::test]
    async fn corrupt_cookie_self_heals() {
        let jar = Arc::new(MemoryJar::new());
        jar.insert_raw(DEFAULT_SESSION_COOKIE, "%7Bnot-json");

        let store = CookieStore::new(Arc::clone(&jar));
        assert_eq!(store.get().await, None);
        assert_eq!(store.get().await, None);
        assert_eq!(jar.read(DEFAULT_SESSION_COOKIE), None);
    }

    #[test]
    fn set_cookie_carries_the_configured_attributes() {
        let store = CookieStore::new(MemoryJar::new())
            .with_cookie_name("appSession")
            .with_max_age(DurationSecs(3600))
            .with_secure(false)
            .with_same_site(SameSite::Strict);
        let cookie = store.set_cookie("{\"k\":\"v\"}");
        assert_eq!(
            cookie,
            "appSession=%7B%22k%22%3A%22v%22%7D; Max-Age=3600; Path=/; SameSite=Strict"
        );
    }

    #[test]
    fn default_set_cookie_is_secure_and_lax() {
        let store = CookieStore::new(MemoryJar::new());
        let cookie = store.set_cookie("{}");
        assert!(cookie.starts_with("hawserSession=%7B%7D; Max-Age=2592000; Path=/"));
        assert!(cookie.contains("; Secure"));
        assert!(cookie.ends_with("; SameSite=Lax"));
    }
}
