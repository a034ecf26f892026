use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::tprintln;

use super::store::KeyValueStore;

pub const KEY_TOKEN: &str = "token";
pub const KEY_USER_NAME: &str = "userName";
pub const KEY_USER_ROLE: &str = "userRole";

/// Why the cached role was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    Login,
    Logout,
    RoleCache,
}

type Hook = Arc<dyn Fn(Invalidation) + Send + Sync>;

/// Session state over a key-value store: bearer token, display name and the
/// best-effort role cache. Cloning shares the same store and hooks.
#[derive(Clone)]
pub struct TokenStore {
    kv: Arc<dyn KeyValueStore>,
    hooks: Arc<RwLock<Vec<Hook>>>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("has_token", &self.token().is_some())
            .field("hooks", &self.hooks.read().len())
            .finish()
    }
}

impl TokenStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv, hooks: Arc::new(RwLock::new(Vec::new())) }
    }

    pub fn token(&self) -> Option<String> { non_empty(self.kv.get(KEY_TOKEN)) }

    pub fn user_name(&self) -> Option<String> { non_empty(self.kv.get(KEY_USER_NAME)) }

    pub fn cached_role(&self) -> Option<String> { non_empty(self.kv.get(KEY_USER_ROLE)) }

    /// Store a freshly issued token; any role cached for a previous token is dropped.
    pub fn begin_session(&self, token: &str, user_name: &str) -> Result<()> {
        self.kv.remove(KEY_USER_ROLE)?;
        self.kv.set(KEY_TOKEN, token)?;
        self.kv.set(KEY_USER_NAME, user_name)?;
        tprintln!("session.begin user={}", user_name);
        debug!(target: "portal_access::session", user = user_name, "session started");
        self.notify(Invalidation::Login);
        Ok(())
    }

    /// Write the role cache. Failures are logged and otherwise ignored.
    pub fn cache_role(&self, role: &str) {
        if let Err(e) = self.kv.set(KEY_USER_ROLE, role) {
            warn!(target: "portal_access::session", error = %e, "failed to cache role");
        }
    }

    pub fn invalidate_role(&self) {
        if let Err(e) = self.kv.remove(KEY_USER_ROLE) {
            warn!(target: "portal_access::session", error = %e, "failed to drop cached role");
        }
        self.notify(Invalidation::RoleCache);
    }

    /// Logout: remove cached role, token and name. Every removal is attempted;
    /// the first failure is returned.
    pub fn clear(&self) -> Result<()> {
        let user = self.user_name();
        let mut first_err = None;
        for key in [KEY_USER_ROLE, KEY_TOKEN, KEY_USER_NAME] {
            if let Err(e) = self.kv.remove(key) {
                warn!(target: "portal_access::session", key = key, error = %e, "failed to clear session key");
                first_err.get_or_insert(e);
            }
        }
        if let Some(e) = first_err {
            self.notify(Invalidation::Logout);
            return Err(e);
        }
        tprintln!("session.clear user={}", user.as_deref().unwrap_or("-"));
        debug!(target: "portal_access::session", user = user.as_deref().unwrap_or("-"), "session cleared");
        self.notify(Invalidation::Logout);
        Ok(())
    }

    /// Register a callback fired whenever the role cache is invalidated.
    pub fn on_invalidate<F>(&self, hook: F)
    where
        F: Fn(Invalidation) + Send + Sync + 'static,
    {
        self.hooks.write().push(Arc::new(hook));
    }

    // Hooks run outside the lock so they may register further hooks.
    fn notify(&self, why: Invalidation) {
        let hooks: Vec<Hook> = self.hooks.read().clone();
        for h in hooks.iter() {
            h(why);
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryStore;

    fn store() -> TokenStore { TokenStore::new(Arc::new(MemoryStore::new())) }

    #[test]
    fn begin_session_drops_stale_role() -> Result<()> {
        let ts = store();
        ts.begin_session("tok-a", "Ada")?;
        ts.cache_role("admin");
        assert_eq!(ts.cached_role().as_deref(), Some("admin"));

        ts.begin_session("tok-b", "Bo")?;
        assert_eq!(ts.token().as_deref(), Some("tok-b"));
        assert_eq!(ts.user_name().as_deref(), Some("Bo"));
        assert!(ts.cached_role().is_none());
        Ok(())
    }

    #[test]
    fn clear_removes_everything_and_fires_hook() -> Result<()> {
        let ts = store();
        let seen: Arc<RwLock<Vec<Invalidation>>> = Arc::new(RwLock::new(Vec::new()));
        let sink = seen.clone();
        ts.on_invalidate(move |why| sink.write().push(why));

        ts.begin_session("tok", "Ada")?;
        ts.cache_role("user");
        ts.invalidate_role();
        ts.clear()?;

        assert!(ts.token().is_none());
        assert!(ts.user_name().is_none());
        assert!(ts.cached_role().is_none());
        assert_eq!(*seen.read(), vec![Invalidation::Login, Invalidation::RoleCache, Invalidation::Logout]);
        Ok(())
    }

    #[test]
    fn empty_values_read_as_absent() -> Result<()> {
        let kv = Arc::new(MemoryStore::new());
        kv.set(KEY_TOKEN, "")?;
        kv.set(KEY_USER_ROLE, "")?;
        let ts = TokenStore::new(kv);
        assert!(ts.token().is_none());
        assert!(ts.cached_role().is_none());
        Ok(())
    }

    struct FailingRemove {
        inner: MemoryStore,
        fail_on: &'static str,
    }

    impl KeyValueStore for FailingRemove {
        fn get(&self, key: &str) -> Option<String> { self.inner.get(key) }
        fn set(&self, key: &str, value: &str) -> Result<()> { self.inner.set(key, value) }
        fn remove(&self, key: &str) -> Result<()> {
            if key == self.fail_on {
                anyhow::bail!("disk full");
            }
            self.inner.remove(key)
        }
    }

    #[test]
    fn clear_attempts_every_key_when_one_fails() -> Result<()> {
        let kv = Arc::new(FailingRemove { inner: MemoryStore::new(), fail_on: KEY_TOKEN });
        let ts = TokenStore::new(kv.clone());
        kv.inner.set(KEY_TOKEN, "tok")?;
        kv.inner.set(KEY_USER_NAME, "Ada")?;
        kv.inner.set(KEY_USER_ROLE, "admin")?;

        assert!(ts.clear().is_err());
        assert!(ts.cached_role().is_none());
        assert!(ts.user_name().is_none());
        assert_eq!(ts.token().as_deref(), Some("tok"));
        Ok(())
    }

    #[test]
    fn hook_may_register_another_hook() -> Result<()> {
        let ts = store();
        let count = Arc::new(RwLock::new(0usize));
        let (inner_ts, inner_count) = (ts.clone(), count.clone());
        ts.on_invalidate(move |_| {
            let c = inner_count.clone();
            inner_ts.on_invalidate(move |_| *c.write() += 1);
        });
        ts.begin_session("tok", "Ada")?;
        ts.clear()?;
        // the hook added during login fires on logout
        assert_eq!(*count.read(), 1);
        Ok(())
    }
}
