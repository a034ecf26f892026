//! Route guards: one parameterized guard reproducing the plain, allow/block
//! and children-based call sites. This is the error boundary of the access
//! core; token problems never escape it, they become login redirects.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::identity::{self, RoleResolver, TokenStore};

use super::policy::{self, AccessRule, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardMode {
    /// Any authenticated session passes.
    Plain,
    /// Full allow/block evaluation.
    AllowBlock,
    /// Allow/block evaluation; renders explicit children when given, and a
    /// rule with no roles at all never locks out an authenticated session.
    Children,
}

/// The location a navigation started from, carried through the login redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub pathname: String,
    #[serde(default)]
    pub search: String,
}

impl Location {
    /// Split "/path?query" into pathname and search ("?query").
    pub fn parse(target: &str) -> Self {
        match target.find('?') {
            Some(i) => Self { pathname: target[..i].to_string(), search: target[i..].to_string() },
            None => Self { pathname: target.to_string(), search: String::new() },
        }
    }

    pub fn return_path(&self) -> String {
        format!("{}{}", self.pathname, self.search)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome<C> {
    RenderOutlet,
    RenderChildren(C),
    RedirectToLogin { from: Location, clear_session: bool },
    Redirect { to: String },
}

impl<C> GuardOutcome<C> {
    pub fn is_render(&self) -> bool {
        matches!(self, GuardOutcome::RenderOutlet | GuardOutcome::RenderChildren(_))
    }

    /// Logout semantics for expired or unreadable tokens: clear the store
    /// before the redirect is followed.
    pub fn apply_session_effects(&self, store: &TokenStore) {
        if let GuardOutcome::RedirectToLogin { clear_session: true, .. } = self {
            if let Err(e) = store.clear() {
                warn!(target: "portal_access::guard", error = %e, "failed to clear session after token rejection");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    pub mode: GuardMode,
    pub rule: AccessRule,
    pub default_redirect: String,
}

impl RouteGuard {
    pub fn plain() -> Self {
        Self { mode: GuardMode::Plain, rule: AccessRule::default(), default_redirect: "/".into() }
    }

    pub fn allow_block(rule: AccessRule) -> Self {
        Self { mode: GuardMode::AllowBlock, rule, default_redirect: "/".into() }
    }

    pub fn children(rule: AccessRule) -> Self {
        Self { mode: GuardMode::Children, rule, default_redirect: "/".into() }
    }

    pub fn with_default_redirect<S: Into<String>>(mut self, to: S) -> Self {
        self.default_redirect = to.into();
        self
    }

    /// Evaluate the guard for the current session at `now_ms`.
    pub fn check<C>(&self, store: &TokenStore, location: &Location, children: Option<C>, now_ms: i64) -> GuardOutcome<C> {
        let to_login = |clear_session: bool| GuardOutcome::RedirectToLogin { from: location.clone(), clear_session };

        let Some(token) = store.token() else {
            debug!(target: "portal_access::guard", path = %location.pathname, "no session token");
            return to_login(false);
        };
        let claims = match identity::decode(&token) {
            Ok(c) => c,
            Err(e) => {
                debug!(target: "portal_access::guard", path = %location.pathname, error = %e, "session token rejected");
                return to_login(true);
            }
        };
        if identity::is_expired(&claims, now_ms) {
            debug!(target: "portal_access::guard", path = %location.pathname, "session token expired");
            return to_login(true);
        }

        if self.mode == GuardMode::Plain {
            return GuardOutcome::RenderOutlet;
        }

        let role = RoleResolver::new(store.clone()).resolve(&claims);
        let verdict = if self.mode == GuardMode::Children && self.rule.is_unconfigured() {
            Verdict::Allow
        } else {
            policy::evaluate(role.as_deref(), &self.rule, &self.default_redirect)
        };
        debug!(target: "portal_access::guard", path = %location.pathname, role = role.as_deref().unwrap_or("-"), mode = ?self.mode, verdict = ?verdict, "guard evaluated");

        match verdict {
            Verdict::Allow => match (self.mode, children) {
                (GuardMode::Children, Some(c)) => GuardOutcome::RenderChildren(c),
                _ => GuardOutcome::RenderOutlet,
            },
            Verdict::DenyToLogin => to_login(false),
            Verdict::DenyRedirect(to) => GuardOutcome::Redirect { to },
        }
    }

    /// `check` against the wall clock, with session effects applied.
    pub fn check_now<C>(&self, store: &TokenStore, location: &Location, children: Option<C>) -> GuardOutcome<C> {
        let out = self.check(store, location, children, identity::now_ms());
        out.apply_session_effects(store);
        out
    }
}
