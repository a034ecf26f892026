use serde_json::Value;
use tracing::debug;

use super::claims::{self, DecodedClaims};
use super::token_store::TokenStore;

/// Claim names probed for a role, highest priority first. Issuers disagree on
/// the claim name; when a token carries several, the earliest listed wins.
pub const ROLE_CLAIM_KEYS: [&str; 7] = [
    "role",
    "Role",
    "user_role",
    "UserRole",
    "http://schemas.microsoft.com/ws/2008/06/identity/claims/role",
    "sub",
    "unique_name",
];

/// First present, non-empty role-like claim in `ROLE_CLAIM_KEYS` order.
pub fn resolve_role(claims: &DecodedClaims) -> Option<String> {
    ROLE_CLAIM_KEYS
        .iter()
        .find_map(|k| claims.get(k).and_then(claim_text))
}

fn claim_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        // multi-valued role claims: first usable entry
        Value::Array(items) => items.iter().find_map(|i| match i {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }),
        _ => None,
    }
}

/// Cache-aside role lookup over the session's `userRole` key.
#[derive(Debug, Clone)]
pub struct RoleResolver {
    store: TokenStore,
}

impl RoleResolver {
    pub fn new(store: TokenStore) -> Self { Self { store } }

    /// Cached role if present; otherwise resolve from `claims` and cache the result.
    pub fn resolve(&self, claims: &DecodedClaims) -> Option<String> {
        if let Some(role) = self.store.cached_role() {
            return Some(role);
        }
        let role = resolve_role(claims)?;
        debug!(target: "portal_access::session", role = %role, "role resolved from token claims");
        self.store.cache_role(&role);
        Some(role)
    }

    /// Role of the stored session, decoding the token only on a cache miss.
    /// No token or an undecodable token yields `None`; a cached role never
    /// outlives the token it was read from.
    pub fn resolve_session(&self) -> Option<String> {
        let token = self.store.token()?;
        if let Some(role) = self.store.cached_role() {
            return Some(role);
        }
        match claims::decode(&token) {
            Ok(c) => self.resolve(&c),
            Err(e) => {
                debug!(target: "portal_access::session", error = %e, "stored token could not be decoded");
                None
            }
        }
    }

    /// `resolve_session` restricted to an unexpired token.
    pub fn resolve_live(&self, now_ms: i64) -> Option<String> {
        let token = self.store.token()?;
        match claims::decode(&token) {
            Ok(c) if !claims::is_expired(&c, now_ms) => self.resolve(&c),
            Ok(_) => {
                debug!(target: "portal_access::session", "stored token has expired");
                None
            }
            Err(_) => None,
        }
    }
}
