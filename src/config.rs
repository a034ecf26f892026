use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Console client settings. Unspecified fields in a config file fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PortalConfig {
    /// Base URL of the REST API, e.g. "http://127.0.0.1:8080"
    pub api_base_url: String,
    pub login_path: String,
    pub logout_path: String,
    /// Client-side route of the login screen
    pub login_route: String,
    /// Where denied navigations land when a rule has no redirectTo
    pub default_redirect: String,
    /// Roles that see the whole sidebar
    pub full_access_roles: Vec<String>,
    pub menu_allow_headings: Vec<String>,
    pub menu_allow_paths: Vec<String>,
    /// File backing the persisted session (token, userName, userRole)
    pub session_file: PathBuf,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            login_path: "/api/auth/login".to_string(),
            logout_path: "/api/auth/logout".to_string(),
            login_route: "/login".to_string(),
            default_redirect: "/".to_string(),
            full_access_roles: vec!["admin".into(), "manager".into(), "stackadmin".into(), "user".into()],
            menu_allow_headings: vec!["Payments".into(), "Expenses".into()],
            menu_allow_paths: vec!["/payments".into(), "/expenses".into()],
            session_file: PathBuf::from("portal_session.json"),
        }
    }
}

impl PortalConfig {
    /// Read a JSON config file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file '{}'", path.display()))?;
        let cfg: PortalConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file '{}'", path.display()))?;
        Ok(cfg)
    }

    /// Defaults, then the optional file, then PORTAL_* environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env_with(|k| std::env::var(k).ok());
        debug!(target: "portal_access::config", api = %cfg.api_base_url, session_file = %cfg.session_file.display(), "config loaded");
        Ok(cfg)
    }

    /// Overlay environment-style overrides using the provided lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PORTAL_API_URL") { self.api_base_url = v; }
        if let Some(v) = lookup("PORTAL_LOGIN_ROUTE") { self.login_route = v; }
        if let Some(v) = lookup("PORTAL_DEFAULT_REDIRECT") { self.default_redirect = v; }
        if let Some(v) = lookup("PORTAL_SESSION_FILE") { self.session_file = PathBuf::from(v); }
        if let Some(v) = lookup("PORTAL_FULL_ACCESS_ROLES") {
            self.full_access_roles = v
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
        }
    }
}
