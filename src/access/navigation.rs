//! Declarative route table and the navigator that runs guards for a location.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PortalConfig;
use crate::identity::TokenStore;

use super::guard::{GuardOutcome, Location, RouteGuard};
use super::policy::AccessRule;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    /// No guard (login screen, public pages)
    Public,
    #[default]
    Plain,
    AllowBlock,
    Children,
}

/// Authored route configuration. Child paths are relative to their parent
/// unless they start with '/'. Segments starting with ':' match any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub path: String,
    #[serde(default)]
    pub guard: GuardKind,
    #[serde(flatten)]
    pub rule: AccessRule,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RouteEntry>,
}

impl RouteEntry {
    pub fn new(path: &str, guard: GuardKind, rule: AccessRule) -> Self {
        Self { path: path.into(), guard, rule, children: Vec::new() }
    }

    pub fn with_children(mut self, children: Vec<RouteEntry>) -> Self {
        self.children = children;
        self
    }

    fn route_guard(&self, default_redirect: &str) -> Option<RouteGuard> {
        let g = match self.guard {
            GuardKind::Public => return None,
            GuardKind::Plain => RouteGuard::plain(),
            GuardKind::AllowBlock => RouteGuard::allow_block(self.rule.clone()),
            GuardKind::Children => RouteGuard::children(self.rule.clone()),
        };
        Some(g.with_default_redirect(default_redirect))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub routes: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The console's routes.
    pub fn default_routes() -> Self {
        use GuardKind::*;
        let no_payadmin = || AccessRule::block(["payadmin"]);
        Self {
            routes: vec![
                RouteEntry::new("/login", Public, AccessRule::default()),
                RouteEntry::new("/", Plain, AccessRule::default()),
                RouteEntry::new("/dashboard", AllowBlock, no_payadmin()),
                RouteEntry::new("/leads", AllowBlock, no_payadmin())
                    .with_children(vec![RouteEntry::new(":id", Plain, AccessRule::default())]),
                RouteEntry::new("/sales", AllowBlock, no_payadmin())
                    .with_children(vec![RouteEntry::new(":id", Plain, AccessRule::default())]),
                RouteEntry::new("/payments", AllowBlock, AccessRule::default()),
                RouteEntry::new("/expenses", AllowBlock, AccessRule::default()),
                RouteEntry::new("/users", Children, AccessRule::allow(["admin", "stackadmin"]).redirect_to("/dashboard"))
                    .with_children(vec![RouteEntry::new("roles", Plain, AccessRule::default())]),
            ],
        }
    }

    /// Entries from the outermost to the deepest route matching `pathname`.
    pub fn resolve(&self, pathname: &str) -> Option<Vec<&RouteEntry>> {
        let target = segments(pathname);
        self.routes.iter().find_map(|r| resolve_in(r, &[], &target))
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn resolve_in<'a>(entry: &'a RouteEntry, parent: &[&'a str], target: &[&str]) -> Option<Vec<&'a RouteEntry>> {
    let mut full: Vec<&'a str> = if entry.path.starts_with('/') { Vec::new() } else { parent.to_vec() };
    full.extend(segments(&entry.path));

    if full.len() > target.len() || !full.iter().zip(target).all(|(p, t)| p.starts_with(':') || p == t) {
        return None;
    }
    for child in entry.children.iter() {
        if let Some(mut chain) = resolve_in(child, &full, target) {
            chain.insert(0, entry);
            return Some(chain);
        }
    }
    if full.len() == target.len() { Some(vec![entry]) } else { None }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Navigation {
    Render { path: String },
    Redirect { to: String },
    Login { url: String, from: Location },
    NotFound,
}

/// Runs the guards of every matched route, outermost first.
#[derive(Debug, Clone)]
pub struct Navigator {
    pub table: RouteTable,
    pub login_route: String,
    pub default_redirect: String,
}

impl Navigator {
    pub fn new(table: RouteTable, cfg: &PortalConfig) -> Self {
        Self { table, login_route: cfg.login_route.clone(), default_redirect: cfg.default_redirect.clone() }
    }

    pub fn navigate(&self, store: &TokenStore, location: &Location, now_ms: i64) -> Navigation {
        let Some(chain) = self.table.resolve(&location.pathname) else {
            debug!(target: "portal_access::guard", path = %location.pathname, "no route");
            return Navigation::NotFound;
        };
        for entry in chain.iter() {
            let Some(guard) = entry.route_guard(&self.default_redirect) else { continue; };
            let outcome = guard.check::<()>(store, location, None, now_ms);
            outcome.apply_session_effects(store);
            match outcome {
                GuardOutcome::RenderOutlet | GuardOutcome::RenderChildren(_) => {}
                GuardOutcome::RedirectToLogin { from, .. } => {
                    info!(target: "portal_access::guard", path = %location.pathname, "redirecting to login");
                    return Navigation::Login { url: self.login_url(&from), from };
                }
                GuardOutcome::Redirect { to } => {
                    info!(target: "portal_access::guard", path = %location.pathname, to = %to, "access denied; redirecting");
                    return Navigation::Redirect { to };
                }
            }
        }
        Navigation::Render { path: location.pathname.clone() }
    }

    /// Login route with the originating location attached as `from`.
    pub fn login_url(&self, from: &Location) -> String {
        format!("{}?from={}", self.login_route, urlencoding::encode(&from.return_path()))
    }

    /// Where to go once login succeeds: the carried location when it is a
    /// local path other than the login screen, else the default redirect.
    pub fn after_login(&self, from: Option<&str>) -> String {
        match from {
            Some(f) if is_local_path(f) && Location::parse(f).pathname != self.login_route => f.to_string(),
            _ => self.default_redirect.clone(),
        }
    }

    /// `after_login` for the `from` parameter of a login URL query ("?from=...").
    pub fn return_target(&self, search: &str) -> String {
        let from = search
            .trim_start_matches('?')
            .split('&')
            .find_map(|kv| kv.strip_prefix("from="))
            .and_then(|v| urlencoding::decode(v).ok())
            .map(|v| v.into_owned());
        self.after_login(from.as_deref())
    }
}

/// A same-origin path: one leading '/', not followed by '/' or '\'.
/// Browsers treat '\' as '/', so it is refused anywhere, as are control characters.
fn is_local_path(target: &str) -> bool {
    let mut chars = target.chars();
    chars.next() == Some('/')
        && !matches!(chars.next(), Some('/') | Some('\\'))
        && !target.chars().any(|c| c == '\\' || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_paths(t: &RouteTable, p: &str) -> Option<Vec<String>> {
        t.resolve(p).map(|c| c.iter().map(|e| e.path.clone()).collect())
    }

    #[test]
    fn resolves_nested_and_param_routes() {
        let t = RouteTable::default_routes();
        assert_eq!(chain_paths(&t, "/"), Some(vec!["/".to_string()]));
        assert_eq!(chain_paths(&t, "/sales"), Some(vec!["/sales".to_string()]));
        assert_eq!(chain_paths(&t, "/sales/17/"), Some(vec!["/sales".to_string(), ":id".to_string()]));
        assert_eq!(chain_paths(&t, "/users/roles"), Some(vec!["/users".to_string(), "roles".to_string()]));
        assert_eq!(chain_paths(&t, "/sales/17/edit"), None);
        assert_eq!(chain_paths(&t, "/nowhere"), None);
    }

    #[test]
    fn table_round_trips_through_camel_case_json() -> anyhow::Result<()> {
        let json = r#"{"routes":[{"path":"/reports","guard":"allow_block","allowedRoles":["admin"],"redirectTo":"/payments"}]}"#;
        let t = RouteTable::from_json(json)?;
        let r = &t.routes[0];
        assert_eq!(r.guard, GuardKind::AllowBlock);
        assert_eq!(r.rule, AccessRule::allow(["admin"]).redirect_to("/payments"));
        let back = serde_json::to_value(&t)?;
        assert_eq!(back["routes"][0]["allowedRoles"][0], "admin");
        Ok(())
    }

    #[test]
    fn missing_guard_defaults_to_plain() -> anyhow::Result<()> {
        let t = RouteTable::from_json(r#"{"routes":[{"path":"/x"}]}"#)?;
        assert_eq!(t.routes[0].guard, GuardKind::Plain);
        assert!(t.routes[0].rule.is_unconfigured());
        Ok(())
    }

    #[test]
    fn login_url_and_return_target() {
        let nav = Navigator::new(RouteTable::default_routes(), &PortalConfig::default());
        let from = Location::parse("/sales?page=2");
        let url = nav.login_url(&from);
        assert_eq!(url, "/login?from=%2Fsales%3Fpage%3D2");
        let search = &url["/login".len()..];
        assert_eq!(nav.return_target(search), "/sales?page=2");
        assert_eq!(nav.return_target(""), "/");
    }

    #[test]
    fn after_login_rejects_foreign_and_login_targets() {
        let nav = Navigator::new(RouteTable::default_routes(), &PortalConfig::default());
        assert_eq!(nav.after_login(Some("/leads")), "/leads");
        assert_eq!(nav.after_login(Some("//evil.example")), "/");
        assert_eq!(nav.after_login(Some("https://evil.example")), "/");
        assert_eq!(nav.after_login(Some("/login?from=%2F")), "/");
        assert_eq!(nav.after_login(None), "/");
        assert_eq!(nav.after_login(Some("/\\evil.example")), "/");
        assert_eq!(nav.after_login(Some("/leads\\..\\evil")), "/");
        assert_eq!(nav.after_login(Some("/\tevil.example")), "/");
        assert_eq!(nav.return_target("?from=%2F%5Cevil.example"), "/");
        assert_eq!(nav.return_target("?from=%2F%2Fevil.example"), "/");
        assert_eq!(nav.return_target("?from=%2Fpayments%0A"), "/");
        assert_eq!(nav.return_target("?from=%2Fpayments"), "/payments");
    }
}
