use serde::{Deserialize, Serialize};

/// Allow/block lists attached to a route or menu entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub blocked_roles: Vec<String>,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

impl AccessRule {
    pub fn allow<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { allowed_roles: roles.into_iter().map(Into::into).collect(), ..Default::default() }
    }

    pub fn block<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { blocked_roles: roles.into_iter().map(Into::into).collect(), ..Default::default() }
    }

    pub fn redirect_to<S: Into<String>>(mut self, to: S) -> Self {
        self.redirect_to = Some(to.into());
        self
    }

    /// Neither list names a role.
    pub fn is_unconfigured(&self) -> bool {
        self.allowed_roles.is_empty() && self.blocked_roles.is_empty()
    }

    fn redirect_or<'a>(&'a self, default_redirect: &'a str) -> &'a str {
        self.redirect_to.as_deref().filter(|s| !s.is_empty()).unwrap_or(default_redirect)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "to", rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    DenyToLogin,
    DenyRedirect(String),
}

impl Verdict {
    pub fn is_allow(&self) -> bool { matches!(self, Verdict::Allow) }
}

/// Decide access for `role` under `rule`. Order matters: block is checked
/// before allow so an open rule can still carve out a single role.
pub fn evaluate(role: Option<&str>, rule: &AccessRule, default_redirect: &str) -> Verdict {
    let Some(role) = role else { return Verdict::DenyToLogin; };
    if rule.blocked_roles.iter().any(|r| r == role) {
        return Verdict::DenyRedirect(rule.redirect_or(default_redirect).to_string());
    }
    if rule.allowed_roles.is_empty() {
        return Verdict::Allow;
    }
    if rule.allowed_roles.iter().any(|r| r == role) {
        return Verdict::Allow;
    }
    Verdict::DenyRedirect(rule.redirect_or(default_redirect).to_string())
}
