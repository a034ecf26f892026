use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PortalConfig;

/// Sidebar entry. A node with `heading` set and no path is a section divider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MenuNode {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    pub fn link(title: &str, path: &str, icon: &str) -> Self {
        Self { title: title.into(), path: Some(path.into()), icon: Some(icon.into()), ..Default::default() }
    }

    pub fn heading(title: &str) -> Self {
        Self { title: title.into(), heading: Some(title.into()), ..Default::default() }
    }

    pub fn with_children(mut self, children: Vec<MenuNode>) -> Self {
        self.children = children;
        self
    }

    fn is_divider(&self) -> bool {
        self.heading.is_some() && self.path.is_none() && self.children.is_empty()
    }
}

/// Which roles see the whole menu, and what the restricted view keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuPolicy {
    pub full_access_roles: Vec<String>,
    pub allow_headings: Vec<String>,
    pub allow_paths: Vec<String>,
}

impl Default for MenuPolicy {
    fn default() -> Self { Self::from_config(&PortalConfig::default()) }
}

impl MenuPolicy {
    pub fn from_config(cfg: &PortalConfig) -> Self {
        Self {
            full_access_roles: cfg.full_access_roles.clone(),
            allow_headings: cfg.menu_allow_headings.clone(),
            allow_paths: cfg.menu_allow_paths.clone(),
        }
    }

    fn heading_allowed(&self, heading: &str) -> bool {
        self.allow_headings.iter().any(|h| h.eq_ignore_ascii_case(heading.trim()))
    }

    fn path_allowed(&self, path: &str) -> bool {
        self.allow_paths.iter().any(|p| {
            let p = p.trim_end_matches('/');
            path == p || path.strip_prefix(p).is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn node_allowed(&self, node: &MenuNode) -> bool {
        node.heading.as_deref().is_some_and(|h| self.heading_allowed(h))
            || node.path.as_deref().is_some_and(|p| self.path_allowed(p))
    }
}

/// Menu entries visible to `role`. The input tree is never modified.
///
/// No role and full-access roles get the whole tree. Every other role,
/// including unrecognized ones, gets only the payments/expenses subset.
pub fn filter_menu(tree: &[MenuNode], role: Option<&str>, policy: &MenuPolicy) -> Vec<MenuNode> {
    let Some(role) = role else { return tree.to_vec(); };
    if policy.full_access_roles.iter().any(|r| r == role) {
        return tree.to_vec();
    }
    let out = filter_level(tree, policy);
    debug!(target: "portal_access::menu", role = role, kept = out.len(), total = tree.len(), "restricted menu view");
    out
}

fn filter_level(nodes: &[MenuNode], policy: &MenuPolicy) -> Vec<MenuNode> {
    let mut out = Vec::new();
    // a divider opens a section covering the following siblings
    let mut in_allowed_section = false;
    for node in nodes {
        if node.is_divider() {
            in_allowed_section = policy.node_allowed(node);
            if in_allowed_section { out.push(node.clone()); }
            continue;
        }
        if in_allowed_section || policy.node_allowed(node) {
            out.push(node.clone());
            continue;
        }
        if !node.children.is_empty() {
            let kept = filter_level(&node.children, policy);
            if !kept.is_empty() {
                out.push(MenuNode { children: kept, ..node.clone() });
            }
        }
    }
    out
}

/// The console sidebar.
pub fn default_menu() -> Vec<MenuNode> {
    vec![
        MenuNode::heading("Dashboard"),
        MenuNode::link("Dashboard", "/dashboard", "home"),
        MenuNode::heading("CRM"),
        MenuNode::link("Leads", "/leads", "users"),
        MenuNode::link("Sales", "/sales", "shopping-cart"),
        MenuNode::heading("Payments"),
        MenuNode::link("Payments", "/payments", "credit-card"),
        MenuNode::heading("Expenses"),
        MenuNode::link("Expenses", "/expenses", "file-text"),
        MenuNode::heading("Administration"),
        MenuNode { title: "Users".into(), icon: Some("settings".into()), ..Default::default() }
            .with_children(vec![
                MenuNode::link("All users", "/users", "list"),
                MenuNode::link("Roles", "/users/roles", "shield"),
            ]),
    ]
}
