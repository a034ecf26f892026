//!
//! portal-access CLI
//! -----------------
//! Drives the console's session and access-control core against a persisted
//! session file: log in and out through the API, inspect the current
//! identity, check a route and print the sidebar visible to the session.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use portal_access::access::{default_menu, filter_menu, Location, MenuPolicy, Navigator, RouteTable};
use portal_access::client::ApiClient;
use portal_access::identity::{self, FileStore, RoleResolver, TokenStore};
use portal_access::PortalConfig;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--config <file>] [--routes <file>] <command>\n\nCommands:\n  login <user> <password>   authenticate against the API and store the session\n  logout                    end the session (API call, then local clear)\n  whoami                    show user name, role and token expiry\n  check <path>              run the route guards for <path> and print the navigation\n  menu                      print the sidebar visible to the current session\n\nEnvironment:\n  PORTAL_API_URL, PORTAL_LOGIN_ROUTE, PORTAL_DEFAULT_REDIRECT, PORTAL_SESSION_FILE,\n  PORTAL_FULL_ACCESS_ROLES (comma separated), RUST_LOG"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = std::env::args().collect();
    let program = args.remove(0);
    let mut config_path: Option<PathBuf> = None;
    let mut routes_path: Option<PathBuf> = None;
    let mut rest: Vec<String> = Vec::new();
    let mut it = args.into_iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--config" => config_path = Some(PathBuf::from(it.next().ok_or_else(|| anyhow!("--config needs a file"))?)),
            "--routes" => routes_path = Some(PathBuf::from(it.next().ok_or_else(|| anyhow!("--routes needs a file"))?)),
            "-h" | "--help" => { print_usage(&program); return Ok(()); }
            _ => rest.push(a),
        }
    }

    let cfg = PortalConfig::load(config_path.as_deref())?;
    info!(target: "portal_access", "portal-access starting: api='{}', session_file='{}'", cfg.api_base_url, cfg.session_file.display());
    let store = TokenStore::new(Arc::new(FileStore::new(&cfg.session_file)));

    let Some(cmd) = rest.first().cloned() else {
        print_usage(&program);
        return Err(anyhow!("missing command"));
    };
    match cmd.as_str() {
        "login" => {
            let (Some(user), Some(pass)) = (rest.get(1), rest.get(2)) else {
                return Err(anyhow!("usage: login <user> <password>"));
            };
            let api = ApiClient::new(&cfg)?;
            let resp = api.login(&store, user, pass).await?;
            println!("{}", serde_json::json!({"status": "ok", "userName": resp.user_name}));
        }
        "logout" => {
            ApiClient::new(&cfg)?.logout(&store).await?;
            println!("{}", serde_json::json!({"status": "ok"}));
        }
        "whoami" => {
            let role = RoleResolver::new(store.clone()).resolve_live(identity::now_ms());
            let exp = store.token().and_then(|t| identity::decode(&t).ok()).and_then(|c| c.exp());
            let expired = store
                .token()
                .and_then(|t| identity::decode(&t).ok())
                .map(|c| identity::is_expired(&c, identity::now_ms()));
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "userName": store.user_name(),
                    "role": role,
                    "exp": exp,
                    "expired": expired,
                }))?
            );
        }
        "check" => {
            let target = rest.get(1).ok_or_else(|| anyhow!("usage: check <path>"))?;
            let table = match routes_path.as_deref() {
                Some(p) => RouteTable::from_json(&std::fs::read_to_string(p)?)?,
                None => RouteTable::default_routes(),
            };
            let nav = Navigator::new(table, &cfg);
            let out = nav.navigate(&store, &Location::parse(target), identity::now_ms());
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        "menu" => {
            let role = RoleResolver::new(store.clone()).resolve_live(identity::now_ms());
            let menu = filter_menu(&default_menu(), role.as_deref(), &MenuPolicy::from_config(&cfg));
            println!("{}", serde_json::to_string_pretty(&menu)?);
        }
        other => {
            print_usage(&program);
            return Err(anyhow!("unknown command '{}'", other));
        }
    }
    Ok(())
}
