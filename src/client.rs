//! REST collaborator: login/logout and authorized reads against the console API.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::PortalConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{self, TokenStore};

#[derive(Debug, Clone, Deserialize)]
struct LoginReply {
    #[serde(default)]
    token: Option<String>,
    #[serde(default, alias = "name", alias = "user_name")]
    #[serde(rename = "userName")]
    user_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub token: String,
    pub user_name: String,
}

#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    login_path: String,
    logout_path: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(cfg: &PortalConfig) -> AppResult<Self> {
        let mut base = Url::parse(&cfg.api_base_url)
            .map_err(|e| AppError::config("invalid_api_url", format!("{}: {}", cfg.api_base_url, e)))?;
        // a path prefix on the base ("https://host/backend") is kept by every request
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base, login_path: cfg.login_path.clone(), logout_path: cfg.logout_path.clone(), client })
    }

    pub fn base(&self) -> &Url { &self.base }

    fn url(&self, path: &str) -> AppResult<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| AppError::config("invalid_api_path", format!("{}: {}", path, e)))
    }

    fn bearer(token: &str) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| AppError::malformed_token("malformed_token", "token is not a valid header value"))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// POST credentials; on success the token and display name start a new session.
    pub async fn login(&self, store: &TokenStore, username: &str, password: &str) -> AppResult<LoginResponse> {
        let resp = self
            .client
            .post(self.url(&self.login_path)?)
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            warn!(target: "portal_access::client", user = username, status = %status, "login rejected");
            return Err(AppError::auth("invalid_credentials", format!("login failed: HTTP {}", status)));
        }
        let reply: LoginReply = resp
            .json()
            .await
            .map_err(|e| AppError::auth("bad_login_reply", e.to_string()))?;
        let Some(token) = reply.token.filter(|t| !t.is_empty()) else {
            return Err(AppError::auth("missing_token", "login reply carried no token"));
        };
        // refuse to persist a token the guards could never read
        identity::decode(&token)?;
        let user_name = reply.user_name.filter(|n| !n.is_empty()).unwrap_or_else(|| username.to_string());
        store
            .begin_session(&token, &user_name)
            .map_err(|e| AppError::storage("session_write_failed", e.to_string()))?;
        info!(target: "portal_access::client", user = %user_name, "logged in");
        Ok(LoginResponse { token, user_name })
    }

    /// Tell the API the session ends, then clear the store regardless of the outcome.
    pub async fn logout(&self, store: &TokenStore) -> AppResult<()> {
        if let Some(token) = store.token() {
            let sent = match (self.url(&self.logout_path), Self::bearer(&token)) {
                (Ok(url), Ok(headers)) => self.client.post(url).headers(headers).send().await.map_err(AppError::from),
                (Err(e), _) | (_, Err(e)) => Err(e),
            };
            match sent {
                Ok(r) if !r.status().is_success() => {
                    warn!(target: "portal_access::client", status = %r.status(), "logout call rejected; clearing locally")
                }
                Err(e) => warn!(target: "portal_access::client", error = %e, "logout call failed; clearing locally"),
                Ok(_) => {}
            }
        }
        store
            .clear()
            .map_err(|e| AppError::storage("session_clear_failed", e.to_string()))?;
        info!(target: "portal_access::client", "logged out");
        Ok(())
    }

    /// Authorized GET. A 401 ends the local session.
    pub async fn get_json(&self, store: &TokenStore, path: &str) -> AppResult<serde_json::Value> {
        let Some(token) = store.token() else {
            return Err(AppError::unauthorized("no_session", "not logged in"));
        };
        let resp = self.client.get(self.url(path)?).headers(Self::bearer(&token)?).send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(target: "portal_access::client", path = path, "API rejected the session; clearing it");
            if let Err(e) = store.clear() {
                warn!(target: "portal_access::client", error = %e, "failed to clear rejected session");
            }
            return Err(AppError::unauthorized("session_rejected", "API returned 401"));
        }
        if !status.is_success() {
            return Err(AppError::transport("http_error", format!("GET {} failed: HTTP {}", path, status)));
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        let cfg = PortalConfig { api_base_url: base.into(), ..PortalConfig::default() };
        ApiClient::new(&cfg).unwrap()
    }

    #[test]
    fn api_paths_keep_the_base_prefix() {
        let c = client("https://host.example/backend");
        assert_eq!(c.url("/api/auth/login").unwrap().as_str(), "https://host.example/backend/api/auth/login");
        let c = client("https://host.example/backend/");
        assert_eq!(c.url("api/payments").unwrap().as_str(), "https://host.example/backend/api/payments");
    }

    #[test]
    fn bare_host_base() {
        let c = client("http://127.0.0.1:8080");
        assert_eq!(c.url("/api/auth/logout").unwrap().as_str(), "http://127.0.0.1:8080/api/auth/logout");
    }
}
