//! Unified application error model.
//! The guard path never returns these; they surface from the login client,
//! session persistence and configuration loading.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Auth { code: String, message: String },
    Unauthorized { code: String, message: String },
    MalformedToken { code: String, message: String },
    Config { code: String, message: String },
    Storage { code: String, message: String },
    Transport { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Auth { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::MalformedToken { code, .. }
            | AppError::Config { code, .. }
            | AppError::Storage { code, .. }
            | AppError::Transport { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Auth { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::MalformedToken { message, .. }
            | AppError::Config { message, .. }
            | AppError::Storage { message, .. }
            | AppError::Transport { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn auth<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn unauthorized<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn malformed_token<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::MalformedToken { code: code.into(), message: msg.into() } }
    pub fn config<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn storage<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Storage { code: code.into(), message: msg.into() } }
    pub fn transport<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Transport { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// HTTP status this error mirrors when reported back to a caller.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Auth { .. } => 401,
            AppError::Unauthorized { .. } => 401,
            AppError::MalformedToken { .. } => 400,
            AppError::Config { .. } => 500,
            AppError::Storage { .. } => 503,
            AppError::Transport { .. } => 502,
            AppError::Internal { .. } => 500,
        }
    }

    /// True for errors after which the stored session must be discarded.
    pub fn ends_session(&self) -> bool {
        matches!(self, AppError::Unauthorized { .. } | AppError::MalformedToken { .. })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless mapped at the call site
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport { code: "transport_error".into(), message: err.to_string() }
    }
}

impl From<crate::identity::MalformedTokenError> for AppError {
    fn from(err: crate::identity::MalformedTokenError) -> Self {
        AppError::MalformedToken { code: "malformed_token".into(), message: err.to_string() }
    }
}
