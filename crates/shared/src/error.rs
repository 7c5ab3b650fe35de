use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    DuplicateName,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn already_exists(name: &str) -> Self {
        Self::new(ErrorCode::DuplicateName, format!("{name} already exists"))
    }

    pub fn already_in_use(name: &str) -> Self {
        Self::new(ErrorCode::DuplicateName, format!("{name} already in use"))
    }

    pub fn not_found(name: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{name} not found"))
    }
}
