//! Error kinds and the `{success, message, payload}` envelope (spec §7).
//!
//! Inside the core, errors flow as plain `Result<T, CoreError>` / `?`.
//! Conversion into an `Envelope` happens only at the Task Service Facade
//! boundary or at the Task Runner's final result, per spec's propagation
//! policy.

use serde::Serialize;
use thiserror::Error;

use crate::repository::RepositoryError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("資料驗證失敗: {0}")]
    Validation(String),

    #[error("{0}不存在")]
    NotFound(String),

    #[error("任務已取消{0}")]
    Cancelled(String),

    #[error("重試次數已用盡: {0}")]
    RetryExhausted(String),

    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("{0}")]
    Fatal(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }

    pub fn cancelled() -> Self {
        Self::Cancelled(String::new())
    }

    pub fn cancelled_with_suffix(suffix: impl Into<String>) -> Self {
        Self::Cancelled(suffix.into())
    }
}

/// Uniform response envelope returned by every Task Service Facade entry
/// point and by the Task Runner's final result.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(message: impl Into<String>, payload: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: Some(payload),
        }
    }

    pub fn ok_empty(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: true,
            message: message.into(),
            payload: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload: None,
        }
    }

    pub fn from_result(result: Result<(String, T), CoreError>) -> Self {
        match result {
            Ok((message, payload)) => Self::ok(message, payload),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
