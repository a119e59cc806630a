//! Validation Layer (spec §4.H): composable field validators producing a
//! uniform `{field}: {message}` error, composed into create/update task
//! schemas.

mod fields;
mod schema;

pub use fields::*;
pub use schema::{CreateTaskSchema, UpdateTaskSchema};

use serde_json::Value;

use crate::models::{ScrapeMode, TaskArgs};

/// A single validation failure, always carrying the offending field name so
/// callers can build `spec.md`'s `{field}: {message}` surfaced form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// The composite `task_args` validator from spec §3/§4.H: required keys
/// present, each sub-key typed, `scrape_mode` a recognized enum,
/// `max_retries >= 0`, `retry_delay > 0`. Returns the typed, defaulted
/// `TaskArgs` on success.
pub fn validate_task_args(value: &Value) -> Result<TaskArgs, ValidationError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ValidationError::new("task_args", "must be an object"))?;

    let mode_value = obj
        .get("scrape_mode")
        .ok_or_else(|| ValidationError::new("task_args.scrape_mode", "is required"))?;
    let mode_str = mode_value
        .as_str()
        .ok_or_else(|| ValidationError::new("task_args.scrape_mode", "must be a string"))?;
    ScrapeMode::from_str(mode_str).ok_or_else(|| {
        ValidationError::new(
            "task_args.scrape_mode",
            format!("unrecognized scrape mode '{mode_str}'"),
        )
    })?;

    if let Some(max_retries) = obj.get("max_retries") {
        let n = max_retries
            .as_u64()
            .ok_or_else(|| ValidationError::new("task_args.max_retries", "must be a non-negative integer"))?;
        let _ = n;
    }

    if let Some(retry_delay) = obj.get("retry_delay") {
        let f = retry_delay
            .as_f64()
            .ok_or_else(|| ValidationError::new("task_args.retry_delay", "must be a number"))?;
        if f <= 0.0 {
            return Err(ValidationError::new("task_args.retry_delay", "must be greater than 0"));
        }
    }

    serde_json::from_value(value.clone())
        .map_err(|e| ValidationError::new("task_args", format!("malformed task_args: {e}")))
}
