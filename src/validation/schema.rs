//! `CreateTaskSchema`/`UpdateTaskSchema`: composition of the field
//! validators into the two entry-point schemas the Task Service Facade
//! runs requests through (spec §4.H).

use serde_json::Value;

use crate::models::TaskArgs;

use super::fields::{cron_expression_field, str_field};
use super::{validate_task_args, ValidationError};

/// Fields the immutable-field check in `UpdateTaskSchema` rejects outright.
const IMMUTABLE_FIELDS: &[&str] = &["id", "created_at", "crawler_id"];

/// Validated, coerced form of a task-creation request.
#[derive(Debug, Clone)]
pub struct CreateTaskSchema {
    pub name: String,
    pub crawler_id: String,
    pub is_auto: bool,
    pub cron_expression: Option<String>,
    pub task_args: TaskArgs,
}

impl CreateTaskSchema {
    /// Runs every field validator, then asserts `is_auto=true` implies a
    /// present, valid cron expression (spec §3 Task invariant).
    pub fn validate(
        name: Option<&str>,
        crawler_id: Option<&str>,
        is_auto: bool,
        cron_expression: Option<&str>,
        task_args: &Value,
    ) -> Result<Self, ValidationError> {
        let name = str_field("name", name, Some(1), Some(255), true)?.expect("required field checked");
        let crawler_id = str_field("crawler_id", crawler_id, Some(1), None, true)?.expect("required field checked");

        let cron_expression = cron_expression_field("cron_expression", cron_expression, is_auto)?;
        let task_args = validate_task_args(task_args)?;

        Ok(Self {
            name,
            crawler_id,
            is_auto,
            cron_expression,
            task_args,
        })
    }
}

/// Validated, coerced form of a task-patch request. At least one declared
/// updatable field must be present; immutable fields are rejected before
/// any field validator runs.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskSchema {
    pub name: Option<String>,
    pub is_auto: Option<bool>,
    pub is_active: Option<bool>,
    pub cron_expression: Option<String>,
    pub task_args_patch: Option<Value>,
}

impl UpdateTaskSchema {
    pub fn validate(patch: &Value) -> Result<Self, ValidationError> {
        let obj = patch
            .as_object()
            .ok_or_else(|| ValidationError::new("patch", "must be an object"))?;

        for immutable in IMMUTABLE_FIELDS {
            if obj.contains_key(*immutable) {
                return Err(ValidationError::new(*immutable, "is immutable and cannot be updated"));
            }
        }

        if obj.is_empty() {
            return Err(ValidationError::new("patch", "must declare at least one updatable field"));
        }

        let name = match obj.get("name") {
            Some(v) => str_field("name", v.as_str(), Some(1), Some(255), true)?,
            None => None,
        };

        let is_auto = obj.get("is_auto").and_then(|v| v.as_bool());
        let is_active = obj.get("is_active").and_then(|v| v.as_bool());

        let cron_expression = match obj.get("cron_expression") {
            Some(Value::Null) => None,
            Some(v) => cron_expression_field("cron_expression", v.as_str(), true)?,
            None => None,
        };

        let task_args_patch = obj.get("task_args").cloned();

        Ok(Self {
            name,
            is_auto,
            is_active,
            cron_expression,
            task_args_patch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_schema_requires_cron_when_auto() {
        let result = CreateTaskSchema::validate(
            Some("nightly"),
            Some("crawler-1"),
            true,
            None,
            &json!({"scrape_mode": "full_scrape"}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn create_schema_accepts_manual_task_without_cron() {
        let result = CreateTaskSchema::validate(
            Some("manual"),
            Some("crawler-1"),
            false,
            None,
            &json!({"scrape_mode": "links_only"}),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn update_schema_rejects_immutable_fields() {
        let result = UpdateTaskSchema::validate(&json!({"id": "new-id"}));
        assert!(result.is_err());
    }

    #[test]
    fn update_schema_rejects_empty_patch() {
        let result = UpdateTaskSchema::validate(&json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn update_schema_accepts_partial_task_args_patch() {
        let result = UpdateTaskSchema::validate(&json!({"task_args": {"max_retries": 5}})).unwrap();
        assert_eq!(result.task_args_patch, Some(json!({"max_retries": 5})));
    }
}
