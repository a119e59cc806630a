//! Task Service Facade (spec §4.G): CRUD on tasks, status/history writes,
//! max-retries editing, validation orchestration. Every entry point
//! returns an `Envelope`; exceptions are caught here and never escape as
//! bare errors to a caller.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CoreError, Envelope};
use crate::models::{ScrapePhase, Task, TaskHistory, TaskStatus};
use crate::repository::{
    DbContext, RepositoryError, TaskFilter, TaskHistoryRepository, TaskRepository,
};
use crate::validation::{CreateTaskSchema, UpdateTaskSchema, ValidationError};

/// Read-facing projection returned by create/read entry points. Named for
/// parity with the reference's `CrawlerTaskReadSchema`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReadSchema {
    pub id: String,
    pub name: String,
    pub crawler_id: String,
    pub is_auto: bool,
    pub is_active: bool,
    pub cron_expression: Option<String>,
    pub task_args: serde_json::Value,
    pub scrape_phase: ScrapePhase,
    pub retry_count: u32,
}

impl From<&Task> for TaskReadSchema {
    fn from(t: &Task) -> Self {
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            crawler_id: t.crawler_id.clone(),
            is_auto: t.is_auto,
            is_active: t.is_active,
            cron_expression: t.cron_expression.clone(),
            task_args: serde_json::to_value(&t.task_args).unwrap_or(Value::Null),
            scrape_phase: t.scrape_phase,
            retry_count: t.retry_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusSchema {
    pub task_id: String,
    pub task_status: Option<TaskStatus>,
    pub scrape_phase: ScrapePhase,
    pub message: Option<String>,
}

pub struct TaskService {
    db: DbContext,
}

impl TaskService {
    pub fn new(db: DbContext) -> Self {
        Self { db }
    }

    fn from_core_error(e: CoreError) -> Envelope<TaskReadSchema> {
        Envelope::err(e.to_string())
    }

    pub async fn create_task(
        &self,
        name: &str,
        crawler_id: &str,
        is_auto: bool,
        cron_expression: Option<&str>,
        task_args: &Value,
    ) -> Envelope<TaskReadSchema> {
        let schema = match CreateTaskSchema::validate(Some(name), Some(crawler_id), is_auto, cron_expression, task_args) {
            Ok(s) => s,
            Err(e) => return Envelope::err(CoreError::validation(e.to_string()).to_string()),
        };

        if self.db.crawlers().find_by_id(&schema.crawler_id).await.ok().flatten().is_none() {
            return Self::from_core_error(CoreError::not_found(format!("crawler {}", schema.crawler_id)));
        }

        let mut task = Task::new(schema.name, schema.crawler_id, schema.task_args);
        task.is_auto = schema.is_auto;
        task.cron_expression = schema.cron_expression;

        match self.db.tasks().create(&task).await {
            Ok(created) => Envelope::ok("task created", TaskReadSchema::from(&created)),
            Err(e) => Self::from_core_error(CoreError::Storage(e)),
        }
    }

    pub async fn update_task(&self, id: &str, patch: &Value) -> Envelope<TaskReadSchema> {
        let schema = match UpdateTaskSchema::validate(patch) {
            Ok(s) => s,
            Err(e) => return Envelope::err(CoreError::validation(e.to_string()).to_string()),
        };

        let mut task = match self.db.tasks().find_by_id(id).await {
            Ok(Some(t)) => t,
            Ok(None) => return Self::from_core_error(CoreError::not_found("task")),
            Err(e) => return Self::from_core_error(CoreError::Storage(e)),
        };

        if let Some(name) = schema.name {
            task.name = name;
        }
        if let Some(is_auto) = schema.is_auto {
            task.is_auto = is_auto;
        }
        if let Some(is_active) = schema.is_active {
            task.is_active = is_active;
        }
        if let Some(cron_expression) = schema.cron_expression {
            task.cron_expression = Some(cron_expression);
        }
        if let Some(patch_value) = schema.task_args_patch {
            task.task_args = match task.task_args.merge_patch(&patch_value) {
                Ok(merged) => merged,
                Err(e) => return Self::from_core_error(CoreError::validation(e.to_string())),
            };
        }
        task.updated_at = Utc::now();

        match self.db.tasks().update(&task).await {
            Ok(updated) => Envelope::ok("task updated", TaskReadSchema::from(&updated)),
            Err(e) => Self::from_core_error(CoreError::Storage(e)),
        }
    }

    pub async fn get_task_by_id(&self, id: &str, is_active: Option<bool>) -> Envelope<TaskReadSchema> {
        match self.db.tasks().find_by_id(id).await {
            Ok(Some(task)) => match is_active {
                Some(flag) if task.is_active != flag => Self::from_core_error(CoreError::not_found("task")),
                _ => Envelope::ok("found", TaskReadSchema::from(&task)),
            },
            Ok(None) => Self::from_core_error(CoreError::not_found("task")),
            Err(e) => Self::from_core_error(CoreError::Storage(e)),
        }
    }

    pub async fn delete_task(&self, id: &str) -> Envelope<()> {
        match self.db.tasks().find_by_id(id).await {
            Ok(Some(_)) => match self.db.tasks().delete(id).await {
                Ok(()) => Envelope::ok("task deleted", ()),
                Err(e) => Envelope::err(CoreError::Storage(e).to_string()),
            },
            Ok(None) => Envelope::err(CoreError::not_found("task").to_string()),
            Err(e) => Envelope::err(CoreError::Storage(e).to_string()),
        }
    }

    /// Atomic write: updates `Task` fields AND, if `history_id` is
    /// supplied, patches the matching `TaskHistory` row, both inside a
    /// single transaction (`DbContext::apply_task_status`). A `history_id`
    /// that doesn't belong to `id` is an error with no partial update.
    pub async fn update_task_status(
        &self,
        id: &str,
        task_status: Option<TaskStatus>,
        scrape_phase: ScrapePhase,
        history_id: Option<i64>,
        history_patch: Option<TaskHistoryPatch>,
    ) -> Envelope<()> {
        let mut task = match self.db.tasks().find_by_id(id).await {
            Ok(Some(t)) => t,
            Ok(None) => return Envelope::err(CoreError::not_found("task").to_string()),
            Err(e) => return Envelope::err(CoreError::Storage(e).to_string()),
        };

        let mut updated_history = None;
        if let Some(history_id) = history_id {
            let history = match self.db.task_history().find_by_id(history_id).await {
                Ok(Some(h)) => h,
                Ok(None) => return Envelope::err(CoreError::not_found("task history").to_string()),
                Err(e) => return Envelope::err(CoreError::Storage(e).to_string()),
            };
            if history.task_id != id {
                return Envelope::err(CoreError::validation("history_id does not belong to task").to_string());
            }

            let mut patched = history.clone();
            if let Some(patch) = history_patch {
                patch.apply(&mut patched);
            }
            if let Some(status) = task_status {
                patched.task_status = status;
            }
            updated_history = Some((history_id, patched));
        }

        task.scrape_phase = scrape_phase;
        if let Some(status) = task_status {
            task.last_run_success = Some(status == TaskStatus::Completed);
        }
        task.last_run_at = Some(Utc::now());
        task.updated_at = Utc::now();

        let history_ref = updated_history.as_ref().map(|(id, h)| (*id, h));
        match self.db.apply_task_status(&task, history_ref).await {
            Ok(()) => Envelope::ok("status updated", ()),
            Err(e) => Envelope::err(CoreError::Storage(e).to_string()),
        }
    }

    pub async fn get_task_status(&self, id: &str) -> Envelope<TaskStatusSchema> {
        match self.db.tasks().find_by_id(id).await {
            Ok(Some(task)) => Envelope::ok(
                "found",
                TaskStatusSchema {
                    task_id: task.id,
                    task_status: None,
                    scrape_phase: task.scrape_phase,
                    message: task.last_run_message,
                },
            ),
            Ok(None) => Envelope::err(CoreError::not_found("task").to_string()),
            Err(e) => Envelope::err(CoreError::Storage(e).to_string()),
        }
    }

    pub async fn find_task_history(&self, task_id: &str, limit: i64) -> Envelope<Vec<TaskHistory>> {
        match self.db.task_history().find_by_task(task_id, limit).await {
            Ok(history) => Envelope::ok("found", history),
            Err(e) => Envelope::err(CoreError::Storage(e).to_string()),
        }
    }

    /// Succeeds iff `retry_count + 1 <= task_args.max_retries`; otherwise
    /// returns failure leaving `retry_count` unchanged.
    pub async fn increment_retry_count(&self, id: &str) -> Envelope<TaskReadSchema> {
        let mut task = match self.db.tasks().find_by_id(id).await {
            Ok(Some(t)) => t,
            Ok(None) => return Self::from_core_error(CoreError::not_found("task")),
            Err(e) => return Self::from_core_error(CoreError::Storage(e)),
        };

        if task.retry_count + 1 > task.task_args.max_retries {
            return Envelope::err("retry budget exhausted".to_string());
        }

        task.retry_count += 1;
        task.updated_at = Utc::now();
        match self.db.tasks().update(&task).await {
            Ok(updated) => Envelope::ok("retry count incremented", TaskReadSchema::from(&updated)),
            Err(e) => Self::from_core_error(CoreError::Storage(e)),
        }
    }

    pub async fn reset_retry_count(&self, id: &str) -> Envelope<TaskReadSchema> {
        let mut task = match self.db.tasks().find_by_id(id).await {
            Ok(Some(t)) => t,
            Ok(None) => return Self::from_core_error(CoreError::not_found("task")),
            Err(e) => return Self::from_core_error(CoreError::Storage(e)),
        };
        task.retry_count = 0;
        task.updated_at = Utc::now();
        match self.db.tasks().update(&task).await {
            Ok(updated) => Envelope::ok("retry count reset", TaskReadSchema::from(&updated)),
            Err(e) => Self::from_core_error(CoreError::Storage(e)),
        }
    }

    pub async fn update_max_retries(&self, id: &str, n: u32) -> Envelope<TaskReadSchema> {
        let mut task = match self.db.tasks().find_by_id(id).await {
            Ok(Some(t)) => t,
            Ok(None) => return Self::from_core_error(CoreError::not_found("task")),
            Err(e) => return Self::from_core_error(CoreError::Storage(e)),
        };

        task.task_args.max_retries = n;
        task.updated_at = Utc::now();
        match self.db.tasks().update(&task).await {
            Ok(updated) => Envelope::ok("max_retries updated", TaskReadSchema::from(&updated)),
            Err(e) => Self::from_core_error(CoreError::Storage(e)),
        }
    }

    pub fn validate_task_data(&self, task_args: &Value) -> Result<(), ValidationError> {
        crate::validation::validate_task_args(task_args).map(|_| ())
    }

    pub async fn find_tasks_advanced(&self, filter: &TaskFilter) -> Envelope<Vec<TaskReadSchema>> {
        match self.db.tasks().find_tasks_advanced(filter).await {
            Ok(tasks) => Envelope::ok("found", tasks.iter().map(TaskReadSchema::from).collect()),
            Err(e) => Envelope::err(CoreError::Storage(e).to_string()),
        }
    }
}

/// Patch applied to a `TaskHistory` row inside `update_task_status`.
#[derive(Debug, Clone, Default)]
pub struct TaskHistoryPatch {
    pub end_time: Option<chrono::DateTime<Utc>>,
    pub success: Option<bool>,
    pub articles_count: Option<u32>,
    pub message: Option<String>,
}

impl TaskHistoryPatch {
    fn apply(&self, history: &mut TaskHistory) {
        if let Some(end_time) = self.end_time {
            history.end_time = Some(end_time);
        }
        if let Some(success) = self.success {
            history.success = Some(success);
        }
        if let Some(count) = self.articles_count {
            history.articles_count = Some(count);
        }
        if let Some(message) = &self.message {
            history.message = Some(message.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Crawler;
    use serde_json::json;

    async fn service_with_crawler() -> (TaskService, Crawler) {
        let db = DbContext::in_memory().await.expect("db");
        let crawler = Crawler::new("example", "example_mod", "https://example.com", "rss", "example.toml");
        db.crawlers().create(&crawler).await.expect("create crawler");
        (TaskService::new(db), crawler)
    }

    #[tokio::test]
    async fn create_task_rejects_unknown_crawler() {
        let (service, _crawler) = service_with_crawler().await;
        let result = service
            .create_task("t", "missing-crawler", false, None, &json!({"scrape_mode": "full_scrape"}))
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn create_then_update_max_retries_persists() {
        let (service, crawler) = service_with_crawler().await;
        let created = service
            .create_task("nightly", &crawler.id, false, None, &json!({"scrape_mode": "full_scrape"}))
            .await;
        assert!(created.success);
        let id = created.payload.unwrap().id;

        let updated = service.update_max_retries(&id, 7).await;
        assert!(updated.success);
        assert_eq!(updated.payload.unwrap().task_args["max_retries"], json!(7));

        let fetched = service.get_task_by_id(&id, None).await;
        assert_eq!(fetched.payload.unwrap().task_args["max_retries"], json!(7));
    }

    #[tokio::test]
    async fn increment_retry_count_respects_budget() {
        let (service, crawler) = service_with_crawler().await;
        let created = service
            .create_task("t", &crawler.id, false, None, &json!({"scrape_mode": "full_scrape", "max_retries": 1}))
            .await;
        let id = created.payload.unwrap().id;

        let first = service.increment_retry_count(&id).await;
        assert!(first.success);
        let second = service.increment_retry_count(&id).await;
        assert!(!second.success);
    }

    #[tokio::test]
    async fn update_rejects_immutable_field_patch() {
        let (service, crawler) = service_with_crawler().await;
        let created = service
            .create_task("t", &crawler.id, false, None, &json!({"scrape_mode": "full_scrape"}))
            .await;
        let id = created.payload.unwrap().id;

        let result = service.update_task(&id, &json!({"crawler_id": "other"})).await;
        assert!(!result.success);
    }
}
