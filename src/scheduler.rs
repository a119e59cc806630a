//! Scheduler / Due-Task Finder (spec §4.F). Exposes the query contract
//! only — the timer that drives polling is an external collaborator.

use chrono::Utc;

use crate::cron;
use crate::models::Task;
use crate::repository::{RepositoryError, TaskRepository};

/// `find_due_tasks(cron_expression)`: candidate tasks sharing this cron
/// expression, `is_auto=true`, `is_active=true`, whose `last_run_at` is
/// null or strictly before `prev_trigger` — a task exactly at
/// `prev_trigger` is NOT due, preventing double-firing when a scheduler
/// tick aligns with the computed trigger instant.
pub async fn find_due_tasks(
    tasks: &dyn TaskRepository,
    cron_expression: &str,
) -> Result<Vec<Task>, SchedulerError> {
    let now = Utc::now();
    let prev_trigger = cron::prev_trigger(cron_expression, now)?.unwrap_or(now);

    let due = tasks.find_due_tasks(prev_trigger).await?;
    Ok(due
        .into_iter()
        .filter(|t| t.cron_expression.as_deref() == Some(cron_expression))
        .collect())
}

/// `find_failed_tasks(days) → list<Task>`: `is_active=true AND
/// last_run_success=false AND last_run_at >= now - days`. No cron filter
/// (spec §4.F).
pub async fn find_failed_tasks(tasks: &dyn TaskRepository, days: i64) -> Result<Vec<Task>, SchedulerError> {
    let since = Utc::now() - chrono::Duration::days(days);
    Ok(tasks.find_failed_tasks(since).await?)
}

/// One scheduler tick for a single cron expression: find due tasks and
/// return them for a caller to hand to the Task Service Facade for
/// execution. Convenience wrapper for the one test/demo binary — this
/// crate does not own a background timer.
pub async fn tick_once(
    tasks: &dyn TaskRepository,
    cron_expression: &str,
) -> Result<Vec<Task>, SchedulerError> {
    find_due_tasks(tasks, cron_expression).await
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid cron expression: {0}")]
    Cron(#[from] cron::CronError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScrapeMode, TaskArgs};
    use crate::repository::DbContext;
    use chrono::TimeZone;

    async fn ctx() -> DbContext {
        DbContext::in_memory().await.expect("in-memory db")
    }

    #[tokio::test]
    async fn due_tasks_excludes_task_exactly_at_prev_trigger() {
        let ctx = ctx().await;
        let repo = ctx.tasks();

        let mut task_a = Task::new("a", "crawler-1", TaskArgs::new(ScrapeMode::FullScrape));
        task_a.is_auto = true;
        task_a.cron_expression = Some("0 0 * * *".to_string());
        task_a.last_run_at = None;
        repo.create(&task_a).await.expect("create a");

        let mut task_b = Task::new("b", "crawler-1", TaskArgs::new(ScrapeMode::FullScrape));
        task_b.is_auto = true;
        task_b.cron_expression = Some("0 0 * * *".to_string());
        task_b.last_run_at = Some(Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap());
        repo.create(&task_b).await.expect("create b");

        let mut task_c = Task::new("c", "crawler-1", TaskArgs::new(ScrapeMode::FullScrape));
        task_c.is_auto = true;
        task_c.cron_expression = Some("0 0 * * *".to_string());
        task_c.last_run_at = Some(Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
        repo.create(&task_c).await.expect("create c");

        // This test exercises the repository query directly against a fixed
        // prev_trigger rather than `find_due_tasks` (which anchors to
        // `Utc::now()`), matching spec scenario 5's literal timestamps.
        let prev_trigger = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let due = repo.find_due_tasks(prev_trigger).await.expect("query");
        let names: Vec<&str> = due.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"a"));
        assert!(names.contains(&"b"));
        assert!(!names.contains(&"c"));
    }

    #[tokio::test]
    async fn find_failed_tasks_ignores_cron_and_honors_window() {
        let ctx = ctx().await;
        let repo = ctx.tasks();

        let mut manual_failure = Task::new("manual-failure", "crawler-1", TaskArgs::new(ScrapeMode::FullScrape));
        manual_failure.is_active = true;
        manual_failure.last_run_success = Some(false);
        manual_failure.last_run_at = Some(Utc::now());
        repo.create(&manual_failure).await.expect("create");

        let found = find_failed_tasks(&repo, 7).await.expect("query");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "manual-failure");
    }
}
