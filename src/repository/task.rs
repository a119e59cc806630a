//! Task repository: scheduled/on-demand scrape job CRUD plus the due-task
//! and advanced-filter queries the scheduler and facade need.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::{ScrapePhase, Task};
use crate::schema::tasks::dsl as t;

use super::records::{TaskRecord, TaskRow};
use super::{RepositoryError, Result, SqlitePool};

/// Filters accepted by `find_tasks_advanced` (spec §4.G). All fields are
/// optional narrowing predicates, ANDed together.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub crawler_id: Option<String>,
    pub is_active: Option<bool>,
    pub is_auto: Option<bool>,
    pub scrape_phase: Option<ScrapePhase>,
    pub name_contains: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self {
            limit: 50,
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> Result<Task>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Task>>;
    async fn update(&self, task: &Task) -> Result<Task>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn find_tasks_advanced(&self, filter: &TaskFilter) -> Result<Vec<Task>>;
    /// Tasks eligible to fire: `is_auto`, `is_active`, non-null cron, and
    /// `last_run_at` either null or strictly before `prev_trigger` (spec §4.F).
    async fn find_due_tasks(&self, prev_trigger: DateTime<Utc>) -> Result<Vec<Task>>;
    /// `is_active=true AND last_run_success=false AND last_run_at >= now -
    /// days` (spec §4.F `find_failed_tasks`, no cron filter).
    async fn find_failed_tasks(&self, since: DateTime<Utc>) -> Result<Vec<Task>>;
}

pub struct DieselTaskRepository {
    pool: SqlitePool,
}

impl DieselTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for DieselTaskRepository {
    async fn create(&self, task: &Task) -> Result<Task> {
        let mut conn = self.pool.get().await?;
        let row = TaskRow::from_task(task)?;
        diesel::insert_into(t::tasks)
            .values(&row)
            .execute(&mut conn)
            .await?;
        self.find_by_id(&task.id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(task.id.clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Task>> {
        let mut conn = self.pool.get().await?;
        let record = t::tasks
            .filter(t::id.eq(id))
            .first::<TaskRecord>(&mut conn)
            .await
            .optional()?;
        record.map(Task::try_from).transpose()
    }

    async fn update(&self, task: &Task) -> Result<Task> {
        let mut conn = self.pool.get().await?;
        let mut row = TaskRow::from_task(task)?;
        row.updated_at = Utc::now().to_rfc3339();
        diesel::update(t::tasks.filter(t::id.eq(&task.id)))
            .set(&row)
            .execute(&mut conn)
            .await?;
        self.find_by_id(&task.id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(task.id.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        diesel::delete(t::tasks.filter(t::id.eq(id)))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn find_tasks_advanced(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut conn = self.pool.get().await?;
        let mut query = t::tasks.into_boxed();

        if let Some(crawler_id) = &filter.crawler_id {
            query = query.filter(t::crawler_id.eq(crawler_id.clone()));
        }
        if let Some(is_active) = filter.is_active {
            query = query.filter(t::is_active.eq(is_active as i32));
        }
        if let Some(is_auto) = filter.is_auto {
            query = query.filter(t::is_auto.eq(is_auto as i32));
        }
        if let Some(phase) = filter.scrape_phase {
            query = query.filter(t::scrape_phase.eq(phase.as_str()));
        }
        if let Some(needle) = &filter.name_contains {
            query = query.filter(t::name.like(format!("%{}%", needle)));
        }

        let records = query
            .order(t::created_at.desc())
            .limit(filter.limit.max(1))
            .offset(filter.offset.max(0))
            .load::<TaskRecord>(&mut conn)
            .await?;

        records.into_iter().map(Task::try_from).collect()
    }

    async fn find_due_tasks(&self, prev_trigger: DateTime<Utc>) -> Result<Vec<Task>> {
        let mut conn = self.pool.get().await?;
        let cutoff = prev_trigger.to_rfc3339();
        let records = t::tasks
            .filter(t::is_auto.eq(1))
            .filter(t::is_active.eq(1))
            .filter(t::cron_expression.is_not_null())
            .filter(t::last_run_at.is_null().or(t::last_run_at.lt(cutoff)))
            .load::<TaskRecord>(&mut conn)
            .await?;
        records.into_iter().map(Task::try_from).collect()
    }

    async fn find_failed_tasks(&self, since: DateTime<Utc>) -> Result<Vec<Task>> {
        let mut conn = self.pool.get().await?;
        let cutoff = since.to_rfc3339();
        let records = t::tasks
            .filter(t::is_active.eq(1))
            .filter(t::last_run_success.eq(0))
            .filter(t::last_run_at.ge(cutoff))
            .load::<TaskRecord>(&mut conn)
            .await?;
        records.into_iter().map(Task::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScrapeMode, TaskArgs};
    use crate::repository::DbContext;

    async fn ctx() -> DbContext {
        DbContext::in_memory().await.expect("in-memory db")
    }

    fn sample_task(name: &str, crawler_id: &str) -> Task {
        Task::new(name, crawler_id, TaskArgs::new(ScrapeMode::FullScrape))
    }

    #[tokio::test]
    async fn create_then_find_round_trips_task_args() {
        let ctx = ctx().await;
        let repo = ctx.tasks();
        let mut task = sample_task("nightly", "crawler-1");
        task.task_args.max_retries = 5;
        repo.create(&task).await.expect("create");

        let found = repo.find_by_id(&task.id).await.expect("query").expect("present");
        assert_eq!(found.task_args.max_retries, 5);
        assert_eq!(found.scrape_phase, ScrapePhase::Init);
    }

    #[tokio::test]
    async fn due_tasks_requires_auto_active_and_stale_last_run() {
        let ctx = ctx().await;
        let repo = ctx.tasks();

        let mut due = sample_task("due", "crawler-1");
        due.is_auto = true;
        due.is_active = true;
        due.cron_expression = Some("*/5 * * * *".to_string());
        due.last_run_at = None;
        repo.create(&due).await.expect("create due");

        let mut not_due = sample_task("not-due", "crawler-1");
        not_due.is_auto = true;
        not_due.is_active = true;
        not_due.cron_expression = Some("*/5 * * * *".to_string());
        not_due.last_run_at = Some(Utc::now());
        repo.create(&not_due).await.expect("create not due");

        let mut manual = sample_task("manual", "crawler-1");
        manual.is_auto = false;
        repo.create(&manual).await.expect("create manual");

        let prev_trigger = Utc::now() - chrono::Duration::minutes(1);
        let found = repo.find_due_tasks(prev_trigger).await.expect("query");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "due");
    }

    #[tokio::test]
    async fn advanced_filter_narrows_by_active_and_name() {
        let ctx = ctx().await;
        let repo = ctx.tasks();
        let mut active = sample_task("keep-alpha", "crawler-1");
        active.is_active = true;
        repo.create(&active).await.expect("create");
        let mut inactive = sample_task("skip-beta", "crawler-1");
        inactive.is_active = false;
        repo.create(&inactive).await.expect("create");

        let mut filter = TaskFilter::new();
        filter.is_active = Some(true);
        filter.name_contains = Some("keep".to_string());
        let found = repo.find_tasks_advanced(&filter).await.expect("query");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "keep-alpha");
    }

    #[tokio::test]
    async fn find_failed_tasks_requires_active_recent_failure() {
        let ctx = ctx().await;
        let repo = ctx.tasks();

        let mut recent_failure = sample_task("recent-failure", "crawler-1");
        recent_failure.is_active = true;
        recent_failure.last_run_success = Some(false);
        recent_failure.last_run_at = Some(Utc::now());
        repo.create(&recent_failure).await.expect("create");

        let mut stale_failure = sample_task("stale-failure", "crawler-1");
        stale_failure.is_active = true;
        stale_failure.last_run_success = Some(false);
        stale_failure.last_run_at = Some(Utc::now() - chrono::Duration::days(30));
        repo.create(&stale_failure).await.expect("create");

        let mut recent_success = sample_task("recent-success", "crawler-1");
        recent_success.is_active = true;
        recent_success.last_run_success = Some(true);
        recent_success.last_run_at = Some(Utc::now());
        repo.create(&recent_success).await.expect("create");

        let mut inactive_failure = sample_task("inactive-failure", "crawler-1");
        inactive_failure.is_active = false;
        inactive_failure.last_run_success = Some(false);
        inactive_failure.last_run_at = Some(Utc::now());
        repo.create(&inactive_failure).await.expect("create");

        let since = Utc::now() - chrono::Duration::days(7);
        let found = repo.find_failed_tasks(since).await.expect("query");
        let names: Vec<&str> = found.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["recent-failure"]);
    }
}
