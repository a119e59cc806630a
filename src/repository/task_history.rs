//! Task history repository: one append-mostly row per execution attempt.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::TaskHistory;
use crate::schema::task_history::dsl as h;

use super::records::{TaskHistoryRecord, TaskHistoryRow};
use super::{RepositoryError, Result, SqlitePool};

#[async_trait]
pub trait TaskHistoryRepository: Send + Sync {
    /// Insert a new history row (spec §4.E: one row per run, created at start).
    async fn create(&self, history: &TaskHistory) -> Result<TaskHistory>;
    /// Write the terminal outcome of a run onto its history row.
    async fn finish(&self, id: i64, history: &TaskHistory) -> Result<TaskHistory>;
    async fn find_by_id(&self, id: i64) -> Result<Option<TaskHistory>>;
    async fn find_by_task(&self, task_id: &str, limit: i64) -> Result<Vec<TaskHistory>>;
    /// Most recent history rows across all tasks whose outcome was a failure,
    /// within the last `days` days (spec §4.F `find_failed_tasks`).
    async fn find_recent_failures(&self, days: i64) -> Result<Vec<TaskHistory>>;
}

pub struct DieselTaskHistoryRepository {
    pool: SqlitePool,
}

impl DieselTaskHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskHistoryRepository for DieselTaskHistoryRepository {
    async fn create(&self, history: &TaskHistory) -> Result<TaskHistory> {
        let mut conn = self.pool.get().await?;
        let row = TaskHistoryRow::from(history);
        diesel::insert_into(h::task_history)
            .values(&row)
            .execute(&mut conn)
            .await?;
        let record = h::task_history
            .filter(h::task_id.eq(&history.task_id))
            .filter(h::start_time.eq(&row.start_time))
            .order(h::id.desc())
            .first::<TaskHistoryRecord>(&mut conn)
            .await?;
        Ok(TaskHistory::from(record))
    }

    async fn finish(&self, id: i64, history: &TaskHistory) -> Result<TaskHistory> {
        let mut conn = self.pool.get().await?;
        let row = TaskHistoryRow::from(history);
        diesel::update(h::task_history.filter(h::id.eq(id as i32)))
            .set((
                h::end_time.eq(row.end_time),
                h::success.eq(row.success),
                h::articles_count.eq(row.articles_count),
                h::message.eq(row.message),
                h::task_status.eq(row.task_status),
            ))
            .execute(&mut conn)
            .await?;
        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TaskHistory>> {
        let mut conn = self.pool.get().await?;
        let record = h::task_history
            .filter(h::id.eq(id as i32))
            .first::<TaskHistoryRecord>(&mut conn)
            .await
            .optional()?;
        Ok(record.map(TaskHistory::from))
    }

    async fn find_by_task(&self, task_id: &str, limit: i64) -> Result<Vec<TaskHistory>> {
        let mut conn = self.pool.get().await?;
        let records = h::task_history
            .filter(h::task_id.eq(task_id))
            .order(h::start_time.desc())
            .limit(limit)
            .load::<TaskHistoryRecord>(&mut conn)
            .await?;
        Ok(records.into_iter().map(TaskHistory::from).collect())
    }

    async fn find_recent_failures(&self, days: i64) -> Result<Vec<TaskHistory>> {
        let mut conn = self.pool.get().await?;
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let records = h::task_history
            .filter(h::task_status.eq("failed"))
            .filter(h::start_time.ge(cutoff))
            .order(h::start_time.desc())
            .load::<TaskHistoryRecord>(&mut conn)
            .await?;
        Ok(records.into_iter().map(TaskHistory::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::repository::DbContext;

    async fn ctx() -> DbContext {
        DbContext::in_memory().await.expect("in-memory db")
    }

    #[tokio::test]
    async fn create_then_finish_transitions_to_terminal() {
        let ctx = ctx().await;
        let repo = ctx.task_history();
        let started = TaskHistory::started("task-1");
        let created = repo.create(&started).await.expect("create");
        assert_eq!(created.task_status, TaskStatus::Running);

        let mut done = created.clone();
        done.end_time = Some(Utc::now());
        done.success = Some(true);
        done.articles_count = Some(12);
        done.task_status = TaskStatus::Completed;
        let finished = repo.finish(created.id, &done).await.expect("finish");
        assert!(finished.is_terminal());
        assert_eq!(finished.articles_count, Some(12));
    }

    #[tokio::test]
    async fn recent_failures_filters_by_status_and_window() {
        let ctx = ctx().await;
        let repo = ctx.task_history();
        let mut failed = TaskHistory::started("task-2");
        failed.task_status = TaskStatus::Running;
        let created = repo.create(&failed).await.expect("create");
        let mut terminal = created.clone();
        terminal.task_status = TaskStatus::Failed;
        terminal.success = Some(false);
        terminal.end_time = Some(Utc::now());
        repo.finish(created.id, &terminal).await.expect("finish");

        let failures = repo.find_recent_failures(7).await.expect("query");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].task_id, "task-2");
    }
}
