//! Database context: owns the connection pool, initializes schema, and
//! hands out repository handles. Single entry point for persistence.

use std::path::Path;

use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl, SimpleAsyncConnection};

use crate::models::{Task, TaskHistory};
use crate::schema::task_history::dsl as h;
use crate::schema::tasks::dsl as t;

use super::records::{TaskHistoryRow, TaskRow};
use super::{DieselArticleStore, DieselCrawlerRepository, DieselTaskHistoryRepository, DieselTaskRepository, RepositoryError, SqlitePool};

#[derive(Clone)]
pub struct DbContext {
    pool: SqlitePool,
}

impl DbContext {
    /// Open (and, if needed, create) the database at `db_path`, running
    /// idempotent schema creation. Five fixed tables, so `CREATE TABLE IF
    /// NOT EXISTS` is the whole migration story — no external migration
    /// tool is warranted (see DESIGN.md).
    pub async fn new(db_path: &Path) -> Result<Self, RepositoryError> {
        let pool = SqlitePool::from_path(db_path);
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let pool = SqlitePool::in_memory().await?;
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn crawlers(&self) -> DieselCrawlerRepository {
        DieselCrawlerRepository::new(self.pool.clone())
    }

    pub fn tasks(&self) -> DieselTaskRepository {
        DieselTaskRepository::new(self.pool.clone())
    }

    pub fn task_history(&self) -> DieselTaskHistoryRepository {
        DieselTaskHistoryRepository::new(self.pool.clone())
    }

    pub fn articles(&self) -> DieselArticleStore {
        DieselArticleStore::new(self.pool.clone())
    }

    /// Writes a task's fields and, optionally, a single history row's
    /// terminal outcome inside one transaction on one connection, so a
    /// failure partway through never leaves the history row settled while
    /// the task row stays stale (spec §5/§7: status-and-history updates are
    /// all-or-nothing).
    pub async fn apply_task_status(
        &self,
        task: &Task,
        history: Option<(i64, &TaskHistory)>,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get().await?;
        let task_row = TaskRow::from_task(task)?;
        let history_write = history.map(|(id, h)| (id, TaskHistoryRow::from(h)));

        conn.transaction::<(), RepositoryError, _>(|conn| {
            Box::pin(async move {
                if let Some((history_id, row)) = &history_write {
                    diesel::update(h::task_history.filter(h::id.eq(*history_id as i32)))
                        .set((
                            h::end_time.eq(row.end_time.clone()),
                            h::success.eq(row.success),
                            h::articles_count.eq(row.articles_count),
                            h::message.eq(row.message.clone()),
                            h::task_status.eq(row.task_status.clone()),
                        ))
                        .execute(conn)
                        .await?;
                }

                diesel::update(t::tasks.filter(t::id.eq(&task_row.id)))
                    .set(&task_row)
                    .execute(conn)
                    .await?;

                Ok(())
            })
        })
        .await
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), RepositoryError> {
        let mut conn = pool.get().await?;
        conn.batch_execute(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 30000;

            CREATE TABLE IF NOT EXISTS crawlers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                module_name TEXT NOT NULL,
                base_url TEXT NOT NULL,
                crawler_type TEXT NOT NULL,
                config_file_name TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                crawler_id TEXT NOT NULL REFERENCES crawlers(id),
                is_auto INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                cron_expression TEXT,
                task_args TEXT NOT NULL,
                scrape_phase TEXT NOT NULL DEFAULT 'init',
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_run_at TEXT,
                last_run_success INTEGER,
                last_run_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id TEXT NOT NULL REFERENCES tasks(id),
                start_time TEXT NOT NULL,
                end_time TEXT,
                success INTEGER,
                articles_count INTEGER,
                message TEXT,
                task_status TEXT NOT NULL DEFAULT 'init'
            );

            CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                link TEXT NOT NULL UNIQUE,
                source TEXT,
                source_url TEXT,
                summary TEXT,
                content TEXT,
                category TEXT,
                author TEXT,
                article_type TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                keywords TEXT NOT NULL DEFAULT '[]',
                published_at TEXT,
                is_ai_related INTEGER NOT NULL DEFAULT 0,
                is_scraped INTEGER NOT NULL DEFAULT 0,
                scrape_status TEXT NOT NULL DEFAULT 'pending',
                scrape_error TEXT,
                last_scrape_attempt TEXT,
                task_id TEXT REFERENCES tasks(id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_cron ON tasks(cron_expression, is_auto, is_active);
            CREATE INDEX IF NOT EXISTS idx_tasks_crawler ON tasks(crawler_id);
            CREATE INDEX IF NOT EXISTS idx_task_history_task ON task_history(task_id, start_time);
            CREATE INDEX IF NOT EXISTS idx_articles_task ON articles(task_id, is_scraped);
            "#,
        )
        .await?;
        Ok(())
    }
}
