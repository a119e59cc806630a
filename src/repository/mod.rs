//! Repository layer: Diesel/SQLite persistence for crawlers, tasks, task
//! history, and articles (spec §4.B, §4.F, §4.G's storage needs).

mod article;
mod context;
mod crawler;
mod pool;
mod records;
mod task;
mod task_history;

pub use article::{ArticleFilter, ArticleSortBy, ArticleStore, BatchResult, DieselArticleStore, Page};
pub use context::DbContext;
pub use crawler::{CrawlerRepository, DieselCrawlerRepository};
pub use pool::SqlitePool;
pub use task::{DieselTaskRepository, TaskFilter, TaskRepository};
pub use task_history::{DieselTaskHistoryRepository, TaskHistoryRepository};

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Connection error: {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

pub(crate) fn bool_to_int(b: bool) -> i32 {
    if b {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(i: i32) -> bool {
    i != 0
}
