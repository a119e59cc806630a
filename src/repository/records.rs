//! Diesel ORM record structs, one per table, plus the `From` conversions
//! to/from domain models. Kept separate from the domain models themselves
//! so the wire-level (string-encoded enums, JSON-encoded collections)
//! shape never leaks into `models::*`.

use diesel::prelude::*;

use crate::models::{
    Article, ArticleScrapeStatus, Crawler, ScrapePhase, Task, TaskArgs, TaskHistory, TaskStatus,
};
use crate::schema;

use super::{bool_to_int, int_to_bool, parse_datetime, parse_datetime_opt, RepositoryError};

// ---------------------------------------------------------------------
// Crawlers
// ---------------------------------------------------------------------

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::crawlers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CrawlerRecord {
    pub id: String,
    pub name: String,
    pub module_name: String,
    pub base_url: String,
    pub crawler_type: String,
    pub config_file_name: String,
    pub active: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = schema::crawlers)]
pub struct CrawlerRow {
    pub id: String,
    pub name: String,
    pub module_name: String,
    pub base_url: String,
    pub crawler_type: String,
    pub config_file_name: String,
    pub active: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Crawler> for CrawlerRow {
    fn from(c: &Crawler) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            module_name: c.module_name.clone(),
            base_url: c.base_url.clone(),
            crawler_type: c.crawler_type.clone(),
            config_file_name: c.config_file_name.clone(),
            active: bool_to_int(c.active),
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

impl From<CrawlerRecord> for Crawler {
    fn from(r: CrawlerRecord) -> Self {
        Crawler {
            id: r.id,
            name: r.name,
            module_name: r.module_name,
            base_url: r.base_url,
            crawler_type: r.crawler_type,
            config_file_name: r.config_file_name,
            active: int_to_bool(r.active),
            created_at: parse_datetime(&r.created_at),
            updated_at: parse_datetime(&r.updated_at),
        }
    }
}

// ---------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::tasks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    pub crawler_id: String,
    pub is_auto: i32,
    pub is_active: i32,
    pub cron_expression: Option<String>,
    pub task_args: String,
    pub scrape_phase: String,
    pub retry_count: i32,
    pub last_run_at: Option<String>,
    pub last_run_success: Option<i32>,
    pub last_run_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = schema::tasks)]
pub struct TaskRow {
    pub id: String,
    pub name: String,
    pub crawler_id: String,
    pub is_auto: i32,
    pub is_active: i32,
    pub cron_expression: Option<String>,
    pub task_args: String,
    pub scrape_phase: String,
    pub retry_count: i32,
    pub last_run_at: Option<String>,
    pub last_run_success: Option<i32>,
    pub last_run_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    pub fn from_task(t: &Task) -> Result<Self, RepositoryError> {
        Ok(Self {
            id: t.id.clone(),
            name: t.name.clone(),
            crawler_id: t.crawler_id.clone(),
            is_auto: bool_to_int(t.is_auto),
            is_active: bool_to_int(t.is_active),
            cron_expression: t.cron_expression.clone(),
            task_args: serde_json::to_string(&t.task_args)?,
            scrape_phase: t.scrape_phase.as_str().to_string(),
            retry_count: t.retry_count as i32,
            last_run_at: t.last_run_at.map(|dt| dt.to_rfc3339()),
            last_run_success: t.last_run_success.map(bool_to_int),
            last_run_message: t.last_run_message.clone(),
            created_at: t.created_at.to_rfc3339(),
            updated_at: t.updated_at.to_rfc3339(),
        })
    }
}

impl TryFrom<TaskRecord> for Task {
    type Error = RepositoryError;

    fn try_from(r: TaskRecord) -> Result<Self, Self::Error> {
        let task_args: TaskArgs = serde_json::from_str(&r.task_args)?;
        Ok(Task {
            id: r.id,
            name: r.name,
            crawler_id: r.crawler_id,
            is_auto: int_to_bool(r.is_auto),
            is_active: int_to_bool(r.is_active),
            cron_expression: r.cron_expression,
            task_args,
            scrape_phase: ScrapePhase::from_str(&r.scrape_phase).unwrap_or(ScrapePhase::Unknown),
            retry_count: r.retry_count as u32,
            last_run_at: parse_datetime_opt(r.last_run_at),
            last_run_success: r.last_run_success.map(int_to_bool),
            last_run_message: r.last_run_message,
            created_at: parse_datetime(&r.created_at),
            updated_at: parse_datetime(&r.updated_at),
        })
    }
}

// ---------------------------------------------------------------------
// Task history
// ---------------------------------------------------------------------

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::task_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TaskHistoryRecord {
    pub id: i32,
    pub task_id: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub success: Option<i32>,
    pub articles_count: Option<i32>,
    pub message: Option<String>,
    pub task_status: String,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = schema::task_history)]
pub struct TaskHistoryRow {
    pub task_id: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub success: Option<i32>,
    pub articles_count: Option<i32>,
    pub message: Option<String>,
    pub task_status: String,
}

impl From<&TaskHistory> for TaskHistoryRow {
    fn from(h: &TaskHistory) -> Self {
        Self {
            task_id: h.task_id.clone(),
            start_time: h.start_time.to_rfc3339(),
            end_time: h.end_time.map(|dt| dt.to_rfc3339()),
            success: h.success.map(bool_to_int),
            articles_count: h.articles_count.map(|n| n as i32),
            message: h.message.clone(),
            task_status: h.task_status.as_str().to_string(),
        }
    }
}

impl From<TaskHistoryRecord> for TaskHistory {
    fn from(r: TaskHistoryRecord) -> Self {
        TaskHistory {
            id: r.id as i64,
            task_id: r.task_id,
            start_time: parse_datetime(&r.start_time),
            end_time: parse_datetime_opt(r.end_time),
            success: r.success.map(int_to_bool),
            articles_count: r.articles_count.map(|n| n as u32),
            message: r.message,
            task_status: TaskStatus::from_str(&r.task_status).unwrap_or(TaskStatus::Init),
        }
    }
}

// ---------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::articles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    pub link: String,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub article_type: Option<String>,
    pub tags: String,
    pub keywords: String,
    pub published_at: Option<String>,
    pub is_ai_related: i32,
    pub is_scraped: i32,
    pub scrape_status: String,
    pub scrape_error: Option<String>,
    pub last_scrape_attempt: Option<String>,
    pub task_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = schema::articles)]
pub struct ArticleRow {
    pub id: String,
    pub title: String,
    pub link: String,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub article_type: Option<String>,
    pub tags: String,
    pub keywords: String,
    pub published_at: Option<String>,
    pub is_ai_related: i32,
    pub is_scraped: i32,
    pub scrape_status: String,
    pub scrape_error: Option<String>,
    pub last_scrape_attempt: Option<String>,
    pub task_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ArticleRow {
    pub fn from_article(a: &Article) -> Result<Self, RepositoryError> {
        Ok(Self {
            id: a.id.clone(),
            title: a.title.clone(),
            link: a.link.clone(),
            source: a.source.clone(),
            source_url: a.source_url.clone(),
            summary: a.summary.clone(),
            content: a.content.clone(),
            category: a.category.clone(),
            author: a.author.clone(),
            article_type: a.article_type.clone(),
            tags: serde_json::to_string(&a.tags)?,
            keywords: serde_json::to_string(&a.keywords)?,
            published_at: a.published_at.map(|dt| dt.to_rfc3339()),
            is_ai_related: bool_to_int(a.is_ai_related),
            is_scraped: bool_to_int(a.is_scraped),
            scrape_status: a.scrape_status.as_str().to_string(),
            scrape_error: a.scrape_error.clone(),
            last_scrape_attempt: a.last_scrape_attempt.map(|dt| dt.to_rfc3339()),
            task_id: a.task_id.clone(),
            created_at: a.created_at.to_rfc3339(),
            updated_at: a.updated_at.to_rfc3339(),
        })
    }
}

impl TryFrom<ArticleRecord> for Article {
    type Error = RepositoryError;

    fn try_from(r: ArticleRecord) -> Result<Self, Self::Error> {
        Ok(Article {
            id: r.id,
            title: r.title,
            link: r.link,
            source: r.source,
            source_url: r.source_url,
            summary: r.summary,
            content: r.content,
            category: r.category,
            author: r.author,
            article_type: r.article_type,
            tags: serde_json::from_str(&r.tags).unwrap_or_default(),
            keywords: serde_json::from_str(&r.keywords).unwrap_or_default(),
            published_at: parse_datetime_opt(r.published_at),
            is_ai_related: int_to_bool(r.is_ai_related),
            is_scraped: int_to_bool(r.is_scraped),
            scrape_status: ArticleScrapeStatus::from_str(&r.scrape_status)
                .unwrap_or(ArticleScrapeStatus::Pending),
            scrape_error: r.scrape_error,
            last_scrape_attempt: parse_datetime_opt(r.last_scrape_attempt),
            task_id: r.task_id,
            created_at: parse_datetime(&r.created_at),
            updated_at: parse_datetime(&r.updated_at),
        })
    }
}
