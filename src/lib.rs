//! newsloom: the crawler task orchestration core for a news-article
//! ingestion system (spec §1). This crate owns the task state machine,
//! retry coordination, progress broadcasting, due-task scheduling query,
//! and article/task persistence; it does not own site-specific scraping,
//! HTTP plumbing, or a CLI/HTTP surface beyond the thin binary in `main.rs`.

pub mod cron;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod progress;
pub mod repository;
pub mod retry;
pub mod runner;
pub mod scheduler;
pub mod schema;
pub mod task_service;
pub mod validation;

pub use error::{CoreError, CoreResult, Envelope};
pub use models::{Article, ArticleScrapeStatus, Crawler, ScrapeMode, ScrapePhase, Task, TaskArgs, TaskHistory, TaskStatus};
pub use repository::DbContext;
pub use runner::{CancelRegistry, RunResult, TaskRunner};
pub use task_service::TaskService;
