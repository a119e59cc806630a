//! Data models for the crawler task orchestration core.

mod article;
mod crawler;
mod enums;
mod task;
mod task_args;
mod task_history;

pub use article::Article;
pub use crawler::Crawler;
pub use enums::{ArticleScrapeStatus, ScrapeMode, ScrapePhase, TaskStatus};
pub use task::Task;
pub use task_args::TaskArgs;
pub use task_history::TaskHistory;
