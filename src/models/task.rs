//! Task — a scheduled or on-demand scrape job bound to one Crawler (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ScrapePhase, TaskArgs};

/// A scheduled or on-demand scrape job.
///
/// Invariants (enforced by the Task Service Facade / Validation Layer, not
/// by this struct alone): `is_auto=true` implies a non-null, valid cron
/// expression; `retry_count <= task_args.max_retries`; `crawler_id`
/// references an existing `Crawler`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub crawler_id: String,
    pub is_auto: bool,
    pub is_active: bool,
    pub cron_expression: Option<String>,
    pub task_args: TaskArgs,
    pub scrape_phase: ScrapePhase,
    pub retry_count: u32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_success: Option<bool>,
    pub last_run_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(name: impl Into<String>, crawler_id: impl Into<String>, task_args: TaskArgs) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            crawler_id: crawler_id.into(),
            is_auto: false,
            is_active: true,
            cron_expression: None,
            task_args,
            scrape_phase: ScrapePhase::Init,
            retry_count: 0,
            last_run_at: None,
            last_run_success: None,
            last_run_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Invariant 2 from spec §8: `retry_count <= task_args.max_retries`.
    pub fn retry_count_within_budget(&self) -> bool {
        self.retry_count <= self.task_args.max_retries
    }
}
