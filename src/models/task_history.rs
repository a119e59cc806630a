//! TaskHistory — one row per execution attempt (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskStatus;

/// One row per execution attempt of a `Task`.
///
/// Created when a run begins; `end_time` plus a terminal `task_status` are
/// written when the run terminates (success, failure, or cancel). Never
/// mutated after reaching a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHistory {
    pub id: i64,
    pub task_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub success: Option<bool>,
    pub articles_count: Option<u32>,
    pub message: Option<String>,
    pub task_status: TaskStatus,
}

impl TaskHistory {
    pub fn started(task_id: impl Into<String>) -> Self {
        Self {
            id: 0,
            task_id: task_id.into(),
            start_time: Utc::now(),
            end_time: None,
            success: None,
            articles_count: None,
            message: None,
            task_status: TaskStatus::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.task_status.is_terminal()
    }
}
