//! Crawler — a registered scraping backend (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered scraping backend bound to zero or more tasks.
///
/// Lifecycle: created by an operator, referenced by tasks, soft-disabled via
/// `active=false`. Never cascade-deleted while referenced — the repository
/// layer enforces that as a foreign-key constraint, not this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crawler {
    pub id: String,
    pub name: String,
    pub module_name: String,
    pub base_url: String,
    pub crawler_type: String,
    pub config_file_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Crawler {
    pub fn new(
        name: impl Into<String>,
        module_name: impl Into<String>,
        base_url: impl Into<String>,
        crawler_type: impl Into<String>,
        config_file_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            module_name: module_name.into(),
            base_url: base_url.into(),
            crawler_type: crawler_type.into(),
            config_file_name: config_file_name.into(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
