//! Article — a scraped artifact, keyed for idempotency on `link` (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ArticleScrapeStatus;

/// A scraped news article.
///
/// Invariants: `link` is unique and is the sole idempotency key for upsert;
/// `is_scraped=true ⇔ scrape_status ∈ {CONTENT_SCRAPED, PARTIAL_SAVED}`;
/// `scrape_status=FAILED ⇒ scrape_error` populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
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
    pub tags: Vec<String>,
    /// Keywords matched by the AI-relevance filter during link collection;
    /// supplements `find_advanced(keywords?)` with something concrete to
    /// match against (see SPEC_FULL.md §3).
    pub keywords: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_ai_related: bool,
    pub is_scraped: bool,
    pub scrape_status: ArticleScrapeStatus,
    pub scrape_error: Option<String>,
    pub last_scrape_attempt: Option<DateTime<Utc>>,
    pub task_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Seed row for a freshly-discovered link (spec §4.E LINK_COLLECTION).
    pub fn seed_from_link(link: impl Into<String>, task_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: String::new(),
            link: link.into(),
            source: None,
            source_url: None,
            summary: None,
            content: None,
            category: None,
            author: None,
            article_type: None,
            tags: Vec::new(),
            keywords: Vec::new(),
            published_at: None,
            is_ai_related: false,
            is_scraped: false,
            scrape_status: ArticleScrapeStatus::LinkSaved,
            scrape_error: None,
            last_scrape_attempt: None,
            task_id: Some(task_id.into()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Minimal seed row used by the CONTENT_ONLY acquisition path when an
    /// explicit `article_links` entry has no existing DB row (spec §4.E).
    pub fn minimal_seed(link: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: String::new(),
            link: link.into(),
            source: None,
            source_url: None,
            summary: None,
            content: None,
            category: None,
            author: None,
            article_type: None,
            tags: Vec::new(),
            keywords: Vec::new(),
            published_at: None,
            is_ai_related: false,
            is_scraped: false,
            scrape_status: ArticleScrapeStatus::Pending,
            scrape_error: None,
            last_scrape_attempt: None,
            task_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Invariant 1 from spec §8.
    pub fn satisfies_scrape_invariant(&self) -> bool {
        self.is_scraped == self.scrape_status.implies_scraped()
    }

    /// Invariant from spec §3: `scrape_status=FAILED ⇒ scrape_error` populated.
    pub fn satisfies_failure_invariant(&self) -> bool {
        self.scrape_status != ArticleScrapeStatus::Failed || self.scrape_error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_link_row_starts_unscraped_and_link_saved() {
        let article = Article::seed_from_link("https://example.com/a", "task-1");
        assert!(!article.is_scraped);
        assert_eq!(article.scrape_status, ArticleScrapeStatus::LinkSaved);
        assert!(article.satisfies_scrape_invariant());
    }

    #[test]
    fn minimal_seed_is_pending_and_unscraped() {
        let article = Article::minimal_seed("https://example.com/b");
        assert_eq!(article.scrape_status, ArticleScrapeStatus::Pending);
        assert!(article.satisfies_scrape_invariant());
        assert!(article.task_id.is_none());
    }
}
