//! The in-memory, link-keyed article table the Task Runner builds up across
//! LINK_COLLECTION and CONTENT_SCRAPING (spec §4.E, §9 "DataFrame-shaped
//! table"). Row-oriented: a `HashMap<link, Article>` already gives O(1)
//! join-by-link, which is the only structural requirement spec §9 names.

use std::collections::HashMap;

use crate::models::{Article, ArticleScrapeStatus};

/// Row-oriented table keyed by `link`, preserving first-seen insertion
/// order for deterministic CSV output.
#[derive(Debug, Default, Clone)]
pub struct ArticleTable {
    order: Vec<String>,
    rows: HashMap<String, Article>,
}

impl ArticleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn insert(&mut self, article: Article) {
        if !self.rows.contains_key(&article.link) {
            self.order.push(article.link.clone());
        }
        self.rows.insert(article.link.clone(), article);
    }

    pub fn get(&self, link: &str) -> Option<&Article> {
        self.rows.get(link)
    }

    /// Rows in first-seen order — the order CSV output and DB batch writes
    /// use, so runs are reproducible given the same fetcher script.
    pub fn rows(&self) -> Vec<&Article> {
        self.order
            .iter()
            .filter_map(|link| self.rows.get(link))
            .collect()
    }

    /// Clone of `rows()`, for callers holding only a shared reference.
    pub fn rows_cloned(&self) -> Vec<Article> {
        self.rows().into_iter().cloned().collect()
    }

    pub fn into_rows(self) -> Vec<Article> {
        self.order
            .into_iter()
            .filter_map(|link| self.rows.get(&link).cloned())
            .collect()
    }

    /// Merge `incoming` content rows into this table by `link` (spec §4.E
    /// merge algorithm): left join keyed on the table side, incoming
    /// non-null fields win, booleans coerced, and `scrape_status` from the
    /// incoming row is authoritative for the reconciliation rules below.
    /// Incoming rows with no matching table entry are ignored — the table
    /// side is the join anchor.
    pub fn merge_content(&mut self, incoming: &[Article]) {
        for incoming_row in incoming {
            let Some(existing) = self.rows.get_mut(&incoming_row.link) else {
                continue;
            };
            merge_row(existing, incoming_row);
        }
    }

}

/// Apply spec §4.E's column-level merge + status reconciliation rules to a
/// single existing row given its incoming counterpart.
fn merge_row(existing: &mut Article, incoming: &Article) {
    if !incoming.title.is_empty() {
        existing.title = incoming.title.clone();
    }
    if incoming.source.is_some() {
        existing.source = incoming.source.clone();
    }
    if incoming.source_url.is_some() {
        existing.source_url = incoming.source_url.clone();
    }
    if incoming.summary.is_some() {
        existing.summary = incoming.summary.clone();
    }
    if incoming.content.is_some() {
        existing.content = incoming.content.clone();
    }
    if incoming.category.is_some() {
        existing.category = incoming.category.clone();
    }
    if incoming.author.is_some() {
        existing.author = incoming.author.clone();
    }
    if incoming.article_type.is_some() {
        existing.article_type = incoming.article_type.clone();
    }
    if !incoming.tags.is_empty() {
        existing.tags = incoming.tags.clone();
    }
    if !incoming.keywords.is_empty() {
        existing.keywords = incoming.keywords.clone();
    }
    if incoming.published_at.is_some() {
        existing.published_at = incoming.published_at;
    }
    if incoming.last_scrape_attempt.is_some() {
        existing.last_scrape_attempt = incoming.last_scrape_attempt;
    }

    // `is_ai_related`/`is_scraped` are coerced booleans on overwrite; since
    // both sides are already `bool`, "overwrite" is simply taking the
    // incoming value when the incoming row actually reports one (we treat
    // any row present in `incoming` as reporting both flags).
    existing.is_ai_related = incoming.is_ai_related;

    match incoming.scrape_status {
        ArticleScrapeStatus::ContentScraped => {
            existing.is_scraped = true;
            existing.scrape_status = ArticleScrapeStatus::ContentScraped;
        }
        ArticleScrapeStatus::Failed => {
            existing.is_scraped = false;
            existing.scrape_status = ArticleScrapeStatus::Failed;
            existing.scrape_error = incoming.scrape_error.clone();
            existing.last_scrape_attempt = incoming.last_scrape_attempt;
        }
        _ => {
            existing.is_scraped = incoming.is_scraped;
        }
    }

    existing.updated_at = incoming.updated_at;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(link: &str) -> Article {
        Article::seed_from_link(link, "task-1")
    }

    #[test]
    fn merge_prefers_incoming_non_null_and_preserves_existing_nulls() {
        let mut table = ArticleTable::new();
        table.insert(seeded("https://example.com/a"));

        let mut incoming = seeded("https://example.com/a");
        incoming.title = "Headline".to_string();
        incoming.summary = Some("Summary".to_string());
        incoming.content = None;
        incoming.scrape_status = ArticleScrapeStatus::ContentScraped;

        table.merge_content(&[incoming]);

        let row = table.get("https://example.com/a").unwrap();
        assert_eq!(row.title, "Headline");
        assert_eq!(row.summary.as_deref(), Some("Summary"));
        assert!(row.content.is_none());
        assert!(row.is_scraped);
        assert_eq!(row.scrape_status, ArticleScrapeStatus::ContentScraped);
    }

    #[test]
    fn merge_reconciles_failed_status_and_preserves_error() {
        let mut table = ArticleTable::new();
        table.insert(seeded("https://example.com/b"));

        let mut incoming = seeded("https://example.com/b");
        incoming.scrape_status = ArticleScrapeStatus::Failed;
        incoming.scrape_error = Some("timeout".to_string());

        table.merge_content(&[incoming]);

        let row = table.get("https://example.com/b").unwrap();
        assert!(!row.is_scraped);
        assert_eq!(row.scrape_status, ArticleScrapeStatus::Failed);
        assert_eq!(row.scrape_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn merge_ignores_incoming_rows_with_no_table_match() {
        let mut table = ArticleTable::new();
        table.insert(seeded("https://example.com/a"));
        table.merge_content(&[seeded("https://example.com/unmatched")]);
        assert_eq!(table.len(), 1);
        assert!(table.get("https://example.com/unmatched").is_none());
    }

    #[test]
    fn rows_preserve_first_seen_order() {
        let mut table = ArticleTable::new();
        table.insert(seeded("https://example.com/c"));
        table.insert(seeded("https://example.com/a"));
        table.insert(seeded("https://example.com/b"));
        let links: Vec<&str> = table.rows().iter().map(|a| a.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/c",
                "https://example.com/a",
                "https://example.com/b",
            ]
        );
    }
}
