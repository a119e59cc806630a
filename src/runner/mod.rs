//! Task Runner (spec §4.E): the core state machine that executes a single
//! task end-to-end for one caller invocation.

pub mod csv_sink;
pub mod table;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;

use crate::fetcher::SiteFetcher;
use crate::models::{Article, ArticleScrapeStatus, ScrapeMode, ScrapePhase};
use crate::progress::{compute_percent, ProgressBroadcaster, ProgressPayload};
use crate::repository::{ArticleFilter, ArticleStore};
use crate::retry::{retry, CancelToken};
use crate::validation::{validate_task_args, ValidationError};

use table::ArticleTable;

/// Registry of cancel tokens for in-flight runs, keyed by task id. Shared
/// between the Task Service Facade (`cancel_task`) and whichever
/// `TaskRunner` instance owns a given run (spec §5).
#[derive(Clone, Default)]
pub struct CancelRegistry {
    inner: Arc<AsyncMutex<HashMap<String, CancelToken>>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, task_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.inner
            .lock()
            .await
            .insert(task_id.to_string(), token.clone());
        token
    }

    pub async fn unregister(&self, task_id: &str) {
        self.inner.lock().await.remove(task_id);
    }

    /// Idempotent: cancelling a task with no registered run (already
    /// terminal, or never started) returns `false` without effect.
    pub async fn cancel(&self, task_id: &str) -> bool {
        let guard = self.inner.lock().await;
        match guard.get(task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Outcome of a single `TaskRunner::run` invocation (spec §4.E "Result").
#[derive(Debug, Clone)]
pub struct RunResult {
    pub success: bool,
    pub message: String,
    pub articles_count: u32,
    pub scrape_phase: ScrapePhase,
    pub get_links_by_task_id: bool,
    pub partial_data_saved: Option<bool>,
}

impl RunResult {
    fn completed(success: bool, message: impl Into<String>, count: usize) -> Self {
        Self {
            success,
            message: message.into(),
            articles_count: count as u32,
            scrape_phase: ScrapePhase::Completed,
            get_links_by_task_id: true,
            partial_data_saved: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            articles_count: 0,
            scrape_phase: ScrapePhase::Failed,
            get_links_by_task_id: false,
            partial_data_saved: None,
        }
    }

    fn cancelled(message: impl Into<String>, partial_data_saved: bool) -> Self {
        Self {
            success: false,
            message: message.into(),
            articles_count: 0,
            scrape_phase: ScrapePhase::Cancelled,
            get_links_by_task_id: false,
            partial_data_saved: Some(partial_data_saved),
        }
    }
}

/// Minimum table size for a cancel-time partial save to kick in (spec §4.E).
const PARTIAL_SAVE_MIN_ROWS: usize = 5;

pub struct TaskRunner<F, S> {
    fetcher: Arc<F>,
    store: Arc<S>,
    broadcaster: ProgressBroadcaster,
    logs_dir: PathBuf,
}

impl<F, S> TaskRunner<F, S>
where
    F: SiteFetcher,
    S: ArticleStore,
{
    pub fn new(fetcher: Arc<F>, store: Arc<S>, broadcaster: ProgressBroadcaster) -> Self {
        Self {
            fetcher,
            store,
            broadcaster,
            logs_dir: PathBuf::from("./logs"),
        }
    }

    pub fn with_logs_dir(mut self, logs_dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = logs_dir.into();
        self
    }

    fn publish(&self, task_id: &str, phase: ScrapePhase, stage: Option<&str>, sub: f64, message: &str) {
        self.broadcaster.notify(
            task_id,
            &ProgressPayload {
                scrape_phase: phase,
                progress: compute_percent(stage, sub),
                message: message.to_string(),
                start_time: Utc::now(),
            },
        );
    }

    /// Execute `task_id` end-to-end. `task_args` has already been persisted;
    /// this call only needs its validated, typed form plus injected
    /// dependencies and a cancel token obtained from a `CancelRegistry`.
    pub async fn run(
        &self,
        task_id: &str,
        raw_task_args: &serde_json::Value,
        cancel_token: CancelToken,
    ) -> RunResult {
        let task_args = match validate_task_args(raw_task_args) {
            Ok(args) => args,
            Err(ValidationError { field, message }) => {
                return RunResult::failed(format!("{field}: {message}"));
            }
        };

        let max_retries = task_args.max_retries;
        let retry_delay = Duration::from_secs_f64(task_args.retry_delay.max(0.0));

        let mut table = ArticleTable::new();

        self.publish(task_id, ScrapePhase::Init, None, 0.0, "starting");

        match task_args.scrape_mode {
            ScrapeMode::LinksOnly => {
                if cancel_token.is_cancelled() {
                    return self.handle_cancel(task_id, &table, &task_args).await;
                }
                match self.collect_links(task_id, &cancel_token, max_retries, retry_delay, &mut table).await {
                    LinkOutcome::Cancelled => return self.handle_cancel(task_id, &table, &task_args).await,
                    LinkOutcome::Empty => {
                        return RunResult::completed(false, "沒有獲取到任何文章連結", 0)
                    }
                    LinkOutcome::Failed(msg) => return RunResult::failed(msg),
                    LinkOutcome::Collected => {}
                }
            }
            ScrapeMode::ContentOnly => {
                if cancel_token.is_cancelled() {
                    return self.handle_cancel(task_id, &table, &task_args).await;
                }
                let acquired = self
                    .acquire_links_from_source(task_id, &task_args, &mut table)
                    .await;
                if let Err(msg) = acquired {
                    return RunResult::failed(msg);
                }
                if table.is_empty() {
                    return RunResult::completed(false, "沒有獲取到任何文章連結", 0);
                }

                if cancel_token.is_cancelled() {
                    return self.handle_cancel(task_id, &table, &task_args).await;
                }
                let links: Vec<String> = table.rows().iter().map(|a| a.link.clone()).collect();
                match self
                    .scrape_content(task_id, &links, &cancel_token, max_retries, retry_delay, &mut table)
                    .await
                {
                    ContentOutcome::Cancelled => return self.handle_cancel(task_id, &table, &task_args).await,
                    ContentOutcome::Failed(msg) => return RunResult::failed(msg),
                    ContentOutcome::Empty | ContentOutcome::Scraped => {}
                }
            }
            ScrapeMode::FullScrape => {
                if cancel_token.is_cancelled() {
                    return self.handle_cancel(task_id, &table, &task_args).await;
                }
                match self.collect_links(task_id, &cancel_token, max_retries, retry_delay, &mut table).await {
                    LinkOutcome::Cancelled => return self.handle_cancel(task_id, &table, &task_args).await,
                    LinkOutcome::Empty => {
                        return RunResult::completed(false, "沒有獲取到任何文章連結", 0)
                    }
                    LinkOutcome::Failed(msg) => return RunResult::failed(msg),
                    LinkOutcome::Collected => {}
                }

                if cancel_token.is_cancelled() {
                    return self.handle_cancel(task_id, &table, &task_args).await;
                }
                let links: Vec<String> = table.rows().iter().map(|a| a.link.clone()).collect();
                match self
                    .scrape_content(task_id, &links, &cancel_token, max_retries, retry_delay, &mut table)
                    .await
                {
                    ContentOutcome::Cancelled => return self.handle_cancel(task_id, &table, &task_args).await,
                    ContentOutcome::Failed(msg) => return RunResult::failed(msg),
                    ContentOutcome::Empty | ContentOutcome::Scraped => {}
                }
            }
        }

        if cancel_token.is_cancelled() {
            return self.handle_cancel(task_id, &table, &task_args).await;
        }

        self.publish(task_id, ScrapePhase::SaveToCsv, Some("update_dataframe"), 1.0, "reconciling");

        let rows = table.into_rows();
        let count = rows.len();

        if let Err(msg) = self.run_save_phases(task_id, &task_args, &rows).await {
            return RunResult::failed(msg);
        }

        self.publish(task_id, ScrapePhase::Completed, Some("save_to_database"), 1.0, "done");

        RunResult::completed(true, "scrape completed", count)
    }

    async fn collect_links(
        &self,
        task_id: &str,
        cancel_token: &CancelToken,
        max_retries: u32,
        retry_delay: Duration,
        table: &mut ArticleTable,
    ) -> LinkOutcome {
        self.publish(task_id, ScrapePhase::LinkCollection, Some("fetch_links"), 0.0, "fetching links");

        let result = retry(
            || self.fetcher.fetch_links(task_id, cancel_token),
            max_retries,
            retry_delay,
            cancel_token,
        )
        .await;

        match result {
            Ok(rows) if rows.is_empty() => LinkOutcome::Empty,
            Ok(rows) => {
                for mut row in rows {
                    row.is_scraped = false;
                    row.scrape_status = ArticleScrapeStatus::LinkSaved;
                    row.task_id = Some(task_id.to_string());
                    table.insert(row);
                }
                self.publish(task_id, ScrapePhase::LinkCollection, Some("fetch_links"), 1.0, "links collected");
                LinkOutcome::Collected
            }
            Err(crate::error::CoreError::Cancelled(_)) => LinkOutcome::Cancelled,
            Err(e) => LinkOutcome::Failed(e.to_string()),
        }
    }

    async fn acquire_links_from_source(
        &self,
        task_id: &str,
        task_args: &crate::models::TaskArgs,
        table: &mut ArticleTable,
    ) -> Result<(), String> {
        self.publish(task_id, ScrapePhase::LinkCollection, Some("fetch_links"), 0.0, "acquiring links");

        if task_args.get_links_by_task_id {
            let mut filter = ArticleFilter::new();
            filter.task_id = Some(task_id.to_string());
            filter.is_scraped = Some(false);
            filter.limit = 10_000;
            let page = self.store.find_advanced(&filter).await.map_err(|e| e.to_string())?;
            for article in page.items {
                table.insert(article);
            }
        } else {
            for link in &task_args.article_links {
                match self.store.find_by_link(link).await.map_err(|e| e.to_string())? {
                    Some(existing) => table.insert(existing),
                    None => table.insert(Article::minimal_seed(link.clone())),
                }
            }
        }

        Ok(())
    }

    async fn scrape_content(
        &self,
        task_id: &str,
        links: &[String],
        cancel_token: &CancelToken,
        max_retries: u32,
        retry_delay: Duration,
        table: &mut ArticleTable,
    ) -> ContentOutcome {
        self.publish(task_id, ScrapePhase::ContentScraping, Some("fetch_contents"), 0.0, "fetching content");

        let result = retry(
            || self.fetcher.fetch_articles(task_id, links, cancel_token),
            max_retries,
            retry_delay,
            cancel_token,
        )
        .await;

        match result {
            Ok(rows) if rows.is_empty() => {
                self.publish(task_id, ScrapePhase::ContentScraping, Some("fetch_contents"), 1.0, "no content obtained");
                ContentOutcome::Empty
            }
            Ok(rows) => {
                self.publish(task_id, ScrapePhase::ContentScraping, Some("fetch_contents"), 0.5, "merging content");
                table.merge_content(&rows);
                self.publish(task_id, ScrapePhase::ContentScraping, Some("fetch_contents"), 1.0, "content merged");
                ContentOutcome::Scraped
            }
            Err(crate::error::CoreError::Cancelled(_)) => ContentOutcome::Cancelled,
            Err(e) => ContentOutcome::Failed(e.to_string()),
        }
    }

    async fn run_save_phases(
        &self,
        task_id: &str,
        task_args: &crate::models::TaskArgs,
        rows: &[Article],
    ) -> Result<(), String> {
        if task_args.save_to_csv {
            csv_sink::write_normal(&self.logs_dir, &task_args.csv_file_prefix, task_id, rows)
                .map_err(|e| e.to_string())?;
            self.publish(task_id, ScrapePhase::SaveToCsv, Some("save_to_csv"), 1.0, "csv written");
        }

        if task_args.save_to_database {
            let mut stamped: Vec<Article> = rows.to_vec();
            for article in &mut stamped {
                if article.task_id.is_none() {
                    article.task_id = Some(task_id.to_string());
                }
            }

            let use_upsert = task_args.get_links_by_task_id || task_args.scrape_mode == ScrapeMode::ContentOnly;
            let batch_result = if use_upsert {
                self.store.batch_upsert_by_link(&stamped).await.map_err(|e| e.to_string())?
            } else {
                self.store.batch_create(&stamped).await.map_err(|e| e.to_string())?
            };
            for (link, err) in &batch_result.errors {
                tracing::warn!(task_id, link, error = %err, "article row failed to persist, continuing batch");
            }
            self.publish(task_id, ScrapePhase::SaveToDatabase, Some("save_to_database"), 1.0, "database written");
        }

        Ok(())
    }

    async fn handle_cancel(
        &self,
        task_id: &str,
        table: &ArticleTable,
        task_args: &crate::models::TaskArgs,
    ) -> RunResult {
        self.publish(task_id, ScrapePhase::Cancelled, None, 0.0, "cancelled");

        let mut partial_data_saved = false;

        if task_args.save_partial_results_on_cancel && table.len() >= PARTIAL_SAVE_MIN_ROWS {
            let rows = table.rows_cloned();

            if task_args.save_to_csv {
                if csv_sink::write_cancelled(&self.logs_dir, &task_args.csv_file_prefix, task_id, &rows)
                    .ok()
                    .flatten()
                    .is_some()
                {
                    partial_data_saved = true;
                }
            }

            if task_args.save_to_database && task_args.save_partial_to_database {
                let scraped_rows: Vec<Article> = rows
                    .into_iter()
                    .filter(|a| a.is_scraped)
                    .map(|mut a| {
                        a.scrape_status = ArticleScrapeStatus::PartialSaved;
                        if a.task_id.is_none() {
                            a.task_id = Some(task_id.to_string());
                        }
                        a
                    })
                    .collect();
                if !scraped_rows.is_empty() {
                    if self.store.batch_upsert_by_link(&scraped_rows).await.is_ok() {
                        partial_data_saved = true;
                    }
                }
            }
        }

        let message = if partial_data_saved {
            "任務已取消，已儲存部分資料".to_string()
        } else {
            "任務已取消".to_string()
        };

        RunResult::cancelled(message, partial_data_saved)
    }
}

enum LinkOutcome {
    Collected,
    Empty,
    Cancelled,
    Failed(String),
}

enum ContentOutcome {
    Scraped,
    Empty,
    Cancelled,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::test_support::{Scripted, ScriptedFetcher};
    use crate::fetcher::FetchError;
    use crate::repository::{DbContext, DieselArticleStore};
    use async_trait::async_trait;
    use serde_json::json;

    async fn runner_with_fetcher<F: SiteFetcher>(
        fetcher: F,
    ) -> (TaskRunner<F, DieselArticleStore>, DbContext, tempfile::TempDir) {
        let db = DbContext::in_memory().await.expect("in-memory db");
        let store = Arc::new(db.articles());
        let broadcaster = ProgressBroadcaster::new();
        let logs_dir = tempfile::tempdir().expect("tempdir");
        let runner = TaskRunner::new(Arc::new(fetcher), store, broadcaster)
            .with_logs_dir(logs_dir.path());
        (runner, db, logs_dir)
    }

    /// Spec §8 scenario 1: empty link-collection ends cleanly.
    #[tokio::test]
    async fn empty_link_collection_ends_cleanly() {
        let (runner, _db, _dir) = runner_with_fetcher(ScriptedFetcher::new()).await;
        let args = json!({"scrape_mode": "full_scrape"});
        let result = runner.run("task-1", &args, CancelToken::new()).await;

        assert!(!result.success);
        assert!(result.message.contains("沒有獲取到"));
        assert_eq!(result.articles_count, 0);
        assert_eq!(result.scrape_phase, ScrapePhase::Completed);
    }

    /// Spec §8 scenario 2: retry then succeed — one transient failure,
    /// then two links; content-scraping returns nothing (non-fatal), the
    /// links are persisted via `batch_create` (mode is `FULL_SCRAPE`, so
    /// `get_links_by_task_id` is false going in).
    #[tokio::test]
    async fn retry_then_succeed_persists_links() {
        let fetcher = ScriptedFetcher::new()
            .with_links(vec![
                Scripted::Err(FetchError::Failed("timeout".to_string())),
                Scripted::Ok(vec![
                    Article::seed_from_link("https://example.com/a", "task-2"),
                    Article::seed_from_link("https://example.com/b", "task-2"),
                ]),
            ])
            .with_articles(vec![Scripted::Ok(vec![])]);
        let (runner, db, _dir) = runner_with_fetcher(fetcher).await;

        let args = json!({
            "scrape_mode": "full_scrape",
            "max_retries": 2,
            "retry_delay": 0.01,
            "save_to_database": true,
        });
        let result = runner.run("task-2", &args, CancelToken::new()).await;

        assert!(result.success);
        assert_eq!(result.articles_count, 2);

        let page = db
            .articles()
            .find_advanced(&ArticleFilter::new())
            .await
            .expect("query");
        assert_eq!(page.items.len(), 2);
    }

    /// A fetcher whose `fetch_links` hands back a batch of links and, as
    /// part of that same call, flips the cancel token — modeling a cancel
    /// request that lands exactly between LINK_COLLECTION finishing and
    /// CONTENT_SCRAPING starting (spec §8 scenario 3).
    struct CancelOnLinksFetcher {
        links: Vec<Article>,
    }

    #[async_trait]
    impl SiteFetcher for CancelOnLinksFetcher {
        async fn fetch_links(
            &self,
            _task_id: &str,
            cancel_token: &CancelToken,
        ) -> Result<Vec<Article>, FetchError> {
            cancel_token.cancel();
            Ok(self.links.clone())
        }

        async fn fetch_articles(
            &self,
            _task_id: &str,
            _links: &[String],
            _cancel_token: &CancelToken,
        ) -> Result<Vec<Article>, FetchError> {
            panic!("fetch_articles should never run once cancelled before CONTENT_SCRAPING");
        }
    }

    /// Spec §8 scenario 3: cancel mid-fetch with partial save.
    #[tokio::test]
    async fn cancel_with_partial_save_writes_csv() {
        let links: Vec<Article> = (0..6)
            .map(|i| Article::seed_from_link(format!("https://example.com/{i}"), "task-3"))
            .collect();
        let fetcher = CancelOnLinksFetcher { links };
        let (runner, _db, dir) = runner_with_fetcher(fetcher).await;

        let args = json!({
            "scrape_mode": "full_scrape",
            "save_partial_results_on_cancel": true,
            "save_to_csv": true,
        });
        let result = runner.run("task-3", &args, CancelToken::new()).await;

        assert!(!result.success);
        assert_eq!(result.scrape_phase, ScrapePhase::Cancelled);
        assert_eq!(result.partial_data_saved, Some(true));

        let has_cancelled_csv = std::fs::read_dir(dir.path())
            .expect("read logs dir")
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().contains("_cancelled_task-3_"));
        assert!(has_cancelled_csv);
    }

    /// Spec §8 scenario 4: content-only from DB links — two unscraped
    /// articles already bound to the task are picked up via
    /// `get_links_by_task_id`, scraped, and upserted back by link.
    #[tokio::test]
    async fn content_only_from_db_links_upserts_scraped_content() {
        let db = DbContext::in_memory().await.expect("in-memory db");
        let store = db.articles();
        let mut first = Article::seed_from_link("https://example.com/x", "task-4");
        first.scrape_status = ArticleScrapeStatus::LinkSaved;
        let mut second = Article::seed_from_link("https://example.com/y", "task-4");
        second.scrape_status = ArticleScrapeStatus::LinkSaved;
        store
            .batch_create(&[first.clone(), second.clone()])
            .await
            .expect("seed articles");

        let mut scraped_first = first.clone();
        scraped_first.content = Some("content x".to_string());
        scraped_first.scrape_status = ArticleScrapeStatus::ContentScraped;
        scraped_first.is_scraped = true;
        let mut scraped_second = second.clone();
        scraped_second.content = Some("content y".to_string());
        scraped_second.scrape_status = ArticleScrapeStatus::ContentScraped;
        scraped_second.is_scraped = true;

        let fetcher = ScriptedFetcher::new()
            .with_articles(vec![Scripted::Ok(vec![scraped_first, scraped_second])]);
        let broadcaster = ProgressBroadcaster::new();
        let logs_dir = tempfile::tempdir().expect("tempdir");
        let runner = TaskRunner::new(Arc::new(fetcher), Arc::new(db.articles()), broadcaster)
            .with_logs_dir(logs_dir.path());

        let args = json!({
            "scrape_mode": "content_only",
            "get_links_by_task_id": true,
            "save_to_database": true,
        });
        let result = runner.run("task-4", &args, CancelToken::new()).await;

        assert!(result.success);
        assert_eq!(result.articles_count, 2);

        let found_x = store
            .find_by_link("https://example.com/x")
            .await
            .expect("query")
            .expect("present");
        assert!(found_x.is_scraped);
        assert_eq!(found_x.scrape_status, ArticleScrapeStatus::ContentScraped);
        assert_eq!(found_x.content.as_deref(), Some("content x"));
    }
}
