//! Site Fetcher (spec §6): the external collaborator that produces link and
//! content rows. This crate owns only the trait boundary and a test double —
//! site-specific HTML selectors and HTTP plumbing are out of scope.

use async_trait::async_trait;

use crate::models::Article;
use crate::retry::CancelToken;

/// A row returned by the fetcher. Partial `Article`s keyed on `link`, with
/// `scrape_status` already set to the outcome of this fetch attempt.
pub type FetchedRow = Article;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch cancelled")]
    Cancelled,
    #[error("fetch failed: {0}")]
    Failed(String),
}

/// External collaborator producing link rows and content rows. Implementors
/// must consult `cancel_token` themselves if a single call spans multiple
/// network round-trips, so retries driven by `retry::retry` observe
/// cancellation promptly.
#[async_trait]
pub trait SiteFetcher: Send + Sync {
    async fn fetch_links(
        &self,
        task_id: &str,
        cancel_token: &CancelToken,
    ) -> Result<Vec<FetchedRow>, FetchError>;

    async fn fetch_articles(
        &self,
        task_id: &str,
        links: &[String],
        cancel_token: &CancelToken,
    ) -> Result<Vec<FetchedRow>, FetchError>;
}

/// Test double used across this crate's own test suite in place of a
/// production, site-specific fetcher. Scripted with a fixed sequence of
/// outcomes per call so tests can exercise retry-then-succeed, empty
/// results, and failure paths deterministically.
pub mod test_support {
    use std::sync::Mutex;

    use super::*;

    pub enum Scripted<T> {
        Ok(T),
        Err(FetchError),
    }

    /// A fetcher whose `fetch_links`/`fetch_articles` responses are
    /// consumed in order from a fixed script; once exhausted, the last
    /// scripted response repeats.
    pub struct ScriptedFetcher {
        links_script: Mutex<Vec<Scripted<Vec<FetchedRow>>>>,
        articles_script: Mutex<Vec<Scripted<Vec<FetchedRow>>>>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self {
                links_script: Mutex::new(Vec::new()),
                articles_script: Mutex::new(Vec::new()),
            }
        }

        pub fn with_links(self, script: Vec<Scripted<Vec<FetchedRow>>>) -> Self {
            *self.links_script.lock().expect("links script lock") = script;
            self
        }

        pub fn with_articles(self, script: Vec<Scripted<Vec<FetchedRow>>>) -> Self {
            *self.articles_script.lock().expect("articles script lock") = script;
            self
        }

        fn next(script: &Mutex<Vec<Scripted<Vec<FetchedRow>>>>) -> Result<Vec<FetchedRow>, FetchError> {
            let mut guard = script.lock().expect("script lock");
            if guard.is_empty() {
                return Ok(Vec::new());
            }
            let next = if guard.len() == 1 {
                // Last scripted response repeats indefinitely.
                match &guard[0] {
                    Scripted::Ok(rows) => Scripted::Ok(rows.clone()),
                    Scripted::Err(FetchError::Cancelled) => Scripted::Err(FetchError::Cancelled),
                    Scripted::Err(FetchError::Failed(msg)) => {
                        Scripted::Err(FetchError::Failed(msg.clone()))
                    }
                }
            } else {
                guard.remove(0)
            };
            match next {
                Scripted::Ok(rows) => Ok(rows),
                Scripted::Err(err) => Err(err),
            }
        }
    }

    impl Default for ScriptedFetcher {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl SiteFetcher for ScriptedFetcher {
        async fn fetch_links(
            &self,
            _task_id: &str,
            cancel_token: &CancelToken,
        ) -> Result<Vec<FetchedRow>, FetchError> {
            if cancel_token.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            Self::next(&self.links_script)
        }

        async fn fetch_articles(
            &self,
            _task_id: &str,
            _links: &[String],
            cancel_token: &CancelToken,
        ) -> Result<Vec<FetchedRow>, FetchError> {
            if cancel_token.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            Self::next(&self.articles_script)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn scripted_fetcher_replays_failure_then_success() {
        let fetcher = ScriptedFetcher::new().with_links(vec![
            Scripted::Err(FetchError::Failed("timeout".to_string())),
            Scripted::Ok(vec![Article::seed_from_link("https://example.com/a", "t1")]),
        ]);
        let token = CancelToken::new();

        let first = fetcher.fetch_links("t1", &token).await;
        assert!(matches!(first, Err(FetchError::Failed(_))));

        let second = fetcher.fetch_links("t1", &token).await.expect("second call ok");
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn scripted_fetcher_respects_cancellation() {
        let fetcher = ScriptedFetcher::new()
            .with_links(vec![Scripted::Ok(vec![Article::seed_from_link("https://example.com/a", "t1")])]);
        let token = CancelToken::new();
        token.cancel();
        let result = fetcher.fetch_links("t1", &token).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
