//! Article store: scraped-article persistence, keyed for idempotency on
//! `link` (spec §3, §4.E SAVE_TO_DATABASE).

use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::{Nullable, Text};
use diesel_async::RunQueryDsl;

use crate::models::{Article, ArticleScrapeStatus};
use crate::schema::articles::dsl as a;

use super::records::{ArticleRecord, ArticleRow};
use super::{RepositoryError, Result, SqlitePool};

/// Column a `find_advanced`/`find_by_keywords` result set may be sorted by
/// (spec §4.B `sort_by?`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleSortBy {
    CreatedAt,
    UpdatedAt,
    PublishedAt,
    Title,
}

/// Filters accepted by `find_advanced`, ANDed together.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub task_id: Option<String>,
    pub is_scraped: Option<bool>,
    pub scrape_status: Option<ArticleScrapeStatus>,
    pub is_ai_related: Option<bool>,
    pub category: Option<String>,
    pub source: Option<String>,
    /// Matches if any of these tags appears in the article's `tags`.
    pub tags: Vec<String>,
    /// Matches if any of these keywords appears in the article's `keywords`.
    pub keywords: Vec<String>,
    pub sort_by: Option<ArticleSortBy>,
    pub sort_desc: bool,
    pub limit: i64,
    pub offset: i64,
}

impl ArticleFilter {
    pub fn new() -> Self {
        Self {
            limit: 50,
            ..Default::default()
        }
    }
}

/// One page of a larger result set, with the total row count matching the
/// filter (not just this page's length) so callers can paginate.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Outcome of a batch write, counting how many rows were newly inserted vs.
/// updated in place by link (spec §4.E's dataframe merge, persisted), plus
/// any per-row failures. A batch never aborts on a row error (spec §4.B,
/// §7 "Partial-failure semantics") — each row is attempted independently
/// and its error, if any, is aggregated here under the row's link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub inserted: usize,
    pub updated: usize,
    pub errors: Vec<(String, String)>,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn find_by_link(&self, link: &str) -> Result<Option<Article>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Article>>;
    async fn find_advanced(&self, filter: &ArticleFilter) -> Result<Page<Article>>;
    /// Insert rows that don't already exist by `link`, via the `link`
    /// unique index's conflict path; never mutates existing rows.
    async fn batch_create(&self, articles: &[Article]) -> Result<BatchResult>;
    /// Insert-or-merge by `link`, via the `link` unique index's conflict
    /// path: a non-null incoming field overwrites the stored one, a null
    /// incoming field leaves the stored one untouched.
    async fn batch_upsert_by_link(&self, articles: &[Article]) -> Result<BatchResult>;
    /// Substring match over `title`, `summary`, and `content` (spec §4.B).
    async fn find_by_keywords(
        &self,
        q: &str,
        limit: i64,
        offset: i64,
        sort_by: Option<ArticleSortBy>,
        sort_desc: bool,
    ) -> Result<Vec<Article>>;
}

pub struct DieselArticleStore {
    pool: SqlitePool,
}

impl DieselArticleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleStore for DieselArticleStore {
    async fn find_by_link(&self, link: &str) -> Result<Option<Article>> {
        let mut conn = self.pool.get().await?;
        let record = a::articles
            .filter(a::link.eq(link))
            .first::<ArticleRecord>(&mut conn)
            .await
            .optional()?;
        record.map(Article::try_from).transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Article>> {
        let mut conn = self.pool.get().await?;
        let record = a::articles
            .filter(a::id.eq(id))
            .first::<ArticleRecord>(&mut conn)
            .await
            .optional()?;
        record.map(Article::try_from).transpose()
    }

    async fn find_advanced(&self, filter: &ArticleFilter) -> Result<Page<Article>> {
        let mut conn = self.pool.get().await?;

        let mut query = a::articles.into_boxed();
        let mut count_query = a::articles.into_boxed();

        if let Some(task_id) = &filter.task_id {
            query = query.filter(a::task_id.eq(task_id.clone()));
            count_query = count_query.filter(a::task_id.eq(task_id.clone()));
        }
        if let Some(is_scraped) = filter.is_scraped {
            query = query.filter(a::is_scraped.eq(is_scraped as i32));
            count_query = count_query.filter(a::is_scraped.eq(is_scraped as i32));
        }
        if let Some(status) = filter.scrape_status {
            query = query.filter(a::scrape_status.eq(status.as_str()));
            count_query = count_query.filter(a::scrape_status.eq(status.as_str()));
        }
        if let Some(ai) = filter.is_ai_related {
            query = query.filter(a::is_ai_related.eq(ai as i32));
            count_query = count_query.filter(a::is_ai_related.eq(ai as i32));
        }
        if let Some(category) = &filter.category {
            query = query.filter(a::category.eq(category.clone()));
            count_query = count_query.filter(a::category.eq(category.clone()));
        }
        if let Some(source) = &filter.source {
            query = query.filter(a::source.eq(source.clone()));
            count_query = count_query.filter(a::source.eq(source.clone()));
        }

        let total = count_query.count().get_result::<i64>(&mut conn).await?;

        let query = match (filter.sort_by, filter.sort_desc) {
            (Some(ArticleSortBy::CreatedAt), true) | (None, true) => query.order(a::created_at.desc()).into_boxed(),
            (Some(ArticleSortBy::CreatedAt), false) => query.order(a::created_at.asc()).into_boxed(),
            (Some(ArticleSortBy::UpdatedAt), true) => query.order(a::updated_at.desc()).into_boxed(),
            (Some(ArticleSortBy::UpdatedAt), false) => query.order(a::updated_at.asc()).into_boxed(),
            (Some(ArticleSortBy::PublishedAt), true) => query.order(a::published_at.desc()).into_boxed(),
            (Some(ArticleSortBy::PublishedAt), false) => query.order(a::published_at.asc()).into_boxed(),
            (Some(ArticleSortBy::Title), true) => query.order(a::title.desc()).into_boxed(),
            (Some(ArticleSortBy::Title), false) => query.order(a::title.asc()).into_boxed(),
            (None, false) => query.order(a::created_at.asc()).into_boxed(),
        };

        let records = query
            .limit(filter.limit.max(1))
            .offset(filter.offset.max(0))
            .load::<ArticleRecord>(&mut conn)
            .await?;

        let mut items = records
            .into_iter()
            .map(Article::try_from)
            .collect::<Result<Vec<_>>>()?;

        if !filter.keywords.is_empty() {
            items.retain(|article| {
                filter
                    .keywords
                    .iter()
                    .any(|needle| article.keywords.iter().any(|kw| kw == needle))
            });
        }
        if !filter.tags.is_empty() {
            items.retain(|article| {
                filter.tags.iter().any(|needle| article.tags.iter().any(|tag| tag == needle))
            });
        }

        Ok(Page { items, total })
    }

    async fn batch_create(&self, articles: &[Article]) -> Result<BatchResult> {
        let mut conn = self.pool.get().await?;
        let mut result = BatchResult::default();
        for article in articles {
            let outcome: std::result::Result<bool, RepositoryError> = async {
                let row = ArticleRow::from_article(article)?;
                let affected = diesel::insert_into(a::articles)
                    .values(&row)
                    .on_conflict(a::link)
                    .do_nothing()
                    .execute(&mut conn)
                    .await?;
                Ok(affected > 0)
            }
            .await;

            match outcome {
                Ok(true) => result.inserted += 1,
                Ok(false) => {}
                Err(e) => result.errors.push((article.link.clone(), e.to_string())),
            }
        }
        Ok(result)
    }

    async fn batch_upsert_by_link(&self, articles: &[Article]) -> Result<BatchResult> {
        let mut conn = self.pool.get().await?;
        let mut result = BatchResult::default();
        for article in articles {
            // The existence check below is advisory, used only to classify
            // this row as inserted-vs-updated for `BatchResult`'s counters.
            // The write itself goes through `on_conflict` so two concurrent
            // upserts of the same link can never both take the insert path.
            let outcome: std::result::Result<bool, RepositoryError> = async {
                let already_present = a::articles
                    .filter(a::link.eq(&article.link))
                    .count()
                    .get_result::<i64>(&mut conn)
                    .await?
                    > 0;

                let mut row = ArticleRow::from_article(article)?;
                row.updated_at = Utc::now().to_rfc3339();
                diesel::insert_into(a::articles)
                    .values(&row)
                    .on_conflict(a::link)
                    .do_update()
                    .set((
                        a::title.eq(&row.title),
                        a::source.eq(sql::<Nullable<Text>>("COALESCE(excluded.source, articles.source)")),
                        a::source_url.eq(sql::<Nullable<Text>>("COALESCE(excluded.source_url, articles.source_url)")),
                        a::summary.eq(sql::<Nullable<Text>>("COALESCE(excluded.summary, articles.summary)")),
                        a::content.eq(sql::<Nullable<Text>>("COALESCE(excluded.content, articles.content)")),
                        a::category.eq(sql::<Nullable<Text>>("COALESCE(excluded.category, articles.category)")),
                        a::author.eq(sql::<Nullable<Text>>("COALESCE(excluded.author, articles.author)")),
                        a::article_type.eq(sql::<Nullable<Text>>("COALESCE(excluded.article_type, articles.article_type)")),
                        a::tags.eq(&row.tags),
                        a::keywords.eq(&row.keywords),
                        a::published_at.eq(sql::<Nullable<Text>>("COALESCE(excluded.published_at, articles.published_at)")),
                        a::is_ai_related.eq(row.is_ai_related),
                        a::is_scraped.eq(row.is_scraped),
                        a::scrape_status.eq(&row.scrape_status),
                        a::scrape_error.eq(sql::<Nullable<Text>>("COALESCE(excluded.scrape_error, articles.scrape_error)")),
                        a::last_scrape_attempt.eq(sql::<Nullable<Text>>(
                            "COALESCE(excluded.last_scrape_attempt, articles.last_scrape_attempt)",
                        )),
                        a::task_id.eq(sql::<Nullable<Text>>("COALESCE(excluded.task_id, articles.task_id)")),
                        a::updated_at.eq(&row.updated_at),
                    ))
                    .execute(&mut conn)
                    .await?;
                Ok(already_present)
            }
            .await;

            match outcome {
                Ok(true) => result.updated += 1,
                Ok(false) => result.inserted += 1,
                Err(e) => result.errors.push((article.link.clone(), e.to_string())),
            }
        }
        Ok(result)
    }

    async fn find_by_keywords(
        &self,
        q: &str,
        limit: i64,
        offset: i64,
        sort_by: Option<ArticleSortBy>,
        sort_desc: bool,
    ) -> Result<Vec<Article>> {
        let mut conn = self.pool.get().await?;
        let needle = format!("%{}%", q.replace('%', "\\%").replace('_', "\\_"));

        let query = a::articles.into_boxed().filter(
            a::title
                .like(needle.clone())
                .or(a::summary.like(needle.clone()))
                .or(a::content.like(needle)),
        );

        let query = match (sort_by, sort_desc) {
            (Some(ArticleSortBy::CreatedAt), true) | (None, true) => query.order(a::created_at.desc()).into_boxed(),
            (Some(ArticleSortBy::CreatedAt), false) => query.order(a::created_at.asc()).into_boxed(),
            (Some(ArticleSortBy::UpdatedAt), true) => query.order(a::updated_at.desc()).into_boxed(),
            (Some(ArticleSortBy::UpdatedAt), false) => query.order(a::updated_at.asc()).into_boxed(),
            (Some(ArticleSortBy::PublishedAt), true) => query.order(a::published_at.desc()).into_boxed(),
            (Some(ArticleSortBy::PublishedAt), false) => query.order(a::published_at.asc()).into_boxed(),
            (Some(ArticleSortBy::Title), true) => query.order(a::title.desc()).into_boxed(),
            (Some(ArticleSortBy::Title), false) => query.order(a::title.asc()).into_boxed(),
            (None, false) => query.order(a::created_at.asc()).into_boxed(),
        };

        let records = query
            .limit(limit.max(1))
            .offset(offset.max(0))
            .load::<ArticleRecord>(&mut conn)
            .await?;

        records.into_iter().map(Article::try_from).collect()
    }
}
