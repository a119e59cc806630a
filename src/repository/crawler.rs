//! Crawler repository: registered crawler definitions (spec §3 `Crawler`).

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::Crawler;
use crate::schema::crawlers::dsl as c;

use super::records::{CrawlerRecord, CrawlerRow};
use super::{RepositoryError, Result, SqlitePool};

#[async_trait]
pub trait CrawlerRepository: Send + Sync {
    async fn create(&self, crawler: &Crawler) -> Result<Crawler>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Crawler>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Crawler>>;
    async fn find_all_active(&self) -> Result<Vec<Crawler>>;
    async fn update(&self, crawler: &Crawler) -> Result<Crawler>;
    async fn delete(&self, id: &str) -> Result<()>;
}

pub struct DieselCrawlerRepository {
    pool: SqlitePool,
}

impl DieselCrawlerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CrawlerRepository for DieselCrawlerRepository {
    async fn create(&self, crawler: &Crawler) -> Result<Crawler> {
        let mut conn = self.pool.get().await?;
        let row = CrawlerRow::from(crawler);
        diesel::insert_into(c::crawlers)
            .values(&row)
            .execute(&mut conn)
            .await?;
        self.find_by_id(&crawler.id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(crawler.id.clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Crawler>> {
        let mut conn = self.pool.get().await?;
        let record = c::crawlers
            .filter(c::id.eq(id))
            .first::<CrawlerRecord>(&mut conn)
            .await
            .optional()?;
        Ok(record.map(Crawler::from))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Crawler>> {
        let mut conn = self.pool.get().await?;
        let record = c::crawlers
            .filter(c::name.eq(name))
            .first::<CrawlerRecord>(&mut conn)
            .await
            .optional()?;
        Ok(record.map(Crawler::from))
    }

    async fn find_all_active(&self) -> Result<Vec<Crawler>> {
        let mut conn = self.pool.get().await?;
        let records = c::crawlers
            .filter(c::active.eq(1))
            .order(c::name.asc())
            .load::<CrawlerRecord>(&mut conn)
            .await?;
        Ok(records.into_iter().map(Crawler::from).collect())
    }

    async fn update(&self, crawler: &Crawler) -> Result<Crawler> {
        let mut conn = self.pool.get().await?;
        let mut row = CrawlerRow::from(crawler);
        row.updated_at = Utc::now().to_rfc3339();
        diesel::update(c::crawlers.filter(c::id.eq(&crawler.id)))
            .set(&row)
            .execute(&mut conn)
            .await?;
        self.find_by_id(&crawler.id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(crawler.id.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        diesel::delete(c::crawlers.filter(c::id.eq(id)))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}
