//! SQLite-backed document store

use sqlx::SqlitePool;
use vri_common::Result;

use super::{reviews, venues, DocumentStore};
use crate::models::{Review, ReviewUpdate, SummaryResult, VenueReviewGroup};

/// Production document store over the shared SQLite database
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find_reviews(&self) -> Result<Vec<Review>> {
        reviews::load_all_reviews(&self.pool).await
    }

    async fn update_review(&self, review_id: &str, update: &ReviewUpdate) -> Result<bool> {
        reviews::update_review_fields(&self.pool, review_id, update).await
    }

    async fn group_reviews_by_venue(&self) -> Result<Vec<VenueReviewGroup>> {
        venues::load_venue_review_groups(&self.pool).await
    }

    async fn update_venue_summary(&self, summary: &SummaryResult) -> Result<bool> {
        venues::update_venue_summary(&self.pool, summary).await
    }
}
