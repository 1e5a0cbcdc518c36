//! Document store access for vri-ai
//!
//! The pipeline depends only on the `DocumentStore` trait, shaped after the
//! three operations it needs from a document database:
//! - `find` reviews
//! - `update_one` on a review or a venue
//! - `aggregate` reviews by venue (join on `venue_id`)
//!
//! `SqliteDocumentStore` is the production store; `MemoryDocumentStore`
//! backs tests and performs the join with the pure `group_reviews_by_venue`.

pub mod memory_store;
pub mod reviews;
pub mod sqlite_store;
pub mod venues;

pub use memory_store::{group_reviews_by_venue, MemoryDocumentStore};
pub use sqlite_store::SqliteDocumentStore;

use crate::models::{Review, ReviewUpdate, SummaryResult, VenueReviewGroup};
use vri_common::Result;

/// Document store collaborator
///
/// Every update is self-contained and idempotent; the store guarantees
/// per-document atomicity.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// All reviews with their current derived fields
    async fn find_reviews(&self) -> Result<Vec<Review>>;

    /// Set the derived fields present in `update` on one review
    ///
    /// Returns `false` when no review matched `review_id`.
    async fn update_review(&self, review_id: &str, update: &ReviewUpdate) -> Result<bool>;

    /// Reviews with text, joined to their venue and grouped per venue
    ///
    /// Groups are ordered by venue id and reviews by review id.
    async fn group_reviews_by_venue(&self) -> Result<Vec<VenueReviewGroup>>;

    /// Replace the summary fields of one venue
    ///
    /// Returns `false` when no venue matched `summary.venue_id`.
    async fn update_venue_summary(&self, summary: &SummaryResult) -> Result<bool>;
}
