//! In-memory document store
//!
//! Keeps reviews and venues in ordered maps and performs the venue join with
//! `group_reviews_by_venue`. Update counters let callers observe exactly how
//! many writes each document received.

use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use vri_common::Result;

use super::DocumentStore;
use crate::models::{Review, ReviewUpdate, SummaryResult, Venue, VenueReviewGroup};

/// Group reviews with text under their venue
///
/// Pure counterpart of the store-side join: groups follow venue id order,
/// reviews keep their input order, reviews without text or without a known
/// venue are left out.
pub fn group_reviews_by_venue(reviews: &[Review], venues: &[Venue]) -> Vec<VenueReviewGroup> {
    let names: HashMap<&str, &str> = venues
        .iter()
        .map(|v| (v.id.as_str(), v.name.as_str()))
        .collect();

    let mut groups: BTreeMap<&str, VenueReviewGroup> = BTreeMap::new();
    for review in reviews.iter().filter(|r| r.analyzable_text().is_some()) {
        let Some(name) = names.get(review.venue_id.as_str()) else {
            tracing::debug!(
                review_id = %review.id,
                venue_id = %review.venue_id,
                "Review references unknown venue, left out of grouping"
            );
            continue;
        };

        groups
            .entry(review.venue_id.as_str())
            .or_insert_with(|| VenueReviewGroup {
                venue_id: review.venue_id.clone(),
                venue_name: name.to_string(),
                reviews: Vec::new(),
            })
            .reviews
            .push(review.clone());
    }

    groups.into_values().collect()
}

#[derive(Default)]
struct StoreState {
    reviews: BTreeMap<String, Review>,
    venues: BTreeMap<String, Venue>,
    review_updates: HashMap<String, usize>,
    venue_updates: HashMap<String, usize>,
}

/// Document store held in process memory
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: RwLock<StoreState>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with venues and reviews
    pub fn with_documents(venues: Vec<Venue>, reviews: Vec<Review>) -> Self {
        let state = StoreState {
            reviews: reviews.into_iter().map(|r| (r.id.clone(), r)).collect(),
            venues: venues.into_iter().map(|v| (v.id.clone(), v)).collect(),
            ..StoreState::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn insert_venue(&self, venue: Venue) {
        self.state.write().await.venues.insert(venue.id.clone(), venue);
    }

    pub async fn insert_review(&self, review: Review) {
        self.state.write().await.reviews.insert(review.id.clone(), review);
    }

    pub async fn review(&self, review_id: &str) -> Option<Review> {
        self.state.read().await.reviews.get(review_id).cloned()
    }

    pub async fn venue(&self, venue_id: &str) -> Option<Venue> {
        self.state.read().await.venues.get(venue_id).cloned()
    }

    /// Number of updates applied to a review
    pub async fn review_update_count(&self, review_id: &str) -> usize {
        self.state
            .read()
            .await
            .review_updates
            .get(review_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of updates applied to a venue
    pub async fn venue_update_count(&self, venue_id: &str) -> usize {
        self.state
            .read()
            .await
            .venue_updates
            .get(venue_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_reviews(&self) -> Result<Vec<Review>> {
        Ok(self.state.read().await.reviews.values().cloned().collect())
    }

    async fn update_review(&self, review_id: &str, update: &ReviewUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut state = self.state.write().await;
        let Some(review) = state.reviews.get_mut(review_id) else {
            return Ok(false);
        };

        if let Some(sentiment) = &update.sentiment {
            review.sentiment = Some(sentiment.clone());
        }
        if let Some(clusters) = &update.clusters {
            review.clusters = Some(clusters.clone());
        }
        *state.review_updates.entry(review_id.to_string()).or_default() += 1;

        Ok(true)
    }

    async fn group_reviews_by_venue(&self) -> Result<Vec<VenueReviewGroup>> {
        let state = self.state.read().await;
        let reviews: Vec<Review> = state.reviews.values().cloned().collect();
        let venues: Vec<Venue> = state.venues.values().cloned().collect();

        Ok(group_reviews_by_venue(&reviews, &venues))
    }

    async fn update_venue_summary(&self, summary: &SummaryResult) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(venue) = state.venues.get_mut(&summary.venue_id) else {
            return Ok(false);
        };

        venue.ai_summary = Some(summary.synopsis.clone());
        venue.ai_key_points = Some(summary.key_points.clone());
        venue.ai_global_score = Some(summary.global_score.clone());
        *state
            .venue_updates
            .entry(summary.venue_id.clone())
            .or_default() += 1;

        Ok(true)
    }
}
