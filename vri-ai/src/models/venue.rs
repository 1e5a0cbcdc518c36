//! Venues, per-venue review groups and summary results

use super::Review;
use serde::{Deserialize, Serialize};

/// Business entity reviews are about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: String,
    pub name: String,
    /// Summary synopsis (summarization stage only)
    pub ai_summary: Option<String>,
    /// Key points (summarization stage only)
    pub ai_key_points: Option<String>,
    /// Global score as returned by the model (summarization stage only)
    pub ai_global_score: Option<String>,
}

impl Venue {
    /// Create a venue without derived fields
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ai_summary: None,
            ai_key_points: None,
            ai_global_score: None,
        }
    }
}

/// Reviews of one venue, built for the summarization stage
#[derive(Debug, Clone, PartialEq)]
pub struct VenueReviewGroup {
    pub venue_id: String,
    pub venue_name: String,
    pub reviews: Vec<Review>,
}

/// Parsed final summary for one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub venue_id: String,
    pub synopsis: String,
    pub key_points: String,
    /// Raw trimmed score text, persisted as-is
    pub global_score: String,
}

impl SummaryResult {
    /// Numeric reading of `global_score`
    ///
    /// Takes the first integer in the text ("72", "72/100", "Note : 72 sur 100")
    /// and returns it when it lies within 0..=100.
    pub fn score_value(&self) -> Option<u32> {
        let digits: String = self
            .global_score
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();

        digits.parse::<u32>().ok().filter(|v| *v <= 100)
    }
}
