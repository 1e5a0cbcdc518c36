//! Review records and their derived fields

use serde::{Deserialize, Serialize};

/// Customer review
///
/// Created externally. The pipeline only writes `sentiment` and `clusters`,
/// replacing prior values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Review identifier
    pub id: String,
    /// Venue the review is about
    pub venue_id: String,
    /// Free text, possibly missing
    pub text: Option<String>,
    /// Sentiment classification (absent until classified)
    pub sentiment: Option<Sentiment>,
    /// Theme scores over the run vocabulary (absent until clustered)
    pub clusters: Option<Vec<ClusterAssignment>>,
}

impl Review {
    /// Create a review without derived fields
    pub fn new(id: impl Into<String>, venue_id: impl Into<String>, text: Option<&str>) -> Self {
        Self {
            id: id.into(),
            venue_id: venue_id.into(),
            text: text.map(str::to_string),
            sentiment: None,
            clusters: None,
        }
    }

    /// Text eligible for model calls, `None` when missing or blank
    pub fn analyzable_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Cluster labels by descending score, at most `limit` when given
    pub fn top_cluster_labels(&self, limit: Option<usize>) -> Vec<&str> {
        let Some(clusters) = &self.clusters else {
            return Vec::new();
        };

        let mut ranked: Vec<&ClusterAssignment> = clusters.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        ranked
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|c| c.label.as_str())
            .collect()
    }
}

/// Sentiment label with model confidence (0.0-1.0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: String,
    pub score: f64,
}

/// Relevance of one vocabulary category to a review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub label: String,
    /// Relevance probability (0.0-1.0)
    pub score: f64,
}

/// Derived fields written for one review in a single update
///
/// `None` fields are left untouched in the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewUpdate {
    pub sentiment: Option<Sentiment>,
    pub clusters: Option<Vec<ClusterAssignment>>,
}

impl ReviewUpdate {
    /// Nothing to write
    pub fn is_empty(&self) -> bool {
        self.sentiment.is_none() && self.clusters.is_none()
    }
}
