//! Data models for vri-ai (Review Intelligence service)
//!
//! - Reviews and venues with their derived fields
//! - Pipeline run state machine

pub mod pipeline_run;
pub mod review;
pub mod venue;

pub use pipeline_run::{PipelineRun, PipelineState, RunWarning, StateTransition};
pub use review::{ClusterAssignment, Review, ReviewUpdate, Sentiment};
pub use venue::{SummaryResult, Venue, VenueReviewGroup};
