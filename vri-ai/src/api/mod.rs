//! HTTP API handlers for vri-ai
//!
//! POST /pipeline/run, GET /pipeline/status, POST /pipeline/cancel, GET /health

pub mod health;
pub mod pipeline;

pub use health::health_routes;
pub use pipeline::pipeline_routes;
