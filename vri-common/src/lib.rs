//! # VRI Common Library
//!
//! Shared code for the venue review intelligence services:
//! - Error type
//! - Bootstrap configuration (TOML + environment)
//! - SQLite initialization and schema

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
