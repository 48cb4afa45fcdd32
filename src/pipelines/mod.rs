//! # Pipelines Module
//!
//! High-level workflow orchestration.

pub mod conform;

pub use conform::ConformPipeline;
