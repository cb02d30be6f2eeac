//! # Workflows Module
//!
//! High-level procedures that tie the `core` and `engine` layers together.
//!
//! ## Overview
//!
//! - **Scoring Workflow** ([`score`]) - Feeds a batch of step events through a scorer,
//!   optionally across rayon workers that each own a private grid, and reduces once.
//! - **Merge Workflow** ([`merge`]) - Sums the raw partial outputs written by
//!   parallel-mode runs and performs the single division pass.
//!
//! Both workflows report their phases through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter) and log
//! under their own `tracing` span.

pub mod merge;
pub mod score;
