//! # Engine Module
//!
//! This module implements the stateful accumulation engine of LETmap: the
//! per-voxel running sums, the averaging-policy algebra that feeds them, and the
//! reduction that turns them into LET and variance images.
//!
//! ## Overview
//!
//! A [`scorer::LetScorer`] receives one step event at a time, asks the
//! configured [`config::AveragingPolicy`] for that step's numerator,
//! denominator and second-moment contributions, optionally rescales the
//! numerator to the water-equivalent value, and adds everything into its
//! [`accumulator::AccumulatorGrid`]. At the end of a run the
//! [`reducer`] either divides the sums (merged mode) or hands them out
//! untouched for summation with other workers' grids (unmerged mode).
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Averaging policy, modifiers, output mode and builder
//! - **Policy Algebra** ([`policy`]) - Per-step contributions for each averaging policy
//! - **Running Sums** ([`accumulator`]) - Numerator, denominator and second-moment grids
//! - **Scoring** ([`scorer`]) - Step filtering, water-equivalent rescaling and run lifecycle
//! - **Reduction** ([`reducer`]) - Zero-safe division and variance estimation
//! - **Output Naming** ([`output`]) - File names derived from the base output path
//! - **State Tracking** ([`state`]) - Run states, skip reasons and step counters
//! - **Progress Monitoring** ([`progress`]) - Progress reporting callbacks
//! - **Error Handling** ([`error`]) - Engine-specific error types
//!
//! ## Numerical Safety
//!
//! Voxels that never received a deposit reduce to exactly `0.0`, for both the
//! LET and the variance image. Steps that would divide by a zero step length
//! are skipped and counted instead of writing `Inf` or `NaN` into the grid.

pub mod accumulator;
pub mod config;
pub mod error;
pub mod output;
pub mod policy;
pub mod progress;
pub mod reducer;
pub mod scorer;
pub mod state;
