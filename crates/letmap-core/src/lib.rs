//! # LETmap Core Library
//!
//! Per-voxel accumulation of Linear Energy Transfer (LET) during Monte Carlo
//! particle transport, and reduction of the running sums into LET and variance
//! maps.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data: grid geometry, voxel images,
//!   step records, the stopping-power interface and image I/O.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer. It owns the running-sum
//!   grids (`AccumulatorGrid`), the averaging-policy algebra, the `LetScorer`
//!   that drives per-step updates and run lifecycle, and the reducer.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built on the two
//!   layers below: scoring a batch of steps (optionally across rayon workers,
//!   each with a private grid) and merging partial outputs written by
//!   parallel-mode runs.
//!
//! ## Features
//!
//! - `parallel` (default): rayon-backed accumulation and reduction.

pub mod core;
pub mod engine;
pub mod workflows;
