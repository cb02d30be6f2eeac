//! # Core Module
//!
//! Stateless building blocks shared by the engine and the workflows.
//!
//! ## Overview
//!
//! - **Grid Geometry** ([`geometry`]) - Resolution, extent and origin of the scored volume,
//!   and the point-to-voxel indexing used when steps carry positions
//! - **Voxel Images** ([`image`]) - Dense `f64` arrays paired with their geometry
//! - **Step Records** ([`step`]) - The per-step quantities handed over by the transport kernel
//! - **Stopping Power** ([`stopping_power`]) - The dE/dx lookup interface and a tabulated
//!   implementation loaded from CSV
//! - **File I/O** ([`io`]) - Reading and writing voxel images (MetaImage)

pub mod geometry;
pub mod image;
pub mod io;
pub mod step;
pub mod stopping_power;
