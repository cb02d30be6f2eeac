//! Provides input/output functionality for voxel image formats.
//!
//! The scoring core treats images as opaque sinks; this module supplies the
//! MetaImage (`.mhd` + `.raw`) codec used by the command-line tools and the
//! merge workflow, behind the [`traits::ImageFile`] interface.

pub mod mhd;
pub mod traits;
