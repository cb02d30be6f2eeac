use crate::core::image::VoxelImage;
use std::error::Error;
use std::io;
use std::path::Path;

/// Defines the interface for reading and writing voxel image formats.
///
/// Formats may spread one image over several files (a header and a raw
/// payload, for instance), so the interface is expressed in terms of paths.
/// Implementors handle format-specific parsing and serialization.
pub trait ImageFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads an image from the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<VoxelImage, Self::Error>;

    /// Writes an image to `path`, creating or truncating every file the
    /// format needs.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(image: &VoxelImage, path: P) -> Result<(), Self::Error>;
}
