use super::config::ConfigError;
use crate::core::geometry::GridGeometry;
use crate::core::io::mhd::ImageError;
use crate::core::stopping_power::StoppingPowerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Shape mismatch between co-located grids: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    #[error("Image error: {source}")]
    Image {
        #[from]
        source: ImageError,
    },

    #[error("Stopping power table error: {source}")]
    StoppingPower {
        #[from]
        source: StoppingPowerError,
    },

    #[error("Nothing to merge: {0}")]
    EmptyMerge(String),
}

impl EngineError {
    pub(crate) fn shape_mismatch(expected: &GridGeometry, found: &GridGeometry) -> Self {
        EngineError::ShapeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
