use super::config::{AveragingPolicy, ScoringConfig};
use std::path::{Path, PathBuf};

/// File names of every image a scorer can produce, derived from one base path.
///
/// The LET path carries the policy and water-equivalence suffixes; every
/// other name is the LET path with its own suffix inserted before the
/// extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    pub let_image: PathBuf,
    pub variance: PathBuf,
    pub numerator: PathBuf,
    pub denominator: PathBuf,
    pub second_moment: PathBuf,
}

impl OutputNames {
    pub fn derive(base: &Path, policy: AveragingPolicy, water_equivalent: bool) -> Self {
        let mut let_image = match policy {
            AveragingPolicy::DoseAverage => with_suffix(base, "-doseAveraged"),
            AveragingPolicy::TrackAverage => with_suffix(base, "-trackAveraged"),
            AveragingPolicy::TrackAverageEdep
            | AveragingPolicy::DoseAverageEdep
            | AveragingPolicy::AverageKineticEnergy => base.to_path_buf(),
        };
        if water_equivalent {
            let_image = with_suffix(&let_image, "-letToWater");
        }
        Self::from_let_path(let_image)
    }

    pub fn for_config(base: &Path, config: &ScoringConfig) -> Self {
        Self::derive(base, config.policy, config.water_equivalent)
    }

    /// Names keyed on an already-suffixed LET path, as found next to the
    /// partial outputs of a parallel-mode run.
    pub fn from_let_path(let_image: impl Into<PathBuf>) -> Self {
        let let_image = let_image.into();
        Self {
            variance: with_suffix(&let_image, "-variance"),
            numerator: with_suffix(&let_image, "-numerator"),
            denominator: with_suffix(&let_image, "-denominator"),
            second_moment: with_suffix(&let_image, "-variance-unnormalizedSecondMoment"),
            let_image,
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(file_name)
}
