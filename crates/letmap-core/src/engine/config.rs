use crate::core::stopping_power::MaterialId;
use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reference material used for the water-equivalent conversion.
pub const DEFAULT_REFERENCE_MATERIAL: &str = "G4_WATER";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error(
        "Invalid LET averaging mode '{0}'. Expected one of: DoseAveraged, TrackAveraged, DoseAveragedEdep, TrackAveragedEdep, AverageKinEnergy."
    )]
    InvalidAveragingMode(String),

    #[error("Reference material name cannot be empty")]
    EmptyReferenceMaterial,
}

/// How one step's physical quantities are turned into numerator and
/// denominator contributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AveragingPolicy {
    /// Σ edep·dE/dx / Σ edep
    #[default]
    DoseAverage,
    /// Σ dE/dx·ℓ / Σ ℓ
    TrackAverage,
    /// Σ edep / Σ ℓ
    TrackAverageEdep,
    /// Σ edep²/ℓ / Σ edep
    DoseAverageEdep,
    /// Σ E·w / Σ w
    AverageKineticEnergy,
}

// Keys are lowercase; lookups lowercase the label first.
static AVERAGING_MODE_LABELS: Map<&'static str, AveragingPolicy> = phf_map! {
    "doseaveraged" => AveragingPolicy::DoseAverage,
    "doseaverage" => AveragingPolicy::DoseAverage,
    "dose" => AveragingPolicy::DoseAverage,
    "doseaveragededep" => AveragingPolicy::DoseAverageEdep,
    "doseaverageedep" => AveragingPolicy::DoseAverageEdep,
    "trackaveraged" => AveragingPolicy::TrackAverage,
    "trackaverage" => AveragingPolicy::TrackAverage,
    "track" => AveragingPolicy::TrackAverage,
    "trackaverageddxaveraged" => AveragingPolicy::TrackAverage,
    "trackaveragededep" => AveragingPolicy::TrackAverageEdep,
    "trackaverageedep" => AveragingPolicy::TrackAverageEdep,
    "averagekinenergy" => AveragingPolicy::AverageKineticEnergy,
    "averagekineticenergy" => AveragingPolicy::AverageKineticEnergy,
};

impl AveragingPolicy {
    pub const ALL: [AveragingPolicy; 5] = [
        AveragingPolicy::DoseAverage,
        AveragingPolicy::TrackAverage,
        AveragingPolicy::TrackAverageEdep,
        AveragingPolicy::DoseAverageEdep,
        AveragingPolicy::AverageKineticEnergy,
    ];

    /// Canonical configuration label.
    pub fn label(self) -> &'static str {
        match self {
            AveragingPolicy::DoseAverage => "DoseAveraged",
            AveragingPolicy::TrackAverage => "TrackAveraged",
            AveragingPolicy::TrackAverageEdep => "TrackAveragedEdep",
            AveragingPolicy::DoseAverageEdep => "DoseAveragedEdep",
            AveragingPolicy::AverageKineticEnergy => "AverageKinEnergy",
        }
    }
}

impl FromStr for AveragingPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AVERAGING_MODE_LABELS
            .get(s.trim().to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| ConfigError::InvalidAveragingMode(s.to_string()))
    }
}

impl fmt::Display for AveragingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the reducer emits at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Divide locally and emit the final LET (and variance) images.
    #[default]
    Merged,
    /// Emit the raw running sums for summation with other workers' grids.
    Unmerged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub policy: AveragingPolicy,
    pub water_equivalent: bool,
    pub second_moment: bool,
    pub output_mode: OutputMode,
    pub reference_material: MaterialId,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            policy: AveragingPolicy::default(),
            water_equivalent: false,
            second_moment: false,
            output_mode: OutputMode::default(),
            reference_material: MaterialId::new(DEFAULT_REFERENCE_MATERIAL),
        }
    }
}

#[derive(Default)]
pub struct ScoringConfigBuilder {
    averaging_mode: Option<String>,
    policy: Option<AveragingPolicy>,
    water_equivalent: Option<bool>,
    second_moment: Option<bool>,
    output_mode: Option<OutputMode>,
    reference_material: Option<String>,
}

impl ScoringConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the averaging mode from a configuration label. The label is
    /// resolved, and rejected if unknown, by [`build`](Self::build).
    pub fn averaging_mode(mut self, label: impl Into<String>) -> Self {
        self.averaging_mode = Some(label.into());
        self.policy = None;
        self
    }
    pub fn policy(mut self, policy: AveragingPolicy) -> Self {
        self.policy = Some(policy);
        self.averaging_mode = None;
        self
    }
    pub fn water_equivalent(mut self, enabled: bool) -> Self {
        self.water_equivalent = Some(enabled);
        self
    }
    pub fn second_moment(mut self, enabled: bool) -> Self {
        self.second_moment = Some(enabled);
        self
    }
    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = Some(mode);
        self
    }
    pub fn parallel_output(self, enabled: bool) -> Self {
        self.output_mode(if enabled {
            OutputMode::Unmerged
        } else {
            OutputMode::Merged
        })
    }
    pub fn reference_material(mut self, material: impl Into<String>) -> Self {
        self.reference_material = Some(material.into());
        self
    }

    pub fn build(self) -> Result<ScoringConfig, ConfigError> {
        let policy = match (self.policy, self.averaging_mode) {
            (Some(policy), _) => policy,
            (None, Some(label)) => label.parse()?,
            (None, None) => AveragingPolicy::default(),
        };

        let reference_material = match self.reference_material {
            Some(name) if name.trim().is_empty() => {
                return Err(ConfigError::EmptyReferenceMaterial);
            }
            Some(name) => MaterialId::new(name.trim()),
            None => MaterialId::new(DEFAULT_REFERENCE_MATERIAL),
        };

        Ok(ScoringConfig {
            policy,
            water_equivalent: self.water_equivalent.unwrap_or(false),
            second_moment: self.second_moment.unwrap_or(false),
            output_mode: self.output_mode.unwrap_or_default(),
            reference_material,
        })
    }
}
