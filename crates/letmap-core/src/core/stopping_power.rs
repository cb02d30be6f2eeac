use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

macro_rules! name_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::new(name)
            }
        }
    };
}

name_newtype!(
    /// Particle species name as reported by the transport kernel (e.g. `proton`).
    ParticleId
);

name_newtype!(
    /// Material name as reported by the transport kernel (e.g. `G4_WATER`).
    MaterialId
);

/// Source of stopping powers for a (kinetic energy, species, material) triple.
///
/// Implementations must be deterministic and free of side effects so that
/// repeated runs reproduce the same maps. `Sync` is required because the
/// scoring workflow shares one source between workers.
pub trait StoppingPowerSource: Sync {
    /// Electronic stopping power, in the same units as the step records.
    fn electronic_dedx(
        &self,
        kinetic_energy: f64,
        species: &ParticleId,
        material: &MaterialId,
    ) -> f64;

    /// Total (electronic + nuclear) stopping power. Used for the
    /// water-equivalent rescaling.
    fn total_dedx(&self, kinetic_energy: f64, species: &ParticleId, material: &MaterialId) -> f64 {
        self.electronic_dedx(kinetic_energy, species, material)
    }
}

impl<F> StoppingPowerSource for F
where
    F: Fn(f64, &ParticleId, &MaterialId) -> f64 + Sync,
{
    fn electronic_dedx(
        &self,
        kinetic_energy: f64,
        species: &ParticleId,
        material: &MaterialId,
    ) -> f64 {
        self(kinetic_energy, species, material)
    }
}

#[derive(Debug, Error)]
pub enum StoppingPowerError {
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid stopping power for {species} in {material} at {kinetic_energy} MeV: {reason}")]
    InvalidValue {
        species: String,
        material: String,
        kinetic_energy: f64,
        reason: &'static str,
    },
}

/// One row of a stopping power table file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoppingPowerRecord {
    pub species: String,
    pub material: String,
    pub kinetic_energy: f64,
    pub electronic_dedx: f64,
    #[serde(default)]
    pub total_dedx: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Curve {
    energies: Vec<f64>,
    electronic: Vec<f64>,
    total: Vec<f64>,
}

impl Curve {
    fn push(&mut self, kinetic_energy: f64, electronic: f64, total: f64) {
        let at = self.energies.partition_point(|&e| e < kinetic_energy);
        self.energies.insert(at, kinetic_energy);
        self.electronic.insert(at, electronic);
        self.total.insert(at, total);
    }

    /// Piecewise-linear in kinetic energy, clamped to the end points.
    fn interpolate(&self, values: &[f64], kinetic_energy: f64) -> f64 {
        let n = self.energies.len();
        if n == 0 {
            return 0.0;
        }
        if kinetic_energy <= self.energies[0] {
            return values[0];
        }
        if kinetic_energy >= self.energies[n - 1] {
            return values[n - 1];
        }
        let hi = self.energies.partition_point(|&e| e < kinetic_energy);
        let lo = hi - 1;
        let (e0, e1) = (self.energies[lo], self.energies[hi]);
        if e1 == e0 {
            return values[hi];
        }
        let t = (kinetic_energy - e0) / (e1 - e0);
        values[lo] + t * (values[hi] - values[lo])
    }
}

/// Tabulated stopping powers keyed by species and material.
///
/// Lookups for a species/material pair with no curve return `0.0`.
#[derive(Debug, Clone, Default)]
pub struct StoppingPowerTable {
    curves: HashMap<String, HashMap<String, Curve>>,
}

impl StoppingPowerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a CSV file with the columns
    /// `species,material,kinetic_energy,electronic_dedx[,total_dedx]`.
    pub fn load(path: &Path) -> Result<Self, StoppingPowerError> {
        let path_str = || path.to_string_lossy().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| StoppingPowerError::Csv {
                path: path_str(),
                source: e,
            })?;

        let mut table = Self::new();
        for result in reader.deserialize::<StoppingPowerRecord>() {
            let record = result.map_err(|e| StoppingPowerError::Csv {
                path: path_str(),
                source: e,
            })?;
            table.insert(record)?;
        }
        Ok(table)
    }

    pub fn from_records(
        records: impl IntoIterator<Item = StoppingPowerRecord>,
    ) -> Result<Self, StoppingPowerError> {
        let mut table = Self::new();
        for record in records {
            table.insert(record)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, record: StoppingPowerRecord) -> Result<(), StoppingPowerError> {
        let invalid = |reason| StoppingPowerError::InvalidValue {
            species: record.species.clone(),
            material: record.material.clone(),
            kinetic_energy: record.kinetic_energy,
            reason,
        };
        if !record.kinetic_energy.is_finite() || record.kinetic_energy < 0.0 {
            return Err(invalid("kinetic energy must be finite and non-negative"));
        }
        let total = record.total_dedx.unwrap_or(record.electronic_dedx);
        if !record.electronic_dedx.is_finite() || record.electronic_dedx < 0.0 {
            return Err(invalid("electronic dE/dx must be finite and non-negative"));
        }
        if !total.is_finite() || total < 0.0 {
            return Err(invalid("total dE/dx must be finite and non-negative"));
        }

        self.curves
            .entry(record.species)
            .or_default()
            .entry(record.material)
            .or_default()
            .push(record.kinetic_energy, record.electronic_dedx, total);
        Ok(())
    }

    pub fn contains(&self, species: &ParticleId, material: &MaterialId) -> bool {
        self.curve(species, material).is_some()
    }

    pub fn len(&self) -> usize {
        self.curves.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn curve(&self, species: &ParticleId, material: &MaterialId) -> Option<&Curve> {
        self.curves
            .get(species.as_str())
            .and_then(|by_material| by_material.get(material.as_str()))
    }
}

impl StoppingPowerSource for StoppingPowerTable {
    fn electronic_dedx(
        &self,
        kinetic_energy: f64,
        species: &ParticleId,
        material: &MaterialId,
    ) -> f64 {
        self.curve(species, material)
            .map_or(0.0, |c| c.interpolate(&c.electronic, kinetic_energy))
    }

    fn total_dedx(&self, kinetic_energy: f64, species: &ParticleId, material: &MaterialId) -> f64 {
        self.curve(species, material)
            .map_or(0.0, |c| c.interpolate(&c.total, kinetic_energy))
    }
}
