use crate::cli::ScoreArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use letmap::{
    core::{
        geometry::GridGeometry,
        io::mhd::MetaImage,
        step::StepEvent,
        stopping_power::{MaterialId, ParticleId, StoppingPowerTable},
    },
    engine::{
        config::ScoringConfig, error::EngineError, output::OutputNames,
        progress::ProgressReporter,
    },
    workflows,
};
use nalgebra::Point3;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// One row of a recorded step file. The position is the post-step point,
/// indexed into the grid before scoring.
#[derive(Debug, Deserialize)]
struct StepRecord {
    deposited_energy: f64,
    track_weight: f64,
    step_length: f64,
    pre_kinetic_energy: f64,
    post_kinetic_energy: f64,
    species: String,
    material: String,
    x: f64,
    y: f64,
    z: f64,
}

impl StepRecord {
    fn into_event(self, geometry: &GridGeometry) -> StepEvent {
        StepEvent {
            voxel_index: geometry.voxel_index(&Point3::new(self.x, self.y, self.z)),
            deposited_energy: self.deposited_energy,
            track_weight: self.track_weight,
            step_length: self.step_length,
            pre_kinetic_energy: self.pre_kinetic_energy,
            post_kinetic_energy: self.post_kinetic_energy,
            species: ParticleId::new(self.species),
            material: MaterialId::new(self.material),
        }
    }
}

fn read_steps(path: &Path, geometry: &GridGeometry) -> Result<Vec<StepEvent>> {
    let parse_error = |e: csv::Error| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(parse_error)?;

    reader
        .deserialize::<StepRecord>()
        .map(|record| record.map(|r| r.into_event(geometry)).map_err(parse_error))
        .collect()
}

/// Species/material pairs the batch needs that have no curve in `table`,
/// including the reference material when the water conversion is enabled.
fn missing_curves(
    steps: &[StepEvent],
    table: &StoppingPowerTable,
    scoring: &ScoringConfig,
) -> BTreeSet<(String, String)> {
    let mut missing = BTreeSet::new();
    for step in steps.iter().filter(|s| s.deposited_energy != 0.0 && s.voxel_index >= 0) {
        let needs_material = scoring.policy.uses_stopping_power() || scoring.water_equivalent;
        if needs_material && !table.contains(&step.species, &step.material) {
            missing.insert((step.species.to_string(), step.material.to_string()));
        }
        if scoring.water_equivalent && !table.contains(&step.species, &scoring.reference_material)
        {
            missing.insert((
                step.species.to_string(),
                scoring.reference_material.to_string(),
            ));
        }
    }
    missing
}

pub fn run(args: ScoreArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_config(&args)?;
    info!(
        policy = %app.scoring.policy,
        water_equivalent = app.scoring.water_equivalent,
        second_moment = app.scoring.second_moment,
        geometry = %app.geometry,
        "Configuration resolved."
    );

    info!("Loading stopping power table from {:?}", &app.stopping_power_path);
    let table = StoppingPowerTable::load(&app.stopping_power_path).map_err(|e| {
        CliError::FileParsing {
            path: app.stopping_power_path.clone(),
            source: e.into(),
        }
    })?;
    if table.is_empty() {
        warn!("Stopping power table is empty; every dE/dx lookup will return 0.");
    }

    info!("Loading recorded steps from {:?}", &app.steps_path);
    let steps = read_steps(&app.steps_path, &app.geometry)?;
    for (species, material) in missing_curves(&steps, &table, &app.scoring) {
        warn!(%species, %material, "No stopping power curve; lookups will return 0.");
        println!(
            "Warning: no stopping power for '{}' in '{}' in {}.",
            species,
            material,
            app.stopping_power_path.display()
        );
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Scoring {} step(s)...", steps.len());
    let result = workflows::score::run(&steps, app.geometry, &app.scoring, &table, &reporter)?;

    let stats = result.stats;
    println!(
        "Scored {} step(s); skipped {} (no deposit: {}, outside grid: {}, zero step length: {}).",
        stats.scored,
        stats.skipped(),
        stats.skipped_no_deposit,
        stats.skipped_outside_grid,
        stats.skipped_zero_step_length,
    );
    if stats.zero_dedx > 0 {
        println!(
            "Warning: {} step(s) were scored with a zero stopping power.",
            stats.zero_dedx
        );
    }
    if stats.unconverted > 0 {
        println!(
            "Warning: {} step(s) could not be converted to water-equivalent LET.",
            stats.unconverted
        );
    }

    if let Some(parent) = app.output_base.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let names = OutputNames::for_config(&app.output_base, &app.scoring);
    let written = result
        .output
        .write_all::<MetaImage>(&names)
        .map_err(EngineError::from)?;
    for path in written {
        println!("✓ Written: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{OutputLayout, Variance, WaterEquivalent};
    use letmap::core::io::traits::ImageFile;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const STEPS: &str = "\
deposited_energy,track_weight,step_length,pre_kinetic_energy,post_kinetic_energy,species,material,x,y,z
2.0,1.0,0.5,100.0,100.0,proton,G4_WATER,-0.5,0.0,0.0
2.0,1.0,0.5,10.0,10.0,proton,G4_WATER,-0.5,0.0,0.0
0.0,1.0,0.5,10.0,10.0,proton,G4_WATER,0.5,0.0,0.0
1.0,1.0,0.5,10.0,10.0,proton,G4_WATER,5.0,0.0,0.0
";

    const STOPPING_POWER: &str = "\
species,material,kinetic_energy,electronic_dedx
proton,G4_WATER,10.0,15.0
proton,G4_WATER,100.0,5.0
";

    fn args(dir: &Path, output: PathBuf) -> ScoreArgs {
        let steps = dir.join("steps.csv");
        let stopping_power = dir.join("dedx.csv");
        fs::write(&steps, STEPS).unwrap();
        fs::write(&stopping_power, STOPPING_POWER).unwrap();
        ScoreArgs {
            steps,
            stopping_power,
            output,
            config: None,
            mode: None,
            water_equivalent: WaterEquivalent::default(),
            variance: Variance {
                variance: true,
                no_variance: false,
            },
            output_layout: OutputLayout::default(),
            reference_material: None,
            resolution: Some([2, 1, 1]),
            half_size: Some([1.0, 1.0, 1.0]),
            origin: None,
            set_values: vec![],
        }
    }

    #[test]
    fn read_steps_indexes_positions_through_the_grid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("steps.csv");
        fs::write(&path, STEPS).unwrap();
        let geometry = GridGeometry::new(
            nalgebra::Vector3::new(2, 1, 1),
            nalgebra::Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
        )
        .unwrap();

        let steps = read_steps(&path, &geometry).unwrap();
        let indices: Vec<i64> = steps.iter().map(|s| s.voxel_index).collect();
        assert_eq!(indices, vec![0, 0, 1, -1]);
        assert_eq!(steps[0].species.as_str(), "proton");
    }

    #[test]
    fn malformed_step_file_reports_its_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("steps.csv");
        fs::write(&path, "deposited_energy,x\nnot-a-number,1\n").unwrap();
        let geometry = GridGeometry::new(
            nalgebra::Vector3::new(1, 1, 1),
            nalgebra::Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
        )
        .unwrap();

        match read_steps(&path, &geometry) {
            Err(CliError::FileParsing { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    fn scoring(water_equivalent: bool) -> ScoringConfig {
        letmap::engine::config::ScoringConfigBuilder::new()
            .water_equivalent(water_equivalent)
            .build()
            .unwrap()
    }

    #[test]
    fn missing_curves_lists_uncovered_pairs_and_reference() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dedx.csv");
        fs::write(&path, "species,material,kinetic_energy,electronic_dedx\nproton,G4_PMMA,10.0,15.0\n")
            .unwrap();
        let table = StoppingPowerTable::load(&path).unwrap();
        let step = |species: &str, deposited_energy: f64| StepEvent {
            voxel_index: 0,
            deposited_energy,
            track_weight: 1.0,
            step_length: 0.5,
            pre_kinetic_energy: 10.0,
            post_kinetic_energy: 10.0,
            species: ParticleId::new(species),
            material: MaterialId::new("G4_PMMA"),
        };
        let steps = vec![step("proton", 1.0), step("alpha", 1.0), step("neutron", 0.0)];

        let missing = missing_curves(&steps, &table, &scoring(false));
        assert_eq!(
            missing.into_iter().collect::<Vec<_>>(),
            vec![("alpha".to_string(), "G4_PMMA".to_string())]
        );

        let missing = missing_curves(&steps, &table, &scoring(true));
        assert!(missing.contains(&("proton".to_string(), "G4_WATER".to_string())));
        assert!(missing.contains(&("alpha".to_string(), "G4_WATER".to_string())));
        assert_eq!(missing.len(), 3);
    }

    #[test]
    fn score_writes_let_and_variance_images() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out").join("let.mhd");
        run(args(dir.path(), output.clone())).unwrap();

        let names = OutputNames::from_let_path(dir.path().join("out/let-doseAveraged.mhd"));
        let let_image = MetaImage::read_from_path(&names.let_image).unwrap();
        assert!((let_image.values()[0] - 10.0).abs() < 1e-12);
        assert_eq!(let_image.values()[1], 0.0);

        let variance = MetaImage::read_from_path(&names.variance).unwrap();
        assert!((variance.values()[0] - 25.0).abs() < 1e-12);
    }

    #[test]
    fn parallel_output_writes_raw_sums() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("let.mhd");
        let mut args = args(dir.path(), output);
        args.output_layout.parallel_output = true;
        run(args).unwrap();

        let names = OutputNames::from_let_path(dir.path().join("let-doseAveraged.mhd"));
        assert!(!names.let_image.exists());
        let numerator = MetaImage::read_from_path(&names.numerator).unwrap();
        let denominator = MetaImage::read_from_path(&names.denominator).unwrap();
        assert!((numerator.values()[0] - 40.0).abs() < 1e-12);
        assert!((denominator.values()[0] - 4.0).abs() < 1e-12);
        assert!(names.second_moment.exists());
    }
}
