use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::ScoreArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use letmap::core::geometry::GridGeometry;
use letmap::engine::config as core_config;
use nalgebra::{Point3, Vector3};

pub fn build_config(args: &ScoreArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let scoring_file = file_config.scoring.take().unwrap_or_default();
    let averaging_mode = args
        .mode
        .clone()
        .or(scoring_file.averaging_mode)
        .unwrap_or(defaults.averaging_mode);

    let water_equivalent = resolve_toggle(
        args.water_equivalent.water,
        args.water_equivalent.no_water,
        scoring_file.water_equivalent,
        defaults.water_equivalent,
    );
    let second_moment = resolve_toggle(
        args.variance.variance,
        args.variance.no_variance,
        scoring_file.second_moment,
        defaults.second_moment,
    );
    let parallel_output = resolve_toggle(
        args.output_layout.parallel_output,
        args.output_layout.merged_output,
        scoring_file.parallel_output,
        defaults.parallel_output,
    );
    let reference_material = args
        .reference_material
        .clone()
        .or(scoring_file.reference_material)
        .unwrap_or(defaults.reference_material);

    let scoring = core_config::ScoringConfigBuilder::new()
        .averaging_mode(averaging_mode)
        .water_equivalent(water_equivalent)
        .second_moment(second_moment)
        .parallel_output(parallel_output)
        .reference_material(reference_material)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let grid_file = file_config.grid.take().unwrap_or_default();
    let resolution = args.resolution.or(grid_file.resolution).ok_or_else(|| {
        CliError::Config(
            "`grid.resolution` is required either in the config file or via --resolution."
                .to_string(),
        )
    })?;
    let half_size = args.half_size.or(grid_file.half_size).ok_or_else(|| {
        CliError::Config(
            "`grid.half-size` is required either in the config file or via --half-size."
                .to_string(),
        )
    })?;
    let origin = args
        .origin
        .or(grid_file.origin)
        .unwrap_or(defaults.origin);

    let geometry = GridGeometry::new(
        Vector3::from(resolution),
        Vector3::from(half_size),
        Point3::from(origin),
    )
    .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        steps_path: args.steps.clone(),
        stopping_power_path: args.stopping_power.clone(),
        output_base: args.output.clone(),
        geometry,
        scoring,
    })
}

/// An `--x`/`--no-x` flag pair wins over the file value, which wins over
/// the default.
fn resolve_toggle(on: bool, off: bool, file_value: Option<bool>, default: bool) -> bool {
    match (on, off) {
        (true, false) => true,
        (false, true) => false,
        _ => file_value.unwrap_or(default),
    }
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    if set_values.is_empty() {
        return Ok(config);
    }
    for kv_pair in set_values {
        let (key, value_str) =
            parser::parse_key_value(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;
        let invalid = |e: parser::ParseError| {
            CliError::Config(format!("Invalid value for {}: {}", key, e))
        };

        match key {
            "scoring.averaging-mode" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .averaging_mode = Some(value_str.to_string());
            }
            "scoring.water-equivalent" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .water_equivalent = Some(parser::parse_bool(value_str).map_err(invalid)?);
            }
            "scoring.second-moment" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .second_moment = Some(parser::parse_bool(value_str).map_err(invalid)?);
            }
            "scoring.parallel-output" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .parallel_output = Some(parser::parse_bool(value_str).map_err(invalid)?);
            }
            "scoring.reference-material" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .reference_material = Some(value_str.to_string());
            }
            "grid.resolution" => {
                config.grid.get_or_insert_with(Default::default).resolution =
                    Some(parser::parse_resolution(value_str).map_err(invalid)?);
            }
            "grid.half-size" => {
                config.grid.get_or_insert_with(Default::default).half_size =
                    Some(parser::parse_vector(value_str).map_err(invalid)?);
            }
            "grid.origin" => {
                config.grid.get_or_insert_with(Default::default).origin =
                    Some(parser::parse_vector(value_str).map_err(invalid)?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{OutputLayout, Variance, WaterEquivalent};
    use letmap::engine::config::{AveragingPolicy, OutputMode};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn base_score_args() -> ScoreArgs {
        ScoreArgs {
            steps: PathBuf::from("steps.csv"),
            stopping_power: PathBuf::from("dedx.csv"),
            output: PathBuf::from("let.mhd"),
            config: None,
            mode: None,
            water_equivalent: WaterEquivalent::default(),
            variance: Variance::default(),
            output_layout: OutputLayout::default(),
            reference_material: None,
            resolution: Some([4, 4, 2]),
            half_size: Some([10.0, 10.0, 5.0]),
            origin: None,
            set_values: vec![],
        }
    }

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("letmap.toml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn build_config_with_cli_grid_and_defaults_for_rest() {
        let app = build_config(&base_score_args()).expect("build ok");

        assert_eq!(app.scoring.policy, AveragingPolicy::DoseAverage);
        assert!(!app.scoring.water_equivalent);
        assert!(!app.scoring.second_moment);
        assert_eq!(app.scoring.output_mode, OutputMode::Merged);
        assert_eq!(
            app.scoring.reference_material.as_str(),
            DefaultsConfig::default().reference_material
        );
        assert_eq!(app.geometry.voxel_count(), 32);
        assert_eq!(app.geometry.origin(), Point3::origin());
    }

    #[test]
    fn build_config_reads_file_and_merges() {
        let (_dir, path) = write_config(
            r#"
            [scoring]
            averaging-mode = "TrackAveragedEdep"
            water-equivalent = true
            second-moment = true
            parallel-output = true

            [grid]
            resolution = [2, 3, 4]
            half-size = [1.0, 1.5, 2.0]
            origin = [5.0, 0.0, 0.0]
            "#,
        );
        let mut args = base_score_args();
        args.config = Some(path);
        args.resolution = None;
        args.half_size = None;

        let app = build_config(&args).expect("build ok");
        assert_eq!(app.scoring.policy, AveragingPolicy::TrackAverageEdep);
        assert!(app.scoring.water_equivalent);
        assert!(app.scoring.second_moment);
        assert_eq!(app.scoring.output_mode, OutputMode::Unmerged);
        assert_eq!(app.geometry.voxel_count(), 24);
        assert_eq!(app.geometry.origin(), Point3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn cli_overrides_file_values() {
        let (_dir, path) = write_config(
            r#"
            [scoring]
            averaging-mode = "TrackAveraged"
            water-equivalent = true

            [grid]
            resolution = [2, 2, 2]
            half-size = [1.0, 1.0, 1.0]
            "#,
        );
        let mut args = base_score_args();
        args.config = Some(path);
        args.mode = Some("dose".to_string());
        args.water_equivalent = WaterEquivalent {
            water: false,
            no_water: true,
        };

        let app = build_config(&args).expect("build ok");
        assert_eq!(app.scoring.policy, AveragingPolicy::DoseAverage);
        assert!(!app.scoring.water_equivalent);
        assert_eq!(app.geometry.voxel_count(), 32);
    }

    #[test]
    fn cli_can_switch_off_file_enabled_toggles() {
        let (_dir, path) = write_config(
            r#"
            [scoring]
            second-moment = true
            parallel-output = true
            "#,
        );
        let mut args = base_score_args();
        args.config = Some(path.clone());
        args.variance = Variance {
            variance: false,
            no_variance: true,
        };
        args.output_layout = OutputLayout {
            parallel_output: false,
            merged_output: true,
        };

        let app = build_config(&args).expect("build ok");
        assert!(!app.scoring.second_moment);
        assert_eq!(app.scoring.output_mode, OutputMode::Merged);

        let mut args = base_score_args();
        args.config = Some(path);
        let app = build_config(&args).expect("build ok");
        assert!(app.scoring.second_moment);
        assert_eq!(app.scoring.output_mode, OutputMode::Unmerged);
    }

    #[test]
    fn resolve_toggle_prefers_cli_then_file_then_default() {
        assert!(resolve_toggle(true, false, Some(false), false));
        assert!(!resolve_toggle(false, true, Some(true), true));
        assert!(resolve_toggle(false, false, Some(true), false));
        assert!(!resolve_toggle(false, false, None, false));
    }

    #[test]
    fn set_values_override() {
        let mut args = base_score_args();
        args.set_values = vec![
            "scoring.averaging-mode=AverageKinEnergy".to_string(),
            "scoring.second-moment=true".to_string(),
            "scoring.reference-material=G4_AIR".to_string(),
            "grid.origin=-1,2,3.5".to_string(),
        ];

        let app = build_config(&args).expect("build ok");
        assert_eq!(app.scoring.policy, AveragingPolicy::AverageKineticEnergy);
        assert!(app.scoring.second_moment);
        assert_eq!(app.scoring.reference_material.as_str(), "G4_AIR");
        assert_eq!(app.geometry.origin(), Point3::new(-1.0, 2.0, 3.5));
    }

    #[test]
    fn unknown_set_key_is_config_error() {
        let mut args = base_score_args();
        args.set_values = vec!["scoring.let-mode=dose".to_string()];
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));
    }

    #[test]
    fn invalid_averaging_mode_is_config_error() {
        let mut args = base_score_args();
        args.mode = Some("fluence".to_string());
        match build_config(&args) {
            Err(CliError::Config(msg)) => assert!(msg.contains("fluence")),
            _ => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn missing_grid_returns_error() {
        let mut args = base_score_args();
        args.resolution = None;
        match build_config(&args) {
            Err(CliError::Config(msg)) => assert!(msg.contains("resolution")),
            _ => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn degenerate_grid_returns_error() {
        let mut args = base_score_args();
        args.resolution = Some([0, 4, 4]);
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));
    }
}
