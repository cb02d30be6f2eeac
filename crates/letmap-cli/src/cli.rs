use crate::utils::parser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "LETmap Developers",
    version,
    about = "LETmap CLI - Score recorded particle steps into per-voxel LET maps and merge partial outputs from parallel runs.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score a recorded step file into LET (and variance) images.
    Score(ScoreArgs),
    /// Sum the partial outputs of parallel-mode runs and divide once.
    Merge(MergeArgs),
}

/// Arguments for the `score` subcommand.
#[derive(Args, Debug)]
pub struct ScoreArgs {
    // --- Core Arguments ---
    /// Path to the recorded step file (CSV with positions).
    #[arg(short = 'i', long, required = true, value_name = "PATH")]
    pub steps: PathBuf,

    /// Path to the stopping power table (CSV).
    #[arg(short = 'p', long, required = true, value_name = "PATH")]
    pub stopping_power: PathBuf,

    /// Base path of the output images (e.g., let.mhd). Suffixes are derived
    /// from the averaging mode and modifiers.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Scoring Overrides ---
    /// Override the averaging mode (e.g., 'DoseAveraged', 'TrackAveraged').
    #[arg(short, long, value_name = "LABEL")]
    pub mode: Option<String>,

    /// Override `scoring.water-equivalent` from the config file.
    #[command(flatten)]
    pub water_equivalent: WaterEquivalent,

    /// Override `scoring.second-moment` from the config file.
    #[command(flatten)]
    pub variance: Variance,

    /// Override `scoring.parallel-output` from the config file.
    #[command(flatten)]
    pub output_layout: OutputLayout,

    /// Override the reference material of the water-equivalent conversion.
    #[arg(long, value_name = "NAME")]
    pub reference_material: Option<String>,

    // --- Grid Overrides ---
    /// Number of voxels along x, y and z.
    #[arg(long, value_name = "X,Y,Z", value_parser = parser::parse_resolution)]
    pub resolution: Option<[usize; 3]>,

    /// Half of the physical extent along x, y and z, in mm.
    #[arg(long, value_name = "X,Y,Z", value_parser = parser::parse_vector)]
    pub half_size: Option<[f64; 3]>,

    /// Physical centre of the volume, in mm.
    #[arg(long, value_name = "X,Y,Z", value_parser = parser::parse_vector, allow_hyphen_values = true)]
    pub origin: Option<[f64; 3]>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S scoring.averaging-mode=TrackAveraged
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// A group to handle mutually exclusive flags for the water-equivalent conversion.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct WaterEquivalent {
    /// Convert the LET to its water-equivalent value.
    #[arg(long)]
    pub water: bool,
    /// Keep the LET in the step material, even if the config file enables conversion.
    #[arg(long)]
    pub no_water: bool,
}

/// Mutually exclusive flags for second-moment tracking.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct Variance {
    /// Track the second moment and write a variance image.
    #[arg(long)]
    pub variance: bool,
    /// Do not track the second moment, even if the config file enables it.
    #[arg(long)]
    pub no_variance: bool,
}

/// Mutually exclusive flags choosing divided or raw-sum output.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct OutputLayout {
    /// Write raw numerator/denominator sums instead of the divided LET.
    #[arg(long)]
    pub parallel_output: bool,
    /// Write the divided LET, even if the config file enables parallel output.
    #[arg(long)]
    pub merged_output: bool,
}

/// Arguments for the `merge` subcommand.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// LET paths of the parallel-mode runs to merge (e.g., run1/let-doseAveraged.mhd).
    /// The numerator and denominator images are found next to each path.
    #[arg(short, long, required = true, num_args = 1.., value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Path of the merged LET image; the variance image is written next to it.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Read the unnormalized second moments and write a variance image.
    #[arg(long)]
    pub variance: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_command_parses_grid_triples_and_flags() {
        let cli = Cli::parse_from([
            "letmap",
            "-vv",
            "score",
            "-i",
            "steps.csv",
            "-p",
            "dedx.csv",
            "-o",
            "let.mhd",
            "--mode",
            "TrackAveraged",
            "--water",
            "--variance",
            "--resolution",
            "10,20,30",
            "--origin",
            "-1.5,0,2",
            "-S",
            "scoring.parallel-output=true",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Score(args) = cli.command else {
            panic!("Expected 'score' subcommand");
        };
        assert_eq!(args.mode.as_deref(), Some("TrackAveraged"));
        assert!(args.water_equivalent.water);
        assert!(args.variance.variance);
        assert!(!args.output_layout.parallel_output);
        assert_eq!(args.resolution, Some([10, 20, 30]));
        assert_eq!(args.origin, Some([-1.5, 0.0, 2.0]));
        assert_eq!(args.half_size, None);
        assert_eq!(args.set_values, vec!["scoring.parallel-output=true"]);
    }

    #[test]
    fn water_flags_are_mutually_exclusive() {
        let result = Cli::try_parse_from([
            "letmap", "score", "-i", "s.csv", "-p", "d.csv", "-o", "o.mhd", "--water",
            "--no-water",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn variance_and_output_layout_flags_are_mutually_exclusive() {
        let base = ["letmap", "score", "-i", "s.csv", "-p", "d.csv", "-o", "o.mhd"];
        let with = |extra: &[&'static str]| {
            Cli::try_parse_from(base.iter().chain(extra.iter()).copied())
        };
        assert!(with(&["--variance", "--no-variance"]).is_err());
        assert!(with(&["--parallel-output", "--merged-output"]).is_err());

        let Commands::Score(args) = with(&["--no-variance", "--merged-output"]).unwrap().command
        else {
            panic!("Expected 'score' subcommand");
        };
        assert!(args.variance.no_variance);
        assert!(args.output_layout.merged_output);
    }

    #[test]
    fn merge_command_takes_several_inputs() {
        let cli = Cli::parse_from([
            "letmap", "merge", "-i", "a.mhd", "b.mhd", "-o", "merged.mhd", "--variance",
        ]);
        let Commands::Merge(args) = cli.command else {
            panic!("Expected 'merge' subcommand");
        };
        assert_eq!(args.inputs.len(), 2);
        assert!(args.variance);
    }
}
