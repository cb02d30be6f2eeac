use letmap::core::geometry::GridGeometry;
use letmap::engine::config::ScoringConfig;
use std::path::PathBuf;

pub struct AppConfig {
    pub steps_path: PathBuf,
    pub stopping_power_path: PathBuf,
    pub output_base: PathBuf,
    pub geometry: GridGeometry,
    pub scoring: ScoringConfig,
}
