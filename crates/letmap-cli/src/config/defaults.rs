use letmap::engine::config::DEFAULT_REFERENCE_MATERIAL;

pub struct DefaultsConfig {
    pub averaging_mode: String,
    pub water_equivalent: bool,
    pub second_moment: bool,
    pub parallel_output: bool,
    pub reference_material: String,
    pub origin: [f64; 3],
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            averaging_mode: "DoseAveraged".to_string(),
            water_equivalent: false,
            second_moment: false,
            parallel_output: false,
            reference_material: DEFAULT_REFERENCE_MATERIAL.to_string(),
            origin: [0.0, 0.0, 0.0],
        }
    }
}
