pub mod bench;
pub mod impls;
pub mod report;
pub mod stream;

use percpu_rand_core::{Backend, Result, StreamConfig};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct ConfigOverrides<'a> {
    pub config_path: Option<&'a str>,
    pub backend: Option<&'a str>,
    pub implementation: Option<&'a str>,
    pub cores: Option<usize>,
}

/// Build a stream config from an optional JSON file, then apply CLI flags.
pub fn load_config(overrides: &ConfigOverrides<'_>) -> Result<StreamConfig> {
    let mut config = match overrides.config_path {
        Some(path) => StreamConfig::from_path(path)?,
        None => StreamConfig::default(),
    };
    if let Some(backend) = overrides.backend {
        config.backend = backend.parse::<Backend>()?;
    }
    if let Some(name) = overrides.implementation {
        config.implementation = name.to_string();
    }
    if overrides.cores.is_some() {
        config.cores = overrides.cores;
    }
    config.validate()?;
    Ok(config)
}

/// Lowercase hex, two digits per byte.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Letter grade for a 0-100 quality score.
pub fn grade_for_score(score: f64) -> char {
    if score >= 80.0 {
        'A'
    } else if score >= 60.0 {
        'B'
    } else if score >= 40.0 {
        'C'
    } else if score >= 20.0 {
        'D'
    } else {
        'F'
    }
}
