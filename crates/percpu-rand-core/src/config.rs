//! Stream configuration, loadable from JSON.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keystream::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_PER_KEY, KeystreamLimits};

/// Generator kind held in every core slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Keyed BLAKE3 keystream with periodic rekeying.
    #[default]
    Keyed,
    /// xoshiro256++ partitioned by jump-ahead. Fast, not cryptographic.
    Xoshiro,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyed => write!(f, "keyed"),
            Self::Xoshiro => write!(f, "xoshiro"),
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keyed" => Ok(Self::Keyed),
            "xoshiro" => Ok(Self::Xoshiro),
            other => Err(Error::InvalidConfig(format!(
                "unknown backend '{other}' (expected keyed or xoshiro)"
            ))),
        }
    }
}

/// Settings for [`CoreStreams`](crate::CoreStreams).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub backend: Backend,
    /// Keyed-hash variant name, or `"fastest"` / `"cycle"`.
    pub implementation: String,
    /// Slot count. `None` means one per configured processor.
    pub cores: Option<usize>,
    pub chunk_size: usize,
    pub max_per_key: u64,
    /// Refills timed per variant when `implementation` is `"fastest"`.
    /// Zero keeps whatever the registry already records.
    pub bench_rounds: usize,
}

/// Default benchmark length at init: 256 KiB per variant at the default
/// chunk size.
pub const DEFAULT_BENCH_ROUNDS: usize = 64;

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Keyed,
            implementation: "fastest".to_string(),
            cores: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_per_key: DEFAULT_MAX_PER_KEY,
            bench_rounds: DEFAULT_BENCH_ROUNDS,
        }
    }
}

impl StreamConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn limits(&self) -> KeystreamLimits {
        KeystreamLimits {
            chunk_size: self.chunk_size,
            max_per_key: self.max_per_key,
        }
    }

    /// Slot count to allocate.
    pub fn core_count(&self) -> usize {
        self.cores.unwrap_or_else(crate::percpu::possible_cores)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cores == Some(0) {
            return Err(Error::InvalidConfig("cores must be at least 1".to_string()));
        }
        if self.implementation.is_empty() {
            return Err(Error::InvalidConfig("implementation name is empty".to_string()));
        }
        self.limits().validate()
    }
}
