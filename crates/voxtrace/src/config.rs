//! Application configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `voxtrace.ron` file (if exists)
//! 3. Environment variables prefixed with `VOXTRACE_`
//!
//! Example environment variable: `VOXTRACE_COMPUTE__CONTEXT_INDEX=1`

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub compute: ComputeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Device selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Device the compute context is bound to
    pub context_index: u32,
    /// Devices exposed by the CPU reference engine
    pub device_count: u32,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            context_index: 0,
            device_count: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 0 (warnings only) to 3 (everything)
    pub verbosity: u8,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { verbosity: 1 }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Overrides the deck's seed
    #[serde(default)]
    pub seed: Option<u32>,
}

impl AppConfig {
    /// Load configuration from `voxtrace.ron` in the working directory and the
    /// environment
    pub fn load() -> Result<Self> {
        Self::load_from("voxtrace")
    }

    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. The RON file at `path` (if exists)
    /// 3. Environment variables prefixed with `VOXTRACE_` (highest priority)
    pub fn load_from(path: &str) -> Result<Self> {
        let builder = Config::builder()
            // Layer 1: Compiled defaults
            .set_default("compute.context_index", 0_i64)?
            .set_default("compute.device_count", 1_i64)?
            .set_default("logging.verbosity", 1_i64)?
            // Layer 2: Config file (optional, won't error if missing)
            .add_source(
                File::with_name(path)
                    .format(config::FileFormat::Ron)
                    .required(false),
            )
            // Layer 3: Environment variables (VOXTRACE_LOGGING__VERBOSITY, etc.)
            .add_source(Environment::with_prefix("VOXTRACE").separator("__"));

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.compute.context_index, 0);
        assert_eq!(config.compute.device_count, 1);
        assert_eq!(config.logging.verbosity, 1);
        assert!(config.simulation.seed.is_none());
    }

    #[test]
    fn test_level_mapping() {
        let level = |verbosity| LoggingConfig { verbosity }.level_filter();
        assert_eq!(level(0), LevelFilter::Warn);
        assert_eq!(level(1), LevelFilter::Info);
        assert_eq!(level(2), LevelFilter::Debug);
        assert_eq!(level(3), LevelFilter::Trace);
        assert_eq!(level(7), LevelFilter::Trace);
    }

    #[test]
    fn test_file_layer_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxtrace.ron");
        std::fs::write(
            &path,
            "(compute: (context_index: 1, device_count: 2), simulation: (seed: 42))",
        )
        .unwrap();

        let config = AppConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.compute.context_index, 1);
        assert_eq!(config.compute.device_count, 2);
        assert_eq!(config.simulation.seed, Some(42));
        assert_eq!(config.logging.verbosity, 1);
    }
}
