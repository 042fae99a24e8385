//! Pipeline configuration.
//!
//! Parameters that control scheduling behavior: worker pool size,
//! zero-copy dispatch, telemetry and timing capture. Also home of the
//! immutable per-frame physics parameter value.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use orrery_types::constants::FALLBACK_PARALLELISM;
use orrery_types::{OrreryError, OrreryResult};

/// Configuration for the pipeline scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker threads for parallel CPU groups.
    /// `None` uses the host's available parallelism.
    pub max_parallelism: Option<usize>,

    /// Use the zero-copy path for modules and graphs that support it.
    pub zero_copy: bool,

    /// Deliver events to sinks. A disabled bus drops everything.
    pub telemetry: bool,

    /// Record per-module timings in each frame report.
    pub record_timings: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_parallelism: None,
            zero_copy: true,
            telemetry: true,
            record_timings: true,
        }
    }
}

impl PipelineConfig {
    /// Single worker, no zero-copy. Useful for debugging ordering issues.
    pub fn sequential() -> Self {
        Self {
            max_parallelism: Some(1),
            zero_copy: false,
            ..Default::default()
        }
    }

    /// All cores, zero-copy on, no per-module timings.
    pub fn throughput() -> Self {
        Self {
            max_parallelism: None,
            zero_copy: true,
            record_timings: false,
            ..Default::default()
        }
    }

    /// Worker count the pool is built with.
    pub fn effective_parallelism(&self) -> usize {
        self.max_parallelism.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(FALLBACK_PARALLELISM)
        })
    }

    /// Checks value ranges.
    pub fn validate(&self) -> OrreryResult<()> {
        if self.max_parallelism == Some(0) {
            return Err(OrreryError::InvalidConfig(
                "max_parallelism must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> OrreryResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| OrreryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file.
    pub fn load(path: &Path) -> OrreryResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> OrreryResult<String> {
        toml::to_string_pretty(self).map_err(|e| OrreryError::Serialization(e.to_string()))
    }
}

/// Immutable physics parameters threaded into each frame.
///
/// The pipeline captures the current value once per frame and hands the
/// same reference to every dynamic-parameter module in that frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicsParams {
    /// Bumped by the pipeline on every replacement.
    pub revision: u64,
    /// Named scalar parameters.
    pub values: BTreeMap<String, f64>,
}

impl PhysicsParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }
}
