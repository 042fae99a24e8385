//! TOML simulation descriptions.
//!
//! A simulation file names the graph size, the frame loop, the modules
//! to install from the demo catalog and the scheduler settings:
//!
//! ```toml
//! nodes = 256
//! frames = 600
//! dt = 0.016
//! modules = ["coupling", "drift", "wrap", "order"]
//!
//! [pipeline]
//! max_parallelism = 4
//!
//! [params]
//! coupling = 1.5
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use orrery_pipeline::{BufferGraph, PhysicsParams, Pipeline, PipelineConfig};
use orrery_types::constants::DEFAULT_DT;
use orrery_types::{OrreryError, OrreryResult};

use crate::modules::demo_catalog;
use crate::scenarios::oscillator_graph;

/// A simulation run described in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationFile {
    /// Oscillator count.
    pub nodes: usize,
    /// Frames to run.
    pub frames: u32,
    /// Timestep (seconds).
    pub dt: f64,
    /// Demo catalog entries to register, in order.
    pub modules: Vec<String>,
    /// Scheduler settings.
    pub pipeline: PipelineConfig,
    /// Initial physics parameters.
    pub params: BTreeMap<String, f64>,
    /// Where to write a snapshot after the last frame.
    pub snapshot: Option<PathBuf>,
}

impl Default for SimulationFile {
    fn default() -> Self {
        Self {
            nodes: 128,
            frames: 60,
            dt: DEFAULT_DT,
            modules: ["coupling", "drift", "wrap", "order"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            pipeline: PipelineConfig::default(),
            params: BTreeMap::new(),
            snapshot: None,
        }
    }
}

impl SimulationFile {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> OrreryResult<Self> {
        let file: Self =
            toml::from_str(text).map_err(|e| OrreryError::InvalidConfig(e.to_string()))?;
        file.validate()?;
        Ok(file)
    }

    /// Reads a TOML file.
    pub fn load(path: &Path) -> OrreryResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges and module names.
    pub fn validate(&self) -> OrreryResult<()> {
        self.pipeline.validate()?;
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(OrreryError::InvalidConfig(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        let catalog = demo_catalog();
        if let Some(unknown) = self.modules.iter().find(|m| !catalog.contains(m)) {
            return Err(OrreryError::InvalidConfig(format!(
                "unknown module '{unknown}', expected one of: {}",
                catalog.names().join(", ")
            )));
        }
        Ok(())
    }

    /// Initial parameter set.
    pub fn physics_params(&self) -> PhysicsParams {
        self.params
            .iter()
            .fold(PhysicsParams::new(), |params, (key, &value)| {
                params.with(key.clone(), value)
            })
    }

    /// Builds the graph and a pipeline with the listed modules installed
    /// and the initial parameters applied.
    pub fn build(&self) -> OrreryResult<(Pipeline, BufferGraph)> {
        let graph = oscillator_graph(self.nodes)?;
        let pipeline = Pipeline::new(self.pipeline.clone())?;
        demo_catalog().install(&pipeline, &self.modules)?;
        pipeline.set_parameters(self.physics_params());
        Ok((pipeline, graph))
    }
}
