//! Snapshot manager.
//!
//! Captures and restores the state of serializable modules together with
//! the pipeline's execution count. Snapshots are JSON documents; module
//! states are carried as `serde_json::Value`, so whatever a module saves
//! comes back byte-for-byte equal in structure.
//!
//! Restoring validates the whole snapshot before touching any module.
//! Graph topology is the graph's own concern; a mismatching summary is
//! only logged.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orrery_telemetry::Phase;
use orrery_types::constants::SNAPSHOT_FORMAT_VERSION;
use orrery_types::{OrreryError, OrreryResult};

use crate::executor;
use crate::graph::{GraphSummary, SimGraph};
use crate::pipeline::Pipeline;

/// Point-in-time capture of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub format_version: u32,
    pub tick_id: u64,
    pub graph_summary: GraphSummary,
    pub execution_count: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Saved state per module name.
    #[serde(default)]
    pub module_states: BTreeMap<String, serde_json::Value>,
}

impl PipelineSnapshot {
    /// Checks the format version and module names.
    pub fn validate(&self) -> OrreryResult<()> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(OrreryError::InvalidSnapshot(format!(
                "unsupported format version {} (expected {})",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        if self.module_states.keys().any(|name| name.trim().is_empty()) {
            return Err(OrreryError::InvalidSnapshot(
                "module state with an empty name".into(),
            ));
        }
        Ok(())
    }

    pub fn module_state(&self, name: &str) -> Option<&serde_json::Value> {
        self.module_states.get(name)
    }

    pub fn to_json(&self) -> OrreryResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| OrreryError::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> OrreryResult<Self> {
        serde_json::from_str(text).map_err(|e| OrreryError::Serialization(e.to_string()))
    }

    pub fn write_to(&self, path: &Path) -> OrreryResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> OrreryResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// What a restore did, per module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// `load_state` succeeded.
    pub restored: Vec<String>,
    /// `load_state` failed; the module kept its previous state.
    pub failed: Vec<String>,
    /// Serializable modules with no entry in the snapshot.
    pub missing: Vec<String>,
    /// Entries with no registered serializable module.
    pub unmatched: Vec<String>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.missing.is_empty()
    }
}

impl Pipeline {
    /// Captures every registered serializable module.
    ///
    /// A module whose `save_state` fails is skipped with a warning; a
    /// module returning `None` is omitted.
    pub fn save_snapshot(
        &self,
        graph: &dyn SimGraph,
        tick_id: u64,
        description: Option<&str>,
    ) -> PipelineSnapshot {
        let execution_count = self.execution_count();
        let mut module_states = BTreeMap::new();

        for descriptor in self.registered() {
            if !descriptor.capabilities().serializable {
                continue;
            }
            let Some(serializable) = descriptor.module().as_serializable() else {
                continue;
            };
            let name = descriptor.name();
            match executor::contain(name, || serializable.save_state()) {
                Ok(Some(state)) => {
                    module_states.insert(name.to_string(), state);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(module = name, error = %err, "skipping module state in snapshot");
                    self.classifier()
                        .classify(name, &err, Phase::SaveState, execution_count);
                }
            }
        }

        tracing::debug!(tick_id, modules = module_states.len(), "snapshot saved");
        PipelineSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            tick_id,
            graph_summary: graph.summary(),
            execution_count,
            timestamp: Utc::now(),
            description: description.map(str::to_string),
            module_states,
        }
    }

    /// Restores module states and the execution count.
    ///
    /// Fails with `InvalidSnapshot` before any mutation if validation
    /// fails. Per-module load failures are reported and skipped.
    pub fn load_snapshot(
        &self,
        graph: &dyn SimGraph,
        snapshot: &PipelineSnapshot,
    ) -> OrreryResult<RestoreReport> {
        snapshot.validate()?;

        let summary = graph.summary();
        if summary != snapshot.graph_summary {
            tracing::warn!(
                saved = ?snapshot.graph_summary,
                current = ?summary,
                "snapshot graph summary differs from current graph"
            );
        }

        let mut report = RestoreReport::default();
        let mut seen = Vec::new();
        for descriptor in self.registered() {
            if !descriptor.capabilities().serializable {
                continue;
            }
            let Some(serializable) = descriptor.module().as_serializable() else {
                continue;
            };
            let name = descriptor.name();
            let Some(state) = snapshot.module_state(name) else {
                report.missing.push(name.to_string());
                continue;
            };
            seen.push(name.to_string());
            match executor::contain(name, || serializable.load_state(state)) {
                Ok(()) => report.restored.push(name.to_string()),
                Err(err) => {
                    self.classifier()
                        .classify(name, &err, Phase::LoadState, self.execution_count());
                    report.failed.push(name.to_string());
                }
            }
        }
        report.unmatched = snapshot
            .module_states
            .keys()
            .filter(|name| !seen.contains(name))
            .cloned()
            .collect();

        self.restore_execution_count(snapshot.execution_count);
        tracing::info!(
            tick_id = snapshot.tick_id,
            restored = report.restored.len(),
            failed = report.failed.len(),
            "snapshot restored"
        );
        self.log(format!(
            "restored snapshot of tick {} ({} modules)",
            snapshot.tick_id,
            report.restored.len()
        ));
        self.bus().flush();
        Ok(report)
    }
}
