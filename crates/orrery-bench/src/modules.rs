//! Demo physics modules over a [`BufferGraph`]-style phase oscillator
//! network (Kuramoto model).
//!
//! Each node carries a phase and a natural rate; each edge a coupling
//! weight. The modules split one simulation step across the pipeline's
//! stages and substrates:
//!
//! | Module           | Stage        | Kind     | Capabilities               |
//! |------------------|--------------|----------|----------------------------|
//! | [`Coupling`]     | Forces       | SyncCpu  | zero-copy, dynamic params  |
//! | [`WeightDecay`]  | Forces       | SyncCpu  | dynamic params             |
//! | [`GpuRelaxation`]| Forces       | Gpu      |                            |
//! | [`PhaseDrift`]   | Integration  | SyncCpu  | zero-copy                  |
//! | [`PhaseWrap`]    | PostProcess  | SyncCpu  |                            |
//! | [`PhaseStatistics`] | PostProcess | SyncCpu (parallel group) | serializable |
//! | [`OrderParameter`]  | PostProcess | AsyncTask | serializable            |
//!
//! [`BufferGraph`]: orrery_pipeline::BufferGraph

use std::f32::consts::TAU;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use orrery_pipeline::{
    DynamicParameters, ExecutionKind, GraphBuffers, GroupMode, ModuleCatalog, PhysicsModule,
    PhysicsParams, SerializableModule, SimGraph, Stage, ZeroCopyModule,
};
use orrery_types::{DeviceId, OrreryError, OrreryResult};

/// Parameter key for the coupling strength `K`.
pub const COUPLING_KEY: &str = "coupling";
/// Parameter key for the weight decay rate.
pub const DECAY_KEY: &str = "decay";

/// Runs `f` over the graph's buffers; graphs without buffers are a no-op.
fn over_buffers(
    graph: &dyn SimGraph,
    mut f: impl FnMut(GraphBuffers<'_>),
) -> OrreryResult<()> {
    graph
        .with_buffers(&mut |buffers| {
            f(buffers);
            Ok(())
        })
        .unwrap_or(Ok(()))
}

/// Kuramoto order parameter `r = |mean(e^{iθ})|`, in `[0, 1]`.
pub fn order_parameter(phases: &[f32]) -> f64 {
    if phases.is_empty() {
        return 0.0;
    }
    let (re, im) = phases.iter().fold((0.0f64, 0.0f64), |(re, im), &theta| {
        let theta = f64::from(theta);
        (re + theta.cos(), im + theta.sin())
    });
    let n = phases.len() as f64;
    ((re / n).powi(2) + (im / n).powi(2)).sqrt()
}

// ─── Coupling ────────────────────────────────────────────────

/// Pairwise sine coupling along edges.
pub struct Coupling {
    strength: Mutex<f32>,
}

impl Coupling {
    pub fn new(strength: f32) -> Self {
        Self {
            strength: Mutex::new(strength),
        }
    }

    pub fn strength(&self) -> f32 {
        *self.strength.lock()
    }

    fn couple(buffers: GraphBuffers<'_>, strength: f32, dt: f32) {
        let n = buffers.phases.len();
        let mut pull = vec![0.0f32; n];
        let mut degree = vec![0u32; n];
        for (&[a, b], &w) in buffers.edges.iter().zip(buffers.weights.iter()) {
            let (a, b) = (a as usize, b as usize);
            let diff = (buffers.phases[b] - buffers.phases[a]).sin() * w;
            pull[a] += diff;
            pull[b] -= diff;
            degree[a] += 1;
            degree[b] += 1;
        }
        for ((phase, pull), degree) in buffers.phases.iter_mut().zip(&pull).zip(&degree) {
            if *degree > 0 {
                *phase += dt * strength * pull / *degree as f32;
            }
        }
    }
}

impl Default for Coupling {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PhysicsModule for Coupling {
    fn name(&self) -> &str {
        "coupling"
    }

    fn stage(&self) -> Stage {
        Stage::Forces
    }

    fn category(&self) -> &str {
        "forces"
    }

    fn execute_step(&self, graph: &dyn SimGraph, dt: f64) -> OrreryResult<()> {
        let strength = self.strength();
        over_buffers(graph, |buffers| Self::couple(buffers, strength, dt as f32))
    }

    fn as_zero_copy(&self) -> Option<&dyn ZeroCopyModule> {
        Some(self)
    }

    fn as_dynamic(&self) -> Option<&dyn DynamicParameters> {
        Some(self)
    }
}

impl ZeroCopyModule for Coupling {
    fn execute_span(&self, buffers: GraphBuffers<'_>, dt: f64) -> OrreryResult<()> {
        Self::couple(buffers, self.strength(), dt as f32);
        Ok(())
    }
}

impl DynamicParameters for Coupling {
    fn update_parameters(&self, params: &PhysicsParams) -> OrreryResult<()> {
        if let Some(strength) = params.get(COUPLING_KEY) {
            if !strength.is_finite() {
                return Err(OrreryError::module(format!(
                    "coupling strength must be finite, got {strength}"
                )));
            }
            *self.strength.lock() = strength as f32;
        }
        Ok(())
    }
}

// ─── Weight Decay ────────────────────────────────────────────

/// Exponential decay of edge weights.
pub struct WeightDecay {
    rate: Mutex<f32>,
}

impl WeightDecay {
    pub fn new(rate: f32) -> Self {
        Self {
            rate: Mutex::new(rate),
        }
    }
}

impl Default for WeightDecay {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl PhysicsModule for WeightDecay {
    fn name(&self) -> &str {
        "decay"
    }

    fn stage(&self) -> Stage {
        Stage::Forces
    }

    fn priority(&self) -> i32 {
        10
    }

    fn category(&self) -> &str {
        "edges"
    }

    fn module_group(&self) -> Option<&str> {
        Some("edges")
    }

    fn execute_step(&self, graph: &dyn SimGraph, dt: f64) -> OrreryResult<()> {
        let factor = (1.0 - *self.rate.lock() * dt as f32).max(0.0);
        over_buffers(graph, |buffers| {
            for w in buffers.weights.iter_mut() {
                *w *= factor;
            }
        })
    }

    fn as_dynamic(&self) -> Option<&dyn DynamicParameters> {
        Some(self)
    }
}

impl DynamicParameters for WeightDecay {
    fn update_parameters(&self, params: &PhysicsParams) -> OrreryResult<()> {
        if let Some(rate) = params.get(DECAY_KEY) {
            *self.rate.lock() = rate.max(0.0) as f32;
        }
        Ok(())
    }
}

// ─── GPU Relaxation ──────────────────────────────────────────

/// Relaxes edge weights back toward 1. Dispatched as GPU work.
pub struct GpuRelaxation {
    name: String,
    device: DeviceId,
    rate: f32,
}

impl GpuRelaxation {
    pub fn new(name: impl Into<String>, device: DeviceId, rate: f32) -> Self {
        Self {
            name: name.into(),
            device,
            rate,
        }
    }
}

impl PhysicsModule for GpuRelaxation {
    fn name(&self) -> &str {
        &self.name
    }

    fn execution_kind(&self) -> ExecutionKind {
        ExecutionKind::Gpu
    }

    fn stage(&self) -> Stage {
        Stage::Forces
    }

    fn priority(&self) -> i32 {
        20
    }

    fn category(&self) -> &str {
        "edges"
    }

    fn module_group(&self) -> Option<&str> {
        Some("edges")
    }

    fn preferred_device(&self) -> DeviceId {
        self.device
    }

    fn execute_step(&self, graph: &dyn SimGraph, dt: f64) -> OrreryResult<()> {
        let step = (self.rate * dt as f32).min(1.0);
        over_buffers(graph, |buffers| {
            for w in buffers.weights.iter_mut() {
                *w += (1.0 - *w) * step;
            }
        })
    }
}

// ─── Phase Drift ─────────────────────────────────────────────

/// Explicit Euler integration of the natural rates.
#[derive(Default)]
pub struct PhaseDrift;

impl PhaseDrift {
    fn drift(buffers: GraphBuffers<'_>, dt: f32) {
        for (phase, rate) in buffers.phases.iter_mut().zip(buffers.rates.iter()) {
            *phase += rate * dt;
        }
    }
}

impl PhysicsModule for PhaseDrift {
    fn name(&self) -> &str {
        "drift"
    }

    fn stage(&self) -> Stage {
        Stage::Integration
    }

    fn category(&self) -> &str {
        "integrators"
    }

    fn exclusive_group(&self) -> Option<&str> {
        Some("integrator")
    }

    fn execute_step(&self, graph: &dyn SimGraph, dt: f64) -> OrreryResult<()> {
        over_buffers(graph, |buffers| Self::drift(buffers, dt as f32))
    }

    fn as_zero_copy(&self) -> Option<&dyn ZeroCopyModule> {
        Some(self)
    }
}

impl ZeroCopyModule for PhaseDrift {
    fn execute_span(&self, buffers: GraphBuffers<'_>, dt: f64) -> OrreryResult<()> {
        Self::drift(buffers, dt as f32);
        Ok(())
    }
}

// ─── Phase Wrap ──────────────────────────────────────────────

/// Wraps phases into `[0, 2π)`.
#[derive(Default)]
pub struct PhaseWrap;

impl PhysicsModule for PhaseWrap {
    fn name(&self) -> &str {
        "wrap"
    }

    fn stage(&self) -> Stage {
        Stage::PostProcess
    }

    fn category(&self) -> &str {
        "integrators"
    }

    fn execute_step(&self, graph: &dyn SimGraph, _dt: f64) -> OrreryResult<()> {
        over_buffers(graph, |buffers| {
            for phase in buffers.phases.iter_mut() {
                *phase = phase.rem_euclid(TAU);
            }
        })
    }
}

// ─── Diagnostics ─────────────────────────────────────────────

/// Saved state of the diagnostic modules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticState {
    /// Most recent value.
    pub last: f64,
    /// Running mean over all samples.
    pub mean: f64,
    pub samples: u64,
}

impl DiagnosticState {
    fn push(&mut self, value: f64) {
        self.samples += 1;
        self.mean += (value - self.mean) / self.samples as f64;
        self.last = value;
    }
}

fn save_diagnostic(state: &Mutex<DiagnosticState>) -> OrreryResult<Option<serde_json::Value>> {
    let state = *state.lock();
    if state.samples == 0 {
        return Ok(None);
    }
    serde_json::to_value(state)
        .map(Some)
        .map_err(|e| OrreryError::Serialization(e.to_string()))
}

fn load_diagnostic(
    state: &Mutex<DiagnosticState>,
    value: &serde_json::Value,
) -> OrreryResult<()> {
    let restored: DiagnosticState = serde_json::from_value(value.clone())
        .map_err(|e| OrreryError::Serialization(e.to_string()))?;
    *state.lock() = restored;
    Ok(())
}

/// Copies the current phases out of the graph.
fn read_phases(graph: &dyn SimGraph) -> OrreryResult<Vec<f32>> {
    let mut phases = Vec::new();
    over_buffers(graph, |buffers| phases.extend_from_slice(buffers.phases))?;
    Ok(phases)
}

/// Tracks the Kuramoto order parameter. Runs as an async task.
pub struct OrderParameter {
    name: String,
    state: Mutex<DiagnosticState>,
}

impl OrderParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(DiagnosticState::default()),
        }
    }

    pub fn state(&self) -> DiagnosticState {
        *self.state.lock()
    }
}

impl Default for OrderParameter {
    fn default() -> Self {
        Self::new("order")
    }
}

impl PhysicsModule for OrderParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn execution_kind(&self) -> ExecutionKind {
        ExecutionKind::AsyncTask
    }

    fn stage(&self) -> Stage {
        Stage::PostProcess
    }

    fn priority(&self) -> i32 {
        50
    }

    fn category(&self) -> &str {
        "diagnostics"
    }

    fn module_group(&self) -> Option<&str> {
        Some("diagnostics")
    }

    fn execute_step(&self, graph: &dyn SimGraph, _dt: f64) -> OrreryResult<()> {
        let r = order_parameter(&read_phases(graph)?);
        self.state.lock().push(r);
        Ok(())
    }

    fn as_serializable(&self) -> Option<&dyn SerializableModule> {
        Some(self)
    }
}

impl SerializableModule for OrderParameter {
    fn save_state(&self) -> OrreryResult<Option<serde_json::Value>> {
        save_diagnostic(&self.state)
    }

    fn load_state(&self, state: &serde_json::Value) -> OrreryResult<()> {
        load_diagnostic(&self.state, state)
    }
}

/// Circular variance of the phases, recomputed `passes` times to give the
/// parallel scenario real work.
pub struct PhaseStatistics {
    name: String,
    passes: usize,
    state: Mutex<DiagnosticState>,
}

impl PhaseStatistics {
    pub fn new(name: impl Into<String>, passes: usize) -> Self {
        Self {
            name: name.into(),
            passes: passes.max(1),
            state: Mutex::new(DiagnosticState::default()),
        }
    }

    pub fn state(&self) -> DiagnosticState {
        *self.state.lock()
    }
}

impl PhysicsModule for PhaseStatistics {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> Stage {
        Stage::PostProcess
    }

    fn priority(&self) -> i32 {
        50
    }

    fn category(&self) -> &str {
        "diagnostics"
    }

    fn module_group(&self) -> Option<&str> {
        Some("diagnostics")
    }

    fn group_mode(&self) -> GroupMode {
        GroupMode::Parallel
    }

    fn execute_step(&self, graph: &dyn SimGraph, _dt: f64) -> OrreryResult<()> {
        let phases = read_phases(graph)?;
        let mut variance = 0.0;
        for _ in 0..self.passes {
            variance = 1.0 - order_parameter(&phases);
        }
        self.state.lock().push(variance);
        Ok(())
    }

    fn as_serializable(&self) -> Option<&dyn SerializableModule> {
        Some(self)
    }
}

impl SerializableModule for PhaseStatistics {
    fn save_state(&self) -> OrreryResult<Option<serde_json::Value>> {
        save_diagnostic(&self.state)
    }

    fn load_state(&self, state: &serde_json::Value) -> OrreryResult<()> {
        load_diagnostic(&self.state, state)
    }
}

// ─── Catalog ─────────────────────────────────────────────────

/// Catalog of the demo modules, keyed by module name.
///
/// GPU relaxation is registered for the auto device; per-device
/// instances are built by the scenarios.
pub fn demo_catalog() -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    catalog
        .add("coupling", || Arc::new(Coupling::default()) as Arc<dyn PhysicsModule>)
        .add("decay", || Arc::new(WeightDecay::default()) as Arc<dyn PhysicsModule>)
        .add("relax", || {
            Arc::new(GpuRelaxation::new("relax", DeviceId::AUTO, 0.5)) as Arc<dyn PhysicsModule>
        })
        .add("drift", || Arc::new(PhaseDrift) as Arc<dyn PhysicsModule>)
        .add("wrap", || Arc::new(PhaseWrap) as Arc<dyn PhysicsModule>)
        .add("order", || Arc::new(OrderParameter::default()) as Arc<dyn PhysicsModule>)
        .add("stats", || {
            Arc::new(PhaseStatistics::new("stats", 1)) as Arc<dyn PhysicsModule>
        });
    catalog
}
