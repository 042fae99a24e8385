//! Benchmark scenarios: oscillator graph + module set + config per case.
//!
//! Four canonical scenarios:
//! 1. **Sequential**: one worker, plain CPU modules, no zero-copy
//! 2. **Parallel**: a wide parallel diagnostics group on the worker pool
//! 3. **Async heavy**: many async diagnostics in one batch
//! 4. **Multi device**: GPU relaxation split over two host-backed devices

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use orrery_gpu::HostSync;
use orrery_pipeline::{BufferGraph, PhysicsModule, Pipeline, PipelineConfig};
use orrery_types::{DeviceId, OrreryResult};

use crate::modules::{
    Coupling, GpuRelaxation, OrderParameter, PhaseDrift, PhaseStatistics, PhaseWrap, WeightDecay,
};

/// Which benchmark scenario to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioKind {
    /// Single worker, sequential groups only.
    Sequential,
    /// Parallel CPU group with several heavy members.
    Parallel,
    /// Several async tasks in one batch.
    AsyncHeavy,
    /// GPU work on two devices.
    MultiDevice,
}

impl ScenarioKind {
    /// Returns all scenario kinds.
    pub fn all() -> &'static [ScenarioKind] {
        &[
            ScenarioKind::Sequential,
            ScenarioKind::Parallel,
            ScenarioKind::AsyncHeavy,
            ScenarioKind::MultiDevice,
        ]
    }

    /// Returns a human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Sequential => "sequential",
            ScenarioKind::Parallel => "parallel",
            ScenarioKind::AsyncHeavy => "async_heavy",
            ScenarioKind::MultiDevice => "multi_device",
        }
    }

    /// Parses a name produced by [`ScenarioKind::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.name() == name)
    }
}

/// A fully specified benchmark scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario type.
    pub kind: ScenarioKind,
    /// Oscillator count.
    pub nodes: usize,
    /// Number of frames to run.
    pub frames: u32,
    /// Timestep size (seconds).
    pub dt: f64,
    /// Coupling strength `K`.
    pub coupling: f64,
    /// Scheduler configuration.
    pub config: PipelineConfig,
}

impl Scenario {
    /// Builds the default scenario for `kind`.
    pub fn from_kind(kind: ScenarioKind) -> Self {
        match kind {
            ScenarioKind::Sequential => Self::sequential(),
            ScenarioKind::Parallel => Self::parallel(),
            ScenarioKind::AsyncHeavy => Self::async_heavy(),
            ScenarioKind::MultiDevice => Self::multi_device(),
        }
    }

    /// 256 oscillators, 300 frames at 60 fps, one worker.
    pub fn sequential() -> Self {
        Self {
            kind: ScenarioKind::Sequential,
            nodes: 256,
            frames: 300,
            dt: 1.0 / 60.0,
            coupling: 2.0,
            config: PipelineConfig::sequential(),
        }
    }

    /// 1024 oscillators with four heavy parallel statistics modules.
    pub fn parallel() -> Self {
        Self {
            kind: ScenarioKind::Parallel,
            nodes: 1024,
            frames: 120,
            dt: 1.0 / 60.0,
            coupling: 2.0,
            config: PipelineConfig::throughput(),
        }
    }

    /// 512 oscillators with eight async order-parameter tasks.
    pub fn async_heavy() -> Self {
        Self {
            kind: ScenarioKind::AsyncHeavy,
            nodes: 512,
            frames: 120,
            dt: 1.0 / 60.0,
            coupling: 2.0,
            config: PipelineConfig::default(),
        }
    }

    /// 512 oscillators, edge relaxation on devices 0 and 1.
    pub fn multi_device() -> Self {
        Self {
            kind: ScenarioKind::MultiDevice,
            nodes: 512,
            frames: 120,
            dt: 1.0 / 60.0,
            coupling: 2.0,
            config: PipelineConfig::default(),
        }
    }

    /// Ring with skip-3 chords. Natural rates spread evenly over
    /// `[0.5, 1.5)`, initial phases spread over the circle.
    pub fn graph(&self) -> OrreryResult<BufferGraph> {
        oscillator_graph(self.nodes)
    }

    /// Builds a pipeline with this scenario's modules registered.
    pub fn build_pipeline(&self) -> OrreryResult<Pipeline> {
        let pipeline = Pipeline::new(self.config.clone())?;
        for module in self.modules() {
            pipeline.register(module)?;
        }
        if self.kind == ScenarioKind::MultiDevice {
            for device in [DeviceId(0), DeviceId(1)] {
                pipeline.register_sync_manager(
                    device,
                    Arc::new(HostSync::new(format!("host:{}", device.raw()))),
                );
            }
        }
        Ok(pipeline)
    }

    fn modules(&self) -> Vec<Arc<dyn PhysicsModule>> {
        let mut modules: Vec<Arc<dyn PhysicsModule>> = vec![
            Arc::new(Coupling::new(self.coupling as f32)),
            Arc::new(PhaseDrift),
            Arc::new(PhaseWrap),
        ];
        match self.kind {
            ScenarioKind::Sequential => {
                modules.push(Arc::new(WeightDecay::default()));
                modules.push(Arc::new(OrderParameter::default()));
            }
            ScenarioKind::Parallel => {
                for i in 0..4 {
                    modules.push(Arc::new(PhaseStatistics::new(format!("stats-{i}"), 64)));
                }
            }
            ScenarioKind::AsyncHeavy => {
                for i in 0..8 {
                    modules.push(Arc::new(OrderParameter::new(format!("order-{i}"))));
                }
            }
            ScenarioKind::MultiDevice => {
                modules.push(Arc::new(WeightDecay::default()));
                modules.push(Arc::new(GpuRelaxation::new("relax-0", DeviceId(0), 0.5)));
                modules.push(Arc::new(GpuRelaxation::new("relax-1", DeviceId(1), 0.5)));
                modules.push(Arc::new(OrderParameter::default()));
            }
        }
        modules
    }
}

/// Builds the benchmark oscillator graph with `nodes` nodes.
pub fn oscillator_graph(nodes: usize) -> OrreryResult<BufferGraph> {
    let mut edges = Vec::with_capacity(nodes * 2);
    if nodes > 1 {
        for i in 0..nodes {
            edges.push([i as u32, ((i + 1) % nodes) as u32]);
        }
    }
    if nodes > 6 {
        for i in 0..nodes {
            edges.push([i as u32, ((i + 3) % nodes) as u32]);
        }
    }

    let graph = BufferGraph::new(nodes, edges)?;
    {
        let mut guard = graph.state();
        let state = &mut *guard;
        let n = nodes.max(1) as f32;
        for (i, (phase, rate)) in state
            .phases
            .iter_mut()
            .zip(state.rates.iter_mut())
            .enumerate()
        {
            let t = i as f32 / n;
            *phase = t * std::f32::consts::TAU;
            *rate = 0.5 + t;
        }
    }
    Ok(graph)
}
