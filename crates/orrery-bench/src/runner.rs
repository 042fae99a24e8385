//! Benchmark runner: executes scenarios and collects metrics.

use std::time::Instant;

use orrery_pipeline::{PhysicsParams, SimGraph};
use orrery_types::OrreryResult;

use crate::metrics::BenchmarkMetrics;
use crate::modules::{order_parameter, COUPLING_KEY};
use crate::scenarios::{Scenario, ScenarioKind};

/// Runs benchmark scenarios and collects metrics.
pub struct BenchmarkRunner;

impl BenchmarkRunner {
    /// Run a single scenario on a fresh pipeline and graph.
    ///
    /// A fatal module error aborts the run and is returned.
    pub fn run(scenario: &Scenario) -> OrreryResult<BenchmarkMetrics> {
        let graph = scenario.graph()?;
        let pipeline = scenario.build_pipeline()?;
        pipeline.set_parameters(PhysicsParams::new().with(COUPLING_KEY, scenario.coupling));
        pipeline.initialize_all(&graph)?;

        let mut frame_times: Vec<f64> = Vec::with_capacity(scenario.frames as usize);
        let mut recoverable_errors = 0;

        let total_start = Instant::now();
        for _ in 0..scenario.frames {
            let report = pipeline.execute_frame(&graph, scenario.dt)?;
            frame_times.push(report.wall_time.as_secs_f64());
            recoverable_errors += report.failures.len();
        }
        let total_wall_time = total_start.elapsed().as_secs_f64();

        let avg_frame = if frame_times.is_empty() {
            0.0
        } else {
            frame_times.iter().sum::<f64>() / frame_times.len() as f64
        };
        let min_frame = if frame_times.is_empty() {
            0.0
        } else {
            frame_times.iter().copied().fold(f64::MAX, f64::min)
        };
        let max_frame = frame_times.iter().copied().fold(0.0, f64::max);

        tracing::info!(
            scenario = scenario.kind.name(),
            frames = scenario.frames,
            total_wall_time,
            "benchmark finished"
        );

        Ok(BenchmarkMetrics {
            scenario: scenario.kind.name().to_string(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            module_count: pipeline.len(),
            frames: scenario.frames,
            total_wall_time,
            avg_frame_time: avg_frame,
            min_frame_time: min_frame,
            max_frame_time: max_frame,
            recoverable_errors,
            view_rebuilds: pipeline.view_rebuilds(),
            final_order_parameter: order_parameter(&graph.phases()),
        })
    }

    /// Run all scenarios with their default settings.
    pub fn run_all() -> OrreryResult<Vec<BenchmarkMetrics>> {
        Self::run_all_with(|_| {})
    }

    /// Run all scenarios, letting `adjust` tweak each one first.
    pub fn run_all_with(
        mut adjust: impl FnMut(&mut Scenario),
    ) -> OrreryResult<Vec<BenchmarkMetrics>> {
        let mut results = Vec::new();
        for &kind in ScenarioKind::all() {
            let mut scenario = Scenario::from_kind(kind);
            adjust(&mut scenario);
            results.push(Self::run(&scenario)?);
        }
        Ok(results)
    }
}
