//! Integration tests for orrery-bench.

use std::f32::consts::{PI, TAU};
use std::sync::Arc;

use orrery_bench::metrics::BenchmarkMetrics;
use orrery_bench::modules::{
    demo_catalog, order_parameter, Coupling, GpuRelaxation, OrderParameter, PhaseDrift, PhaseWrap,
    WeightDecay, COUPLING_KEY, DECAY_KEY,
};
use orrery_bench::runner::BenchmarkRunner;
use orrery_bench::scenarios::{oscillator_graph, Scenario, ScenarioKind};
use orrery_bench::simulation::SimulationFile;
use orrery_pipeline::{BufferGraph, PhysicsParams, Pipeline, PipelineConfig, SimGraph};
use orrery_types::{DeviceId, OrreryError};

fn pair(phases: [f32; 2]) -> BufferGraph {
    let graph = BufferGraph::new(2, vec![[0, 1]]).unwrap();
    graph.state().phases = phases.to_vec();
    graph
}

// ─── Order Parameter ──────────────────────────────────────────

#[test]
fn order_parameter_bounds() {
    assert_eq!(order_parameter(&[]), 0.0);
    assert!((order_parameter(&[0.7; 8]) - 1.0).abs() < 1e-9);
    assert!(order_parameter(&[0.0, PI]) < 1e-6);
}

// ─── Scenario Tests ───────────────────────────────────────────

#[test]
fn all_scenarios() {
    assert_eq!(ScenarioKind::all().len(), 4);
    for &kind in ScenarioKind::all() {
        assert_eq!(ScenarioKind::from_name(kind.name()), Some(kind));
        assert_eq!(Scenario::from_kind(kind).kind, kind);
    }
    assert_eq!(ScenarioKind::from_name("nope"), None);
}

#[test]
fn oscillator_graph_layout() {
    let graph = oscillator_graph(10).unwrap();
    assert_eq!(graph.node_count(), 10);
    assert_eq!(graph.edge_count(), 20); // ring + skip-3 chords
    let state = graph.state();
    assert!((state.rates[0] - 0.5).abs() < 1e-6);
    assert!(state.rates.iter().all(|r| (0.5..1.5).contains(r)));

    assert_eq!(oscillator_graph(1).unwrap().edge_count(), 0);
    assert_eq!(oscillator_graph(4).unwrap().edge_count(), 4);
}

#[test]
fn multi_device_scenario_registers_two_devices() {
    let pipeline = Scenario::multi_device().build_pipeline().unwrap();
    assert_eq!(pipeline.coordinator().device_count(), 2);
    assert!(pipeline.coordinator().is_multi_device());
    assert!(pipeline.module_names().contains(&"relax-1".to_string()));
}

#[test]
fn parallel_scenario_groups_statistics() {
    let pipeline = Scenario::parallel().build_pipeline().unwrap();
    let view = pipeline.current_view();
    let diagnostics = view
        .stages()
        .iter()
        .flat_map(|stage| stage.groups.iter())
        .find(|group| group.key.name() == "diagnostics")
        .unwrap();
    assert_eq!(diagnostics.cpu.len(), 4);
}

// ─── Runner Tests ─────────────────────────────────────────────

#[test]
fn run_sequential() {
    let mut scenario = Scenario::sequential();
    scenario.frames = 5;
    scenario.nodes = 32;
    let metrics = BenchmarkRunner::run(&scenario).unwrap();

    assert_eq!(metrics.scenario, "sequential");
    assert_eq!(metrics.frames, 5);
    assert_eq!(metrics.node_count, 32);
    assert_eq!(metrics.module_count, 5);
    assert_eq!(metrics.recoverable_errors, 0);
    assert!(metrics.min_frame_time <= metrics.max_frame_time);
    assert!((0.0..=1.0).contains(&metrics.final_order_parameter));
}

#[test]
fn run_all_scenarios() {
    let results = BenchmarkRunner::run_all_with(|scenario| {
        scenario.frames = 3;
        scenario.nodes = 24;
    })
    .unwrap();

    assert_eq!(results.len(), ScenarioKind::all().len());
    for (metrics, kind) in results.iter().zip(ScenarioKind::all()) {
        assert_eq!(metrics.scenario, kind.name());
        assert_eq!(metrics.frames, 3);
        assert!(metrics.total_wall_time >= 0.0);
        assert_eq!(metrics.recoverable_errors, 0);
    }
}

#[test]
fn csv_export() {
    let mut scenario = Scenario::async_heavy();
    scenario.frames = 2;
    scenario.nodes = 16;
    let metrics = BenchmarkRunner::run(&scenario).unwrap();

    let csv = BenchmarkMetrics::to_csv(&[metrics.clone(), metrics]);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    let columns = lines[0].split(',').count();
    assert!(lines[1..].iter().all(|l| l.split(',').count() == columns));
    assert!(lines[1].starts_with("async_heavy,16,"));
}

// ─── Module Behavior ──────────────────────────────────────────

#[test]
fn coupling_synchronizes_a_pair() {
    let graph = pair([0.0, 1.0]);
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    pipeline.register(Arc::new(Coupling::new(2.0))).unwrap();
    pipeline.register(Arc::new(PhaseDrift)).unwrap();

    let before = order_parameter(&graph.phases());
    for _ in 0..50 {
        pipeline.execute_frame(&graph, 0.05).unwrap();
    }
    let after = order_parameter(&graph.phases());
    assert!(after > before + 0.1, "before {before}, after {after}");
}

#[test]
fn zero_copy_and_regular_paths_agree() {
    let run = |config: PipelineConfig| {
        let graph = oscillator_graph(12).unwrap();
        let pipeline = Pipeline::new(config).unwrap();
        pipeline.register(Arc::new(Coupling::new(1.5))).unwrap();
        pipeline.register(Arc::new(PhaseDrift)).unwrap();
        for _ in 0..10 {
            pipeline.execute_frame(&graph, 0.02).unwrap();
        }
        graph.phases()
    };
    assert_eq!(run(PipelineConfig::default()), run(PipelineConfig::sequential()));
}

#[test]
fn coupling_follows_parameters() {
    let graph = pair([0.0, 1.0]);
    let coupling = Arc::new(Coupling::new(2.0));
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    pipeline.register(coupling.clone()).unwrap();

    pipeline.set_parameters(PhysicsParams::new().with(COUPLING_KEY, 0.0));
    pipeline.execute_frame(&graph, 0.1).unwrap();
    assert_eq!(coupling.strength(), 0.0);
    assert_eq!(graph.phases(), vec![0.0, 1.0]);
}

#[test]
fn non_finite_coupling_is_recoverable() {
    let graph = pair([0.0, 1.0]);
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    pipeline.register(Arc::new(Coupling::new(2.0))).unwrap();
    pipeline.register(Arc::new(PhaseDrift)).unwrap();
    pipeline.set_parameters(PhysicsParams::new().with(COUPLING_KEY, f64::NAN));

    let report = pipeline.execute_frame(&graph, 0.1).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].module, "coupling");
    assert_eq!(pipeline.execution_count(), 1);
}

#[test]
fn wrap_keeps_phases_on_the_circle() {
    let graph = pair([-1.0, 7.0]);
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    pipeline.register(Arc::new(PhaseWrap)).unwrap();
    pipeline.execute_frame(&graph, 0.1).unwrap();
    assert!(graph.phases().iter().all(|p| (0.0..TAU).contains(p)));
}

#[test]
fn relaxation_pulls_decayed_weights_back() {
    let graph = pair([0.0, 0.0]);
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    pipeline.register(Arc::new(WeightDecay::default())).unwrap();
    pipeline.set_parameters(PhysicsParams::new().with(DECAY_KEY, 5.0));
    pipeline.execute_frame(&graph, 0.1).unwrap();
    let decayed = graph.state().weights[0];
    assert!((decayed - 0.5).abs() < 1e-6);

    pipeline.remove("decay");
    pipeline
        .register(Arc::new(GpuRelaxation::new("relax", DeviceId::AUTO, 1.0)))
        .unwrap();
    pipeline.execute_frame(&graph, 0.5).unwrap();
    assert!((graph.state().weights[0] - 0.75).abs() < 1e-6);
}

#[test]
fn order_parameter_state_survives_snapshot() {
    let graph = oscillator_graph(8).unwrap();
    let source = Pipeline::new(PipelineConfig::default()).unwrap();
    let order = Arc::new(OrderParameter::default());
    source.register(order.clone()).unwrap();
    for _ in 0..3 {
        source.execute_frame(&graph, 0.1).unwrap();
    }
    assert_eq!(order.state().samples, 3);

    let snapshot = source.save_snapshot(&graph, 3, None);
    let target = Pipeline::new(PipelineConfig::default()).unwrap();
    let restored = Arc::new(OrderParameter::default());
    target.register(restored.clone()).unwrap();
    assert!(target.load_snapshot(&graph, &snapshot).unwrap().is_complete());
    assert_eq!(restored.state(), order.state());
}

#[test]
fn unsampled_diagnostics_save_nothing() {
    let graph = oscillator_graph(4).unwrap();
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    pipeline.register(Arc::new(OrderParameter::default())).unwrap();
    assert!(pipeline.save_snapshot(&graph, 0, None).module_states.is_empty());
}

// ─── Catalog & Simulation Files ───────────────────────────────

#[test]
fn demo_catalog_contents() {
    let catalog = demo_catalog();
    assert_eq!(
        catalog.names(),
        vec!["coupling", "decay", "drift", "order", "relax", "stats", "wrap"]
    );
    assert_eq!(catalog.create("drift").unwrap().exclusive_group(), Some("integrator"));
}

#[test]
fn simulation_file_parses() {
    let text = r#"
        nodes = 64
        frames = 10
        dt = 0.02
        modules = ["coupling", "drift", "wrap", "stats"]

        [pipeline]
        max_parallelism = 2
        record_timings = false

        [params]
        coupling = 1.25
    "#;
    let file = SimulationFile::from_toml_str(text).unwrap();
    assert_eq!(file.nodes, 64);
    assert_eq!(file.pipeline.max_parallelism, Some(2));
    assert!(file.pipeline.zero_copy);
    assert!(file.snapshot.is_none());

    let (pipeline, graph) = file.build().unwrap();
    assert_eq!(pipeline.len(), 4);
    assert_eq!(graph.node_count(), 64);
    assert_eq!(pipeline.parameters().get(COUPLING_KEY), Some(1.25));
    pipeline.execute_frame(&graph, file.dt).unwrap();
}

#[test]
fn simulation_file_defaults() {
    let file = SimulationFile::from_toml_str("").unwrap();
    assert_eq!(file, SimulationFile::default());
}

#[test]
fn simulation_file_rejects_bad_input() {
    let unknown = SimulationFile::from_toml_str(r#"modules = ["coupling", "warp"]"#).unwrap_err();
    assert!(matches!(unknown, OrreryError::InvalidConfig(ref m) if m.contains("warp")));

    assert!(SimulationFile::from_toml_str("dt = -1.0").is_err());
    assert!(SimulationFile::from_toml_str("[pipeline]\nmax_parallelism = 0").is_err());
    assert!(SimulationFile::from_toml_str("nodes = \"many\"").is_err());
}
