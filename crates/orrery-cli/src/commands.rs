//! CLI command implementations.

use std::error::Error;
use std::path::Path;
use std::time::Instant;

use orrery_bench::metrics::BenchmarkMetrics;
use orrery_bench::modules::{demo_catalog, order_parameter};
use orrery_bench::runner::BenchmarkRunner;
use orrery_bench::scenarios::{Scenario, ScenarioKind};
use orrery_bench::simulation::SimulationFile;
use orrery_pipeline::{BufferGraph, FrameReport, Pipeline, PipelineSnapshot, SimGraph};
use orrery_telemetry::TracingSink;
use orrery_types::OrreryResult;

type CliResult = Result<(), Box<dyn Error>>;

/// Frames between progress lines.
const PROGRESS_INTERVAL: u64 = 100;

/// Run a simulation from config file.
pub fn simulate(
    config_path: &Path,
    frames: Option<u32>,
    resume: Option<&Path>,
    use_async: bool,
) -> CliResult {
    println!("Orrery Simulation");
    println!("─────────────────");

    let mut file = SimulationFile::load(config_path)?;
    if let Some(frames) = frames {
        file.frames = frames;
    }
    let (pipeline, graph) = file.build()?;
    pipeline.bus().add_sink(Box::new(TracingSink::new()));

    println!("Config:   {}", config_path.display());
    println!("Graph:    {} nodes, {} edges", graph.node_count(), graph.edge_count());
    println!("Modules:  {}", pipeline.module_names().join(", "));
    println!("Frames:   {} (dt = {})", file.frames, file.dt);
    println!();

    pipeline.initialize_all(&graph)?;
    tracing::info!(
        config = %config_path.display(),
        modules = pipeline.len(),
        frames = file.frames,
        "simulation initialized"
    );

    if let Some(path) = resume {
        let snapshot = PipelineSnapshot::read_from(path)?;
        let report = pipeline.load_snapshot(&graph, &snapshot)?;
        tracing::info!(
            snapshot = %path.display(),
            restored = report.restored.len(),
            failed = report.failed.len(),
            "resumed from snapshot"
        );
        println!(
            "Resumed from {} at frame {} ({} restored, {} failed)",
            path.display(),
            pipeline.execution_count(),
            report.restored.len(),
            report.failed.len()
        );
    }

    let started = Instant::now();
    let recoverable = if use_async {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(async {
            let mut recoverable = 0;
            for _ in 0..file.frames {
                let report = pipeline.execute_frame_async(&graph, file.dt).await?;
                recoverable += progress(&report);
            }
            OrreryResult::Ok(recoverable)
        })?
    } else {
        let mut recoverable = 0;
        for _ in 0..file.frames {
            let report = pipeline.execute_frame(&graph, file.dt)?;
            recoverable += progress(&report);
        }
        recoverable
    };
    let elapsed = started.elapsed().as_secs_f64();
    tracing::info!(
        frames = pipeline.execution_count(),
        elapsed_secs = elapsed,
        recoverable,
        "simulation finished"
    );

    println!();
    println!("  Frames run:        {}", pipeline.execution_count());
    println!("  Wall time:         {elapsed:.3}s");
    println!("  Recoverable errs:  {recoverable}");
    println!("  Order parameter:   {:.4}", order_parameter(&graph.phases()));

    if let Some(path) = &file.snapshot {
        write_snapshot(&pipeline, &graph, path)?;
        println!("Snapshot written to: {}", path.display());
    }
    Ok(())
}

fn progress(report: &FrameReport) -> usize {
    for failure in &report.failures {
        tracing::debug!(
            frame = report.execution_count,
            module = %failure.module,
            error = %failure.error,
            "recoverable failure"
        );
    }
    if report.execution_count % PROGRESS_INTERVAL == 0 {
        println!(
            "  frame {:>6}  {:>8.3}ms  {} modules",
            report.execution_count,
            report.wall_time.as_secs_f64() * 1000.0,
            report.modules_executed
        );
    }
    report.failures.len()
}

fn write_snapshot(pipeline: &Pipeline, graph: &BufferGraph, path: &Path) -> OrreryResult<()> {
    let tick = pipeline.execution_count();
    let description = format!("orrery simulate, frame {tick}");
    pipeline
        .save_snapshot(graph, tick, Some(&description))
        .write_to(path)?;
    tracing::info!(snapshot = %path.display(), tick, "snapshot written");
    Ok(())
}

/// Run benchmark suite.
pub fn benchmark(scenario_name: &str, frames: Option<u32>, output_path: Option<&Path>) -> CliResult {
    println!("Orrery Benchmark Suite");
    println!("══════════════════════");
    println!();

    let scenarios: Vec<ScenarioKind> = if scenario_name == "all" {
        ScenarioKind::all().to_vec()
    } else {
        match ScenarioKind::from_name(scenario_name) {
            Some(kind) => vec![kind],
            None => {
                let available: Vec<&str> = ScenarioKind::all().iter().map(|k| k.name()).collect();
                return Err(format!(
                    "Unknown scenario: '{scenario_name}'. Available: {}, all",
                    available.join(", ")
                )
                .into());
            }
        }
    };

    let mut all_metrics = Vec::new();
    for &kind in &scenarios {
        let mut scenario = Scenario::from_kind(kind);
        if let Some(frames) = frames {
            scenario.frames = frames;
        }

        println!(
            "Running: {} ({} nodes, {} frames)",
            kind.name(),
            scenario.nodes,
            scenario.frames
        );

        let metrics =
            BenchmarkRunner::run(&scenario).map_err(|e| format!("Benchmark failed: {e}"))?;

        println!("  Wall time:     {:.3}s", metrics.total_wall_time);
        println!("  Avg frame:     {:.3}ms", metrics.avg_frame_time * 1000.0);
        println!("  Modules:       {}", metrics.module_count);
        println!("  Final order:   {:.4}", metrics.final_order_parameter);
        println!();

        tracing::debug!(
            scenario = kind.name(),
            wall_time = metrics.total_wall_time,
            "scenario complete"
        );
        all_metrics.push(metrics);
    }

    let csv = BenchmarkMetrics::to_csv(&all_metrics);
    if let Some(path) = output_path {
        std::fs::write(path, &csv)?;
        println!("Results written to: {}", path.display());
    } else {
        println!("CSV Output:");
        println!("{csv}");
    }
    Ok(())
}

/// Print the stage/group/kind plan a config would execute.
pub fn plan(config_path: &Path) -> CliResult {
    let file = SimulationFile::load(config_path)?;
    let (pipeline, _graph) = file.build()?;
    let view = pipeline.current_view();

    println!("Execution plan for {}", config_path.display());
    println!("──────────────────────────────────");
    for stage in view.stages() {
        println!("{}", stage.stage);
        for group in &stage.groups {
            println!("  group {} ({:?})", group.key, group.mode);
            let members = group.gpu.iter().chain(&group.cpu).chain(&group.tasks);
            for descriptor in members {
                println!(
                    "    {:<12} {:?}, priority {}",
                    descriptor.name(),
                    descriptor.kind(),
                    descriptor.priority()
                );
            }
        }
    }
    Ok(())
}

/// List catalog modules with their scheduling metadata.
pub fn modules() -> CliResult {
    let catalog = demo_catalog();
    println!(
        "{:<10} {:<13} {:<10} {:>8}  {:<12} {}",
        "name", "stage", "kind", "priority", "group", "category"
    );
    for name in catalog.names() {
        let module = catalog.create(name)?;
        println!(
            "{:<10} {:<13} {:<10} {:>8}  {:<12} {}",
            name,
            module.stage().to_string(),
            format!("{:?}", module.execution_kind()),
            module.priority(),
            module.module_group().unwrap_or("-"),
            module.category()
        );
    }
    Ok(())
}

/// Inspect a pipeline snapshot.
pub fn inspect(path: &Path) -> CliResult {
    println!("Orrery Snapshot Inspector");
    println!("────────────────────────");
    println!();

    let snapshot = PipelineSnapshot::read_from(path)
        .map_err(|e| format!("Failed to read snapshot: {e}"))?;

    println!("Format:       v{}", snapshot.format_version);
    println!("Tick:         {}", snapshot.tick_id);
    println!("Frames run:   {}", snapshot.execution_count);
    println!("Taken at:     {}", snapshot.timestamp.to_rfc3339());
    println!(
        "Graph:        {} nodes, {} edges",
        snapshot.graph_summary.node_count, snapshot.graph_summary.edge_count
    );
    if let Some(description) = &snapshot.description {
        println!("Description:  {description}");
    }
    println!("Modules:      {}", snapshot.module_states.len());
    for (name, state) in &snapshot.module_states {
        println!("  {name}: {state}");
    }
    Ok(())
}

/// Validate a simulation config or snapshot.
pub fn validate(path: &Path) -> CliResult {
    println!("Orrery Validator");
    println!("────────────────");
    println!();

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => {
            println!("Validating config: {}", path.display());
            let file = SimulationFile::load(path)?;
            println!(
                "✅ Config is valid ({} modules, {} frames).",
                file.modules.len(),
                file.frames
            );
        }
        Some("json") => {
            println!("Validating snapshot: {}", path.display());
            let snapshot = PipelineSnapshot::read_from(path)?;
            snapshot.validate()?;
            println!(
                "✅ Snapshot is valid ({} module states).",
                snapshot.module_states.len()
            );
        }
        _ => {
            return Err(format!(
                "Unsupported file type: {} (expected .toml or .json)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}
