//! # orrery-bench
//!
//! Demo physics modules and benchmark suite for the Orrery pipeline.
//!
//! Provides a phase-oscillator module set, four scheduling scenarios
//! (sequential, parallel, async-heavy, multi-device), metric collection
//! with CSV export, and TOML simulation files.

pub mod metrics;
pub mod modules;
pub mod runner;
pub mod scenarios;
pub mod simulation;

pub use metrics::BenchmarkMetrics;
pub use modules::{demo_catalog, order_parameter};
pub use runner::BenchmarkRunner;
pub use scenarios::{Scenario, ScenarioKind};
pub use simulation::SimulationFile;
