//! Benchmark metrics collected during a scenario run.

use serde::{Deserialize, Serialize};

/// Metrics collected from a benchmark scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    /// Scenario name.
    pub scenario: String,
    /// Oscillator count.
    pub node_count: usize,
    /// Edge count.
    pub edge_count: usize,
    /// Registered modules.
    pub module_count: usize,
    /// Frames executed.
    pub frames: u32,
    /// Total wall-clock time (seconds).
    pub total_wall_time: f64,
    /// Average wall-clock time per frame (seconds).
    pub avg_frame_time: f64,
    /// Fastest frame.
    pub min_frame_time: f64,
    /// Slowest frame.
    pub max_frame_time: f64,
    /// Recoverable module failures summed over all frames.
    pub recoverable_errors: usize,
    /// Times the scheduler view was rebuilt.
    pub view_rebuilds: u64,
    /// Kuramoto order parameter after the last frame.
    pub final_order_parameter: f64,
}

impl BenchmarkMetrics {
    /// CSV header matching [`BenchmarkMetrics::to_csv_row`].
    pub fn to_csv_header() -> String {
        "scenario,node_count,edge_count,module_count,frames,total_wall_time_s,avg_frame_ms,min_frame_ms,max_frame_ms,recoverable_errors,view_rebuilds,final_order".to_string()
    }

    /// Format this metrics instance as a CSV data row.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{:.6},{:.4},{:.4},{:.4},{},{},{:.6}",
            self.scenario,
            self.node_count,
            self.edge_count,
            self.module_count,
            self.frames,
            self.total_wall_time,
            self.avg_frame_time * 1000.0,
            self.min_frame_time * 1000.0,
            self.max_frame_time * 1000.0,
            self.recoverable_errors,
            self.view_rebuilds,
            self.final_order_parameter,
        )
    }

    /// Format multiple metrics as a complete CSV string.
    pub fn to_csv(metrics: &[BenchmarkMetrics]) -> String {
        let mut csv = Self::to_csv_header();
        for m in metrics {
            csv.push('\n');
            csv.push_str(&m.to_csv_row());
        }
        csv
    }
}
