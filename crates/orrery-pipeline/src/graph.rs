//! Graph collaborator: the state physics modules step over.
//!
//! The pipeline only needs node and edge counts for telemetry and
//! snapshots. Modules that understand a concrete graph downcast nothing;
//! they reach the raw buffers through [`SimGraph::with_buffers`], which
//! the zero-copy dispatch path also uses.
//!
//! [`BufferGraph`] is a ready-made structure-of-arrays graph: one weight
//! per edge, one phase and one rate per node.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use orrery_types::{OrreryError, OrreryResult};

/// Topology summary stored in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphSummary {
    pub node_count: usize,
    pub edge_count: usize,
}

/// Raw mutable view over a graph's buffers.
///
/// `weights` and `edges` are parallel (one weight per edge); `phases` and
/// `rates` have one entry per node.
pub struct GraphBuffers<'a> {
    pub weights: &'a mut [f32],
    pub phases: &'a mut [f32],
    pub rates: &'a mut [f32],
    pub edges: &'a [[u32; 2]],
}

/// Opaque graph handle passed to every module call.
pub trait SimGraph: Send + Sync {
    fn node_count(&self) -> usize;

    fn edge_count(&self) -> usize;

    fn summary(&self) -> GraphSummary {
        GraphSummary {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
        }
    }

    /// Runs `f` over the raw buffers, if the graph exposes them.
    ///
    /// Returns `None` when the graph has no compatible buffers; the
    /// caller then falls back to the module's regular step.
    fn with_buffers(
        &self,
        f: &mut dyn FnMut(GraphBuffers<'_>) -> OrreryResult<()>,
    ) -> Option<OrreryResult<()>> {
        let _ = f;
        None
    }
}

/// Mutable per-node and per-edge state of a [`BufferGraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    /// Phase per node (radians).
    pub phases: Vec<f32>,
    /// Natural rate per node (radians per second).
    pub rates: Vec<f32>,
    /// Coupling weight per edge.
    pub weights: Vec<f32>,
}

/// Structure-of-arrays graph with interior locking.
///
/// Edges are fixed at construction; buffer contents change under the
/// state lock, which serializes modules touching the same graph.
pub struct BufferGraph {
    node_count: usize,
    edges: Vec<[u32; 2]>,
    state: Mutex<GraphState>,
}

impl BufferGraph {
    /// Creates a graph with zeroed phases, unit rates and unit weights.
    pub fn new(node_count: usize, edges: Vec<[u32; 2]>) -> OrreryResult<Self> {
        if let Some(bad) = edges
            .iter()
            .find(|[a, b]| *a as usize >= node_count || *b as usize >= node_count)
        {
            return Err(OrreryError::InvalidConfig(format!(
                "edge {:?} references a node outside 0..{node_count}",
                bad
            )));
        }

        let state = GraphState {
            phases: vec![0.0; node_count],
            rates: vec![1.0; node_count],
            weights: vec![1.0; edges.len()],
        };
        Ok(Self {
            node_count,
            edges,
            state: Mutex::new(state),
        })
    }

    /// Ring of `n` nodes, each linked to its successor.
    pub fn ring(n: usize) -> Self {
        let edges = (0..n)
            .filter(|_| n > 1)
            .map(|i| [i as u32, ((i + 1) % n) as u32])
            .collect();
        let state = GraphState {
            phases: (0..n).map(|i| i as f32 * 0.1).collect(),
            rates: vec![1.0; n],
            weights: vec![1.0; if n > 1 { n } else { 0 }],
        };
        Self {
            node_count: n,
            edges,
            state: Mutex::new(state),
        }
    }

    /// Locks and returns the mutable state.
    pub fn state(&self) -> MutexGuard<'_, GraphState> {
        self.state.lock()
    }

    pub fn edges(&self) -> &[[u32; 2]] {
        &self.edges
    }

    /// Copy of the current phases.
    pub fn phases(&self) -> Vec<f32> {
        self.state.lock().phases.clone()
    }
}

impl SimGraph for BufferGraph {
    fn node_count(&self) -> usize {
        self.node_count
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn with_buffers(
        &self,
        f: &mut dyn FnMut(GraphBuffers<'_>) -> OrreryResult<()>,
    ) -> Option<OrreryResult<()>> {
        let mut state = self.state.lock();
        let GraphState {
            phases,
            rates,
            weights,
        } = &mut *state;
        Some(f(GraphBuffers {
            weights,
            phases,
            rates,
            edges: &self.edges,
        }))
    }
}

/// Graph with counts only; exposes no buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountingGraph {
    pub nodes: usize,
    pub edges: usize,
}

impl SimGraph for CountingGraph {
    fn node_count(&self) -> usize {
        self.nodes
    }

    fn edge_count(&self) -> usize {
        self.edges
    }
}
