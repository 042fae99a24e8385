//! Scheduler view cache.
//!
//! The executor never walks the registry directly. It runs against a
//! [`SortedView`]: the enabled modules ordered by stage, group and
//! priority, already partitioned into stage batches, group batches and
//! execution-kind buckets. Views are immutable and shared behind an
//! `Arc`, so a frame keeps the view it started with even if the registry
//! changes underneath it.
//!
//! Ordering rules:
//! - stages ascend in [`Stage`] order
//! - within a stage, groups are ordered by their lowest member priority,
//!   ties by the registration position of that member
//! - within a group, members ascend by priority, ties by registration
//!   position

use std::sync::Arc;

use crate::descriptor::{GroupKey, ModuleDescriptor};
use crate::module::{ExecutionKind, GroupMode, Stage};

/// The members of one group in one stage, bucketed by execution kind.
#[derive(Debug, Clone)]
pub struct GroupBatch {
    pub key: GroupKey,
    /// Taken from the group's first member in view order.
    pub mode: GroupMode,
    pub gpu: Vec<Arc<ModuleDescriptor>>,
    pub cpu: Vec<Arc<ModuleDescriptor>>,
    pub tasks: Vec<Arc<ModuleDescriptor>>,
}

impl GroupBatch {
    fn new(key: &GroupKey, mode: GroupMode) -> Self {
        Self {
            key: key.clone(),
            mode,
            gpu: Vec::new(),
            cpu: Vec::new(),
            tasks: Vec::new(),
        }
    }

    fn push(&mut self, descriptor: Arc<ModuleDescriptor>) {
        match descriptor.kind() {
            ExecutionKind::Gpu => self.gpu.push(descriptor),
            ExecutionKind::SyncCpu => self.cpu.push(descriptor),
            ExecutionKind::AsyncTask => self.tasks.push(descriptor),
        }
    }

    pub fn len(&self) -> usize {
        self.gpu.len() + self.cpu.len() + self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All groups of one stage, in execution order.
#[derive(Debug, Clone)]
pub struct StageBatch {
    pub stage: Stage,
    pub groups: Vec<GroupBatch>,
}

/// Immutable, pre-partitioned execution order of the enabled modules.
#[derive(Debug, Clone, Default)]
pub struct SortedView {
    stages: Vec<StageBatch>,
    ordered: Vec<Arc<ModuleDescriptor>>,
}

impl SortedView {
    /// Builds the view from registry entries in registration order.
    pub fn build(entries: &[Arc<ModuleDescriptor>]) -> Self {
        let mut enabled: Vec<(usize, &Arc<ModuleDescriptor>)> = entries
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_enabled())
            .collect();
        // Stable sort; the position component keeps it deterministic anyway.
        enabled.sort_by_key(|(pos, d)| (d.stage(), d.priority(), *pos));

        let mut stages: Vec<StageBatch> = Vec::new();

        for (_, descriptor) in enabled {
            let needs_stage = stages
                .last()
                .map_or(true, |s| s.stage != descriptor.stage());
            if needs_stage {
                stages.push(StageBatch {
                    stage: descriptor.stage(),
                    groups: Vec::new(),
                });
            }
            let Some(stage) = stages.last_mut() else {
                continue;
            };

            let slot = stage
                .groups
                .iter()
                .position(|g| &g.key == descriptor.group_key());
            let group = match slot {
                Some(index) => &mut stage.groups[index],
                None => {
                    stage
                        .groups
                        .push(GroupBatch::new(descriptor.group_key(), descriptor.group_mode()));
                    let last = stage.groups.len() - 1;
                    &mut stage.groups[last]
                }
            };
            group.push(Arc::clone(descriptor));
        }

        let ordered = stages
            .iter()
            .flat_map(|s| s.groups.iter())
            .flat_map(|g| g.gpu.iter().chain(&g.cpu).chain(&g.tasks))
            .cloned()
            .collect();
        Self { stages, ordered }
    }

    pub fn stages(&self) -> &[StageBatch] {
        &self.stages
    }

    /// Enabled modules in dispatch order: stage, group, kind bucket
    /// (GPU, CPU, async), priority.
    pub fn ordered(&self) -> &[Arc<ModuleDescriptor>] {
        &self.ordered
    }

    pub fn names(&self) -> Vec<&str> {
        self.ordered.iter().map(|d| d.name()).collect()
    }

    /// Position of `name` in [`SortedView::ordered`].
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.ordered.iter().position(|d| d.name() == name)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Lazily rebuilt enabled/sorted views.
///
/// Both views are rebuilt together on the first request after either was
/// dirtied; clean requests hand out the cached `Arc`.
pub struct ViewCache {
    enabled: Arc<Vec<Arc<ModuleDescriptor>>>,
    sorted: Arc<SortedView>,
    enabled_dirty: bool,
    sorted_dirty: bool,
    rebuilds: u64,
}

impl ViewCache {
    /// Starts dirty so the first request builds.
    pub fn new() -> Self {
        Self {
            enabled: Arc::new(Vec::new()),
            sorted: Arc::new(SortedView::default()),
            enabled_dirty: true,
            sorted_dirty: true,
            rebuilds: 0,
        }
    }

    /// Membership changed (registration, removal, enablement).
    pub fn mark_enabled_dirty(&mut self) {
        self.enabled_dirty = true;
        self.sorted_dirty = true;
    }

    /// Only ordering changed (reorder).
    pub fn mark_sorted_dirty(&mut self) {
        self.sorted_dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.enabled_dirty || self.sorted_dirty
    }

    /// Rebuilds both views if either is dirty.
    pub fn refresh(&mut self, entries: &[Arc<ModuleDescriptor>]) {
        if !self.is_dirty() {
            return;
        }
        self.enabled = Arc::new(entries.iter().filter(|d| d.is_enabled()).cloned().collect());
        self.sorted = Arc::new(SortedView::build(entries));
        self.enabled_dirty = false;
        self.sorted_dirty = false;
        self.rebuilds += 1;
        tracing::debug!(
            enabled = self.enabled.len(),
            registered = entries.len(),
            rebuilds = self.rebuilds,
            "rebuilt scheduler view"
        );
    }

    /// The sorted view, rebuilding first if dirty.
    pub fn sorted_fresh(&mut self, entries: &[Arc<ModuleDescriptor>]) -> Arc<SortedView> {
        self.refresh(entries);
        Arc::clone(&self.sorted)
    }

    /// The enabled list, rebuilding first if dirty.
    pub fn enabled_fresh(
        &mut self,
        entries: &[Arc<ModuleDescriptor>],
    ) -> Arc<Vec<Arc<ModuleDescriptor>>> {
        self.refresh(entries);
        Arc::clone(&self.enabled)
    }

    /// The sorted view, or `None` while dirty.
    pub fn sorted(&self) -> Option<Arc<SortedView>> {
        (!self.is_dirty()).then(|| Arc::clone(&self.sorted))
    }

    /// Enabled modules in registration order, or `None` while dirty.
    pub fn enabled(&self) -> Option<Arc<Vec<Arc<ModuleDescriptor>>>> {
        (!self.is_dirty()).then(|| Arc::clone(&self.enabled))
    }

    /// Number of rebuilds so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new()
    }
}
