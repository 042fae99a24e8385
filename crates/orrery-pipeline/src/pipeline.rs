//! The pipeline: registry, view cache, executor and coordinator behind
//! one handle.
//!
//! One reader-writer lock guards the registry and its derived views.
//! Mutations take the write side. A frame takes the read side only long
//! enough to clone the `Arc` of the current sorted view, then dispatches
//! without holding any lock. Registrations racing a frame therefore apply
//! from the next frame on.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;

use orrery_gpu::{BarrierCoordinator, GpuSync};
use orrery_telemetry::{EventBus, EventKind, Phase, PipelineEvent};
use orrery_types::{DeviceId, OrreryError, OrreryResult};

use crate::cancellation::CancellationToken;
use crate::classifier::ErrorClassifier;
use crate::config::{PhysicsParams, PipelineConfig};
use crate::descriptor::ModuleDescriptor;
use crate::executor::{self, FrameContext, FrameRecorder};
use crate::graph::SimGraph;
use crate::module::PhysicsModule;
use crate::registry::{Insertion, ModuleRegistry};
use crate::report::{FrameReport, ModuleCompletion};
use crate::view::{SortedView, ViewCache};

struct PipelineState {
    registry: ModuleRegistry,
    cache: ViewCache,
}

/// Stage-ordered, group-atomic scheduler for physics modules.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::new(PipelineConfig::default())?;
/// pipeline.register(Arc::new(Drift::default()))?;
/// pipeline.initialize_all(&graph)?;
/// for _ in 0..steps {
///     pipeline.execute_frame(&graph, DEFAULT_DT)?;
/// }
/// ```
pub struct Pipeline {
    state: RwLock<PipelineState>,
    coordinator: Arc<BarrierCoordinator>,
    bus: Arc<EventBus>,
    classifier: ErrorClassifier,
    config: PipelineConfig,
    pool: rayon::ThreadPool,
    params: RwLock<Arc<PhysicsParams>>,
    execution_count: AtomicU64,
    initialized: AtomicBool,
}

impl Pipeline {
    /// Creates a pipeline with a fresh coordinator (host default manager).
    pub fn new(config: PipelineConfig) -> OrreryResult<Self> {
        Self::with_coordinator(config, Arc::new(BarrierCoordinator::new()))
    }

    /// Creates a pipeline sharing an existing coordinator.
    pub fn with_coordinator(
        config: PipelineConfig,
        coordinator: Arc<BarrierCoordinator>,
    ) -> OrreryResult<Self> {
        config.validate()?;
        let workers = config.effective_parallelism();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("orrery-worker-{i}"))
            .build()
            .map_err(|e| OrreryError::WorkerPool(e.to_string()))?;

        let bus = Arc::new(EventBus::new());
        bus.set_enabled(config.telemetry);
        tracing::debug!(workers, zero_copy = config.zero_copy, "pipeline created");

        Ok(Self {
            state: RwLock::new(PipelineState {
                registry: ModuleRegistry::new(),
                cache: ViewCache::new(),
            }),
            coordinator,
            classifier: ErrorClassifier::new(Arc::clone(&bus)),
            bus,
            config,
            pool,
            params: RwLock::new(Arc::new(PhysicsParams::default())),
            execution_count: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
        })
    }

    // ─── Registry ────────────────────────────────────────────

    /// Appends a module.
    ///
    /// Returns `Ok(false)` (and logs) if the name is already taken, and
    /// `Err(ExclusiveGroupConflict)` if an enabled module already holds the
    /// module's exclusive group.
    pub fn register(&self, module: Arc<dyn PhysicsModule>) -> OrreryResult<bool> {
        self.insert(module, None)
    }

    /// Inserts a module at `index`, clamped to the end.
    pub fn register_at(&self, module: Arc<dyn PhysicsModule>, index: usize) -> OrreryResult<bool> {
        self.insert(module, Some(index))
    }

    fn insert(&self, module: Arc<dyn PhysicsModule>, index: Option<usize>) -> OrreryResult<bool> {
        let descriptor = ModuleDescriptor::new(module);
        let name = descriptor.name().to_string();

        let count = {
            let mut state = self.state.write();
            match state.registry.insert(descriptor, index) {
                Ok(Insertion::Added) => {
                    state.cache.mark_enabled_dirty();
                    state.registry.len()
                }
                Ok(Insertion::Duplicate) => {
                    drop(state);
                    tracing::warn!(module = %name, "module already registered; ignoring");
                    self.log(format!("duplicate registration of '{name}' ignored"));
                    return Ok(false);
                }
                Err(err) => {
                    drop(state);
                    tracing::warn!(module = %name, error = %err, "registration rejected");
                    return Err(err);
                }
            }
        };

        tracing::info!(module = %name, registered = count, "registered module");
        self.emit(EventKind::RegistryChanged { count });
        self.bus.flush();
        Ok(true)
    }

    /// Removes a module and runs its cleanup. Cleanup failures are
    /// reported, never propagated.
    pub fn remove(&self, name: &str) -> bool {
        let removed = {
            let mut state = self.state.write();
            let removed = state.registry.remove(name);
            if removed.is_some() {
                state.cache.mark_enabled_dirty();
            }
            removed.map(|descriptor| (descriptor, state.registry.len()))
        };
        let Some((descriptor, count)) = removed else {
            return false;
        };

        self.cleanup_module(&descriptor);
        tracing::info!(module = name, registered = count, "removed module");
        self.emit(EventKind::RegistryChanged { count });
        self.bus.flush();
        true
    }

    /// Removes and cleans up every module; resets initialization and the
    /// execution count.
    pub fn clear(&self) {
        let drained = {
            let mut state = self.state.write();
            state.cache.mark_enabled_dirty();
            state.registry.drain()
        };
        for descriptor in &drained {
            self.cleanup_module(descriptor);
        }
        self.initialized.store(false, Ordering::Release);
        self.execution_count.store(0, Ordering::Release);

        tracing::info!(removed = drained.len(), "cleared pipeline");
        self.emit(EventKind::RegistryChanged { count: 0 });
        self.bus.flush();
    }

    pub fn move_up(&self, name: &str) -> bool {
        self.reorder(|registry| registry.move_up(name))
    }

    pub fn move_down(&self, name: &str) -> bool {
        self.reorder(|registry| registry.move_down(name))
    }

    /// Moves a module to `index` in registration order. Only affects
    /// tie-breaking between equal stage and priority.
    pub fn move_to(&self, name: &str, index: usize) -> bool {
        self.reorder(|registry| registry.move_to(name, index))
    }

    fn reorder(&self, op: impl FnOnce(&mut ModuleRegistry) -> bool) -> bool {
        let mut state = self.state.write();
        let moved = op(&mut state.registry);
        if moved {
            state.cache.mark_sorted_dirty();
        }
        moved
    }

    /// Enables or disables a module without re-registering it.
    ///
    /// Enabling fails with `ExclusiveGroupConflict` while another enabled
    /// module holds the same exclusive group.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> OrreryResult<()> {
        let changed = {
            let mut state = self.state.write();
            let descriptor = state
                .registry
                .get(name)
                .cloned()
                .ok_or_else(|| OrreryError::ModuleNotFound(name.to_string()))?;
            if enabled {
                if let Some(group) = descriptor.exclusive_group() {
                    state.registry.check_exclusive(name, group)?;
                }
            }
            let changed = descriptor.set_enabled(enabled) != enabled;
            if changed {
                state.cache.mark_enabled_dirty();
            }
            changed
        };

        if changed {
            tracing::info!(module = name, enabled, "module enablement changed");
            self.emit(EventKind::EnablementChanged {
                module: name.to_string(),
                enabled,
            });
            self.bus.flush();
        }
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.state.read().registry.get(name).map(|d| d.is_enabled())
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn PhysicsModule>> {
        self.state
            .read()
            .registry
            .get(name)
            .map(|d| Arc::clone(d.module()))
    }

    pub fn get_by_category(&self, category: &str) -> Vec<Arc<dyn PhysicsModule>> {
        self.state
            .read()
            .registry
            .by_category(category)
            .iter()
            .map(|d| Arc::clone(d.module()))
            .collect()
    }

    /// Registration descriptor (cached metadata) for `name`.
    pub fn descriptor(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.state.read().registry.get(name).cloned()
    }

    /// Registered names in registration order.
    pub fn module_names(&self) -> Vec<String> {
        self.state
            .read()
            .registry
            .entries()
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().registry.is_empty()
    }

    pub(crate) fn registered(&self) -> Vec<Arc<ModuleDescriptor>> {
        self.state.read().registry.entries().to_vec()
    }

    // ─── Views ───────────────────────────────────────────────

    /// The current sorted view, rebuilt first if the registry changed.
    pub fn current_view(&self) -> Arc<SortedView> {
        if let Some(view) = self.state.read().cache.sorted() {
            return view;
        }
        let mut state = self.state.write();
        let PipelineState { registry, cache } = &mut *state;
        cache.sorted_fresh(registry.entries())
    }

    /// Enabled modules in registration order.
    pub fn enabled_modules(&self) -> Arc<Vec<Arc<ModuleDescriptor>>> {
        if let Some(enabled) = self.state.read().cache.enabled() {
            return enabled;
        }
        let mut state = self.state.write();
        let PipelineState { registry, cache } = &mut *state;
        cache.enabled_fresh(registry.entries())
    }

    /// How many times the views have been rebuilt.
    pub fn view_rebuilds(&self) -> u64 {
        self.state.read().cache.rebuild_count()
    }

    // ─── Lifecycle ───────────────────────────────────────────

    /// Initializes every enabled module in view order and resets the
    /// execution count. Safe to call again; modules are re-initialized.
    ///
    /// Recoverable failures are reported and skipped. A fatal failure
    /// stops initialization and is returned.
    pub fn initialize_all(&self, graph: &dyn SimGraph) -> OrreryResult<()> {
        self.execution_count.store(0, Ordering::Release);
        self.initialized.store(false, Ordering::Release);
        let view = self.current_view();

        let mut outcome = Ok(());
        for descriptor in view.ordered() {
            let name = descriptor.name();
            let result = executor::contain(name, || descriptor.module().initialize(graph));
            if let Err(err) = result {
                if self.classifier.classify(name, &err, Phase::Initialize, 0).is_fatal() {
                    outcome = Err(err);
                    break;
                }
            }
        }

        if outcome.is_ok() {
            self.initialized.store(true, Ordering::Release);
            tracing::info!(modules = view.len(), "pipeline initialized");
            self.log(format!("initialized {} modules", view.len()));
        }
        self.bus.flush();
        outcome
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Frames completed since the last `initialize_all` or `clear`.
    pub fn execution_count(&self) -> u64 {
        self.execution_count.load(Ordering::Acquire)
    }

    pub(crate) fn restore_execution_count(&self, count: u64) {
        self.execution_count.store(count, Ordering::Release);
    }

    // ─── Parameters ──────────────────────────────────────────

    /// Replaces the physics parameters seen by subsequent frames.
    pub fn set_parameters(&self, params: PhysicsParams) {
        let mut current = self.params.write();
        let revision = current.revision + 1;
        *current = Arc::new(PhysicsParams { revision, ..params });
    }

    pub fn parameters(&self) -> Arc<PhysicsParams> {
        Arc::clone(&*self.params.read())
    }

    // ─── Frames ──────────────────────────────────────────────

    /// Runs one frame over every enabled module.
    ///
    /// Recoverable module failures are listed in the report. A fatal
    /// failure is reported on the bus, flushed, then returned; the
    /// execution count is not advanced.
    pub fn execute_frame(&self, graph: &dyn SimGraph, dt: f64) -> OrreryResult<FrameReport> {
        self.run_blocking(graph, dt, None)
    }

    /// Like [`Pipeline::execute_frame`], polling `token` at stage and
    /// group boundaries and before each sequential CPU module.
    pub fn execute_frame_cancellable(
        &self,
        graph: &dyn SimGraph,
        dt: f64,
        token: &CancellationToken,
    ) -> OrreryResult<FrameReport> {
        self.run_blocking(graph, dt, Some(token))
    }

    /// Awaitable frame. Async modules run on the caller's executor.
    pub async fn execute_frame_async(
        &self,
        graph: &dyn SimGraph,
        dt: f64,
    ) -> OrreryResult<FrameReport> {
        let started = Instant::now();
        let view = self.current_view();
        let params = self.parameters();
        let ctx = self.frame_context(graph, dt, &params, None);
        let outcome = executor::run_frame_async(&ctx, &view, None).await;
        self.finish_frame(ctx, outcome, started)
    }

    /// Awaitable frame that streams a [`ModuleCompletion`] for every
    /// async module as it finishes.
    pub async fn execute_frame_streaming(
        &self,
        graph: &dyn SimGraph,
        dt: f64,
        sender: UnboundedSender<ModuleCompletion>,
    ) -> OrreryResult<FrameReport> {
        let started = Instant::now();
        let view = self.current_view();
        let params = self.parameters();
        let ctx = self.frame_context(graph, dt, &params, None);
        let outcome = executor::run_frame_async(&ctx, &view, Some(&sender)).await;
        self.finish_frame(ctx, outcome, started)
    }

    fn run_blocking(
        &self,
        graph: &dyn SimGraph,
        dt: f64,
        cancel: Option<&CancellationToken>,
    ) -> OrreryResult<FrameReport> {
        let started = Instant::now();
        let view = self.current_view();
        let params = self.parameters();
        let ctx = self.frame_context(graph, dt, &params, cancel);
        let outcome = executor::run_frame(&ctx, &view);
        self.finish_frame(ctx, outcome, started)
    }

    fn frame_context<'a>(
        &'a self,
        graph: &'a dyn SimGraph,
        dt: f64,
        params: &'a PhysicsParams,
        cancel: Option<&'a CancellationToken>,
    ) -> FrameContext<'a> {
        FrameContext {
            graph,
            dt,
            params,
            zero_copy: self.config.zero_copy,
            record_timings: self.config.record_timings,
            coordinator: &self.coordinator,
            classifier: &self.classifier,
            pool: &self.pool,
            cancel,
            execution_count: self.execution_count(),
            recorder: FrameRecorder::default(),
        }
    }

    fn finish_frame(
        &self,
        ctx: FrameContext<'_>,
        outcome: OrreryResult<()>,
        started: Instant,
    ) -> OrreryResult<FrameReport> {
        let recorder = ctx.recorder;
        if let Err(err) = outcome {
            if matches!(err, OrreryError::Cancelled) {
                tracing::info!(execution_count = ctx.execution_count, "frame cancelled");
                self.log("frame cancelled".to_string());
            }
            self.bus.flush();
            return Err(err);
        }

        let count = self.execution_count.fetch_add(1, Ordering::AcqRel) + 1;
        let report = recorder.into_report(count, started.elapsed());
        self.emit(EventKind::FrameCompleted {
            modules_executed: report.modules_executed,
            recoverable_errors: report.failures.len(),
            wall_time: report.wall_time.as_secs_f64(),
        });
        self.bus.flush();
        Ok(report)
    }

    // ─── Collaborators ───────────────────────────────────────

    pub fn coordinator(&self) -> &Arc<BarrierCoordinator> {
        &self.coordinator
    }

    /// Shorthand for [`BarrierCoordinator::register_sync_manager`].
    /// Must not be called while a frame is running.
    pub fn register_sync_manager(&self, device: DeviceId, manager: Arc<dyn GpuSync>) {
        self.coordinator.register_sync_manager(device, manager);
    }

    /// The event bus; add sinks here.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    fn cleanup_module(&self, descriptor: &ModuleDescriptor) {
        let name = descriptor.name();
        if let Err(err) = executor::contain(name, || descriptor.module().cleanup()) {
            self.classifier
                .classify(name, &err, Phase::Cleanup, self.execution_count());
        }
    }

    fn emit(&self, kind: EventKind) {
        self.bus
            .emit(PipelineEvent::new(self.execution_count(), kind));
    }

    pub(crate) fn log(&self, message: String) {
        self.bus
            .emit(PipelineEvent::log(self.execution_count(), message));
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        let drained = self.state.get_mut().registry.drain();
        for descriptor in &drained {
            self.cleanup_module(descriptor);
        }
        self.bus.finalize();
    }
}
