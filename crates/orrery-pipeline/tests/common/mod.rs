//! Shared test modules for the pipeline integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::json;

use orrery_gpu::{HostSync, Residency};
use orrery_pipeline::{
    DynamicParameters, ExecutionKind, GraphBuffers, GroupMode, PhysicsModule, PhysicsParams,
    Pipeline, SerializableModule, SimGraph, Stage, ZeroCopyModule,
};
use orrery_types::{DeviceId, OrreryError, OrreryResult};

// ─── Call Log ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edge {
    Enter,
    Exit,
}

/// Records module entry/exit order and peak concurrency.
#[derive(Default)]
pub struct CallLog {
    events: Mutex<Vec<(String, Edge)>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enter(&self, name: &str) {
        self.events.lock().push((name.to_string(), Edge::Enter));
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self, name: &str) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().push((name.to_string(), Edge::Exit));
    }

    /// Module names in the order they were entered.
    pub fn starts(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(_, edge)| *edge == Edge::Enter)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn index_of(&self, name: &str, edge: Edge) -> Option<usize> {
        self.events
            .lock()
            .iter()
            .position(|(n, e)| n == name && *e == edge)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.events.lock().clear();
        self.peak.store(0, Ordering::SeqCst);
    }
}

// ─── Probe Module ────────────────────────────────────────────

/// What a probe does when stepped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Recoverable,
    OutOfMemory,
    DeviceLost,
    Panic,
}

impl Behavior {
    fn outcome(self, name: &str) -> OrreryResult<()> {
        match self {
            Behavior::Succeed => Ok(()),
            Behavior::Recoverable => Err(OrreryError::module(format!("{name} diverged"))),
            Behavior::OutOfMemory => Err(OrreryError::OutOfMemory(format!("{name} buffer"))),
            Behavior::DeviceLost => Err(OrreryError::DeviceLost {
                device: DeviceId(0),
                message: "driver reset".into(),
            }),
            Behavior::Panic => panic!("{name} exploded"),
        }
    }
}

/// Configurable test module.
pub struct Probe {
    name: String,
    log: Arc<CallLog>,
    kind: ExecutionKind,
    stage: Stage,
    priority: i32,
    category: String,
    group: Option<String>,
    mode: GroupMode,
    exclusive: Option<String>,
    device: DeviceId,
    enabled: bool,
    behavior: Mutex<Behavior>,
    cleanup_fails: bool,
    sleep: Duration,
    yields: usize,
    serializable: bool,
    save_fails: bool,
    dynamic: bool,
    watch: Option<Arc<HostSync>>,

    pub steps: AtomicU64,
    pub inits: AtomicUsize,
    pub cleanups: AtomicUsize,
    pub last_revision: AtomicU64,
    pub saw_compute: Mutex<Vec<bool>>,
}

impl Probe {
    pub fn new(name: &str, log: &Arc<CallLog>) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            kind: ExecutionKind::SyncCpu,
            stage: Stage::Forces,
            priority: 0,
            category: "general".into(),
            group: None,
            mode: GroupMode::Sequential,
            exclusive: None,
            device: DeviceId::AUTO,
            enabled: true,
            behavior: Mutex::new(Behavior::Succeed),
            cleanup_fails: false,
            sleep: Duration::ZERO,
            yields: 0,
            serializable: false,
            save_fails: false,
            dynamic: false,
            watch: None,
            steps: AtomicU64::new(0),
            inits: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
            last_revision: AtomicU64::new(0),
            saw_compute: Mutex::new(Vec::new()),
        }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn kind(mut self, kind: ExecutionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn group(mut self, group: &str, mode: GroupMode) -> Self {
        self.group = Some(group.to_string());
        self.mode = mode;
        self
    }

    pub fn exclusive(mut self, group: &str) -> Self {
        self.exclusive = Some(group.to_string());
        self
    }

    pub fn device(mut self, device: i32) -> Self {
        self.device = DeviceId(device);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn behavior(self, behavior: Behavior) -> Self {
        *self.behavior.lock() = behavior;
        self
    }

    pub fn failing_cleanup(mut self) -> Self {
        self.cleanup_fails = true;
        self
    }

    pub fn sleep(mut self, duration: Duration) -> Self {
        self.sleep = duration;
        self
    }

    pub fn yields(mut self, count: usize) -> Self {
        self.yields = count;
        self
    }

    pub fn serializable(mut self) -> Self {
        self.serializable = true;
        self
    }

    pub fn failing_save(mut self) -> Self {
        self.serializable = true;
        self.save_fails = true;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Records the residency of `sync` on every step.
    pub fn watch(mut self, sync: &Arc<HostSync>) -> Self {
        self.watch = Some(Arc::clone(sync));
        self
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn step_count(&self) -> u64 {
        self.steps.load(Ordering::SeqCst)
    }

    fn step(&self) -> OrreryResult<()> {
        self.log.enter(&self.name);
        if !self.sleep.is_zero() {
            std::thread::sleep(self.sleep);
        }
        if let Some(sync) = &self.watch {
            self.saw_compute
                .lock()
                .push(sync.residency() == Residency::Compute);
        }
        self.steps.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock();
        self.log.exit(&self.name);
        behavior.outcome(&self.name)
    }
}

impl PhysicsModule for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled_by_default(&self) -> bool {
        self.enabled
    }

    fn execution_kind(&self) -> ExecutionKind {
        self.kind
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn module_group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    fn group_mode(&self) -> GroupMode {
        self.mode
    }

    fn exclusive_group(&self) -> Option<&str> {
        self.exclusive.as_deref()
    }

    fn preferred_device(&self) -> DeviceId {
        self.device
    }

    fn initialize(&self, _graph: &dyn SimGraph) -> OrreryResult<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn execute_step(&self, _graph: &dyn SimGraph, _dt: f64) -> OrreryResult<()> {
        self.step()
    }

    fn execute_step_async<'a>(
        &'a self,
        _graph: &'a dyn SimGraph,
        _dt: f64,
    ) -> BoxFuture<'a, OrreryResult<()>> {
        Box::pin(async move {
            self.log.enter(&self.name);
            for _ in 0..self.yields {
                YieldOnce::default().await;
            }
            self.steps.fetch_add(1, Ordering::SeqCst);
            let behavior = *self.behavior.lock();
            self.log.exit(&self.name);
            behavior.outcome(&self.name)
        })
    }

    fn cleanup(&self) -> OrreryResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        if self.cleanup_fails {
            return Err(OrreryError::module("cleanup failed"));
        }
        Ok(())
    }

    fn as_serializable(&self) -> Option<&dyn SerializableModule> {
        self.serializable.then_some(self as &dyn SerializableModule)
    }

    fn as_dynamic(&self) -> Option<&dyn DynamicParameters> {
        self.dynamic.then_some(self as &dyn DynamicParameters)
    }
}

impl SerializableModule for Probe {
    fn save_state(&self) -> OrreryResult<Option<serde_json::Value>> {
        if self.save_fails {
            return Err(OrreryError::Serialization("state unavailable".into()));
        }
        Ok(Some(json!({ "steps": self.step_count() })))
    }

    fn load_state(&self, state: &serde_json::Value) -> OrreryResult<()> {
        let steps = state
            .get("steps")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| OrreryError::InvalidSnapshot("missing steps".into()))?;
        self.steps.store(steps, Ordering::SeqCst);
        Ok(())
    }
}

impl DynamicParameters for Probe {
    fn update_parameters(&self, params: &PhysicsParams) -> OrreryResult<()> {
        self.last_revision.store(params.revision, Ordering::SeqCst);
        Ok(())
    }
}

// ─── Special-Purpose Modules ─────────────────────────────────

/// Adds `rate * dt` to every phase, through either entry point.
pub struct Advance {
    pub zero_copy: bool,
    pub span_calls: AtomicUsize,
}

impl Advance {
    pub fn new(zero_copy: bool) -> Self {
        Self {
            zero_copy,
            span_calls: AtomicUsize::new(0),
        }
    }

    fn advance(buffers: GraphBuffers<'_>, dt: f64) {
        for (phase, rate) in buffers.phases.iter_mut().zip(buffers.rates.iter()) {
            *phase += rate * dt as f32;
        }
    }
}

impl PhysicsModule for Advance {
    fn name(&self) -> &str {
        "Advance"
    }

    fn execute_step(&self, graph: &dyn SimGraph, dt: f64) -> OrreryResult<()> {
        graph
            .with_buffers(&mut |buffers| {
                Self::advance(buffers, dt);
                Ok(())
            })
            .unwrap_or(Ok(()))
    }

    fn as_zero_copy(&self) -> Option<&dyn ZeroCopyModule> {
        self.zero_copy.then_some(self as &dyn ZeroCopyModule)
    }
}

impl ZeroCopyModule for Advance {
    fn execute_span(&self, buffers: GraphBuffers<'_>, dt: f64) -> OrreryResult<()> {
        self.span_calls.fetch_add(1, Ordering::SeqCst);
        Self::advance(buffers, dt);
        Ok(())
    }
}

/// Registers `late` into the pipeline the first time it runs.
pub struct Registrar {
    pub pipeline: Mutex<Weak<Pipeline>>,
    pub late: Mutex<Option<Arc<dyn PhysicsModule>>>,
}

impl PhysicsModule for Registrar {
    fn name(&self) -> &str {
        "Registrar"
    }

    fn stage(&self) -> Stage {
        Stage::Preparation
    }

    fn execute_step(&self, _graph: &dyn SimGraph, _dt: f64) -> OrreryResult<()> {
        let late = self.late.lock().take();
        if let (Some(pipeline), Some(late)) = (self.pipeline.lock().upgrade(), late) {
            pipeline.register(late)?;
        }
        Ok(())
    }
}

/// Cancels a token when stepped.
pub struct Canceller {
    pub token: orrery_pipeline::CancellationToken,
}

impl PhysicsModule for Canceller {
    fn name(&self) -> &str {
        "Canceller"
    }

    fn stage(&self) -> Stage {
        Stage::Preparation
    }

    fn execute_step(&self, _graph: &dyn SimGraph, _dt: f64) -> OrreryResult<()> {
        self.token.cancel();
        Ok(())
    }
}

/// Returns `Pending` once, waking itself, then `Ready`.
#[derive(Default)]
pub struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
