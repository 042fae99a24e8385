//! Frame executor.
//!
//! Walks a frozen [`SortedView`] stage by stage. Each group runs its
//! members by kind:
//!
//! 1. GPU members, inside one barrier bracket per device
//! 2. synchronous CPU members, sequential or fanned out on the pool
//! 3. async members, always awaited concurrently
//!
//! A group is complete only once all three buckets have drained, and a
//! stage only once every group has. Module failures go through the
//! classifier: recoverable ones are recorded and execution continues,
//! fatal ones unwind the frame. Fanned-out batches always drain before a
//! fatal error is propagated; the first fatal error in view order wins.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use parking_lot::Mutex;
use rayon::prelude::*;
use tokio::sync::mpsc::UnboundedSender;

use orrery_gpu::{BarrierCoordinator, GpuSync};
use orrery_telemetry::Phase;
use orrery_types::{DeviceId, OrreryError, OrreryResult};

use crate::cancellation::CancellationToken;
use crate::classifier::ErrorClassifier;
use crate::config::PhysicsParams;
use crate::descriptor::ModuleDescriptor;
use crate::graph::SimGraph;
use crate::module::{GroupMode, PhysicsModule};
use crate::report::{FrameReport, ModuleCompletion, ModuleFailure, ModuleTiming};
use crate::view::{GroupBatch, SortedView};

/// Everything one frame needs, borrowed from the pipeline.
pub(crate) struct FrameContext<'a> {
    pub graph: &'a dyn SimGraph,
    pub dt: f64,
    pub params: &'a PhysicsParams,
    pub zero_copy: bool,
    pub record_timings: bool,
    pub coordinator: &'a BarrierCoordinator,
    pub classifier: &'a ErrorClassifier,
    pub pool: &'a rayon::ThreadPool,
    pub cancel: Option<&'a CancellationToken>,
    /// Execution count when the frame started.
    pub execution_count: u64,
    pub recorder: FrameRecorder,
}

impl FrameContext<'_> {
    fn poll_cancel(&self) -> OrreryResult<()> {
        match self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    /// Classifies a failure. Returns it back only if it is fatal.
    fn settle_error(&self, label: &str, error: OrreryError) -> OrreryResult<()> {
        let category = self
            .classifier
            .classify(label, &error, Phase::Execute, self.execution_count);
        if category.is_fatal() {
            Err(error)
        } else {
            self.recorder.fail(label, &error);
            Ok(())
        }
    }
}

#[derive(Default)]
struct Recorded {
    executed: usize,
    timings: Vec<ModuleTiming>,
    failures: Vec<ModuleFailure>,
}

/// Collects timings and recoverable failures from any worker thread.
#[derive(Default)]
pub(crate) struct FrameRecorder {
    inner: Mutex<Recorded>,
}

impl FrameRecorder {
    fn record(&self, descriptor: &ModuleDescriptor, duration: Duration, keep_timing: bool) {
        let mut inner = self.inner.lock();
        inner.executed += 1;
        if keep_timing {
            inner.timings.push(ModuleTiming {
                module: descriptor.name().to_string(),
                stage: descriptor.stage(),
                kind: descriptor.kind(),
                duration,
            });
        }
    }

    fn fail(&self, module: &str, error: &OrreryError) {
        self.inner.lock().failures.push(ModuleFailure {
            module: module.to_string(),
            error: error.to_string(),
        });
    }

    pub fn into_report(self, execution_count: u64, wall_time: Duration) -> FrameReport {
        let inner = self.inner.into_inner();
        FrameReport {
            execution_count,
            wall_time,
            modules_executed: inner.executed,
            timings: inner.timings,
            failures: inner.failures,
        }
    }
}

// ─── Frame Walk ──────────────────────────────────────────────

/// Runs one frame, blocking the calling thread.
pub(crate) fn run_frame(ctx: &FrameContext<'_>, view: &SortedView) -> OrreryResult<()> {
    futures::executor::block_on(run_frame_async(ctx, view, None))
}

/// Runs one frame; async members are awaited on the caller's executor.
///
/// With a `sender`, every finished async member is streamed as soon as
/// it completes.
pub(crate) async fn run_frame_async(
    ctx: &FrameContext<'_>,
    view: &SortedView,
    sender: Option<&UnboundedSender<ModuleCompletion>>,
) -> OrreryResult<()> {
    for stage in view.stages() {
        ctx.poll_cancel()?;
        tracing::trace!(stage = %stage.stage, groups = stage.groups.len(), "stage begin");
        for group in &stage.groups {
            ctx.poll_cancel()?;
            run_group(ctx, group, sender).await?;
        }
    }
    Ok(())
}

async fn run_group(
    ctx: &FrameContext<'_>,
    group: &GroupBatch,
    sender: Option<&UnboundedSender<ModuleCompletion>>,
) -> OrreryResult<()> {
    run_gpu(ctx, &group.gpu)?;
    run_cpu(ctx, group)?;
    run_tasks(ctx, &group.tasks, sender).await
}

// ─── CPU Members ─────────────────────────────────────────────

fn run_cpu(ctx: &FrameContext<'_>, group: &GroupBatch) -> OrreryResult<()> {
    let members = &group.cpu;
    if group.mode == GroupMode::Parallel && members.len() > 1 {
        let results: Vec<OrreryResult<()>> = ctx.pool.install(|| {
            members
                .par_iter()
                .map(|descriptor| execute(ctx, descriptor, None))
                .collect()
        });
        return first_fatal(results);
    }

    for descriptor in members {
        ctx.poll_cancel()?;
        execute(ctx, descriptor, None)?;
    }
    Ok(())
}

// ─── GPU Members ─────────────────────────────────────────────

/// One bracketed dispatch unit: a device, its manager, its members.
struct GpuUnit<'v> {
    device: DeviceId,
    manager: Arc<dyn GpuSync>,
    members: Vec<&'v Arc<ModuleDescriptor>>,
}

fn run_gpu(ctx: &FrameContext<'_>, members: &[Arc<ModuleDescriptor>]) -> OrreryResult<()> {
    let Some(first) = members.first() else {
        return Ok(());
    };
    let coordinator = ctx.coordinator;

    // Devices without a registered manager fall back to the legacy default.
    let mut by_device: BTreeMap<DeviceId, Vec<&Arc<ModuleDescriptor>>> = BTreeMap::new();
    for descriptor in members {
        let device = descriptor.device();
        let key = if coordinator.device_manager(device).is_some() {
            device
        } else {
            DeviceId::AUTO
        };
        by_device.entry(key).or_default().push(descriptor);
    }

    if by_device.len() > 1 && coordinator.is_multi_device() {
        let units: Vec<GpuUnit<'_>> = by_device
            .into_iter()
            .map(|(device, members)| GpuUnit {
                device,
                manager: coordinator.manager_for(device),
                members,
            })
            .collect();
        return run_gpu_concurrent(ctx, units);
    }

    // Single bracket: the first member's device manager, else the default.
    let device = first.device();
    let (device, manager) = match coordinator.device_manager(device) {
        Some(manager) => (device, manager),
        None => (DeviceId::AUTO, coordinator.default_manager()),
    };
    let unit = GpuUnit {
        device,
        manager,
        members: members.iter().collect(),
    };
    run_bracket(ctx, &unit)
}

fn run_gpu_concurrent(ctx: &FrameContext<'_>, units: Vec<GpuUnit<'_>>) -> OrreryResult<()> {
    tracing::trace!(devices = units.len(), "multi-device GPU dispatch");
    let results: Vec<OrreryResult<()>> = std::thread::scope(|scope| {
        let handles: Vec<_> = units
            .iter()
            .map(|unit| (unit.device, scope.spawn(move || run_bracket(ctx, unit))))
            .collect();
        handles
            .into_iter()
            .map(|(device, handle)| {
                handle.join().unwrap_or_else(|payload| {
                    let error = OrreryError::Gpu(format!(
                        "dispatch for device {device} panicked: {}",
                        panic_message(payload.as_ref())
                    ));
                    ctx.settle_error(&barrier_label(device), error)
                })
            })
            .collect()
    });
    first_fatal(results)
}

/// compute → members in priority order → render → wait.
///
/// A fatal module error stops dispatch but the bracket still closes. A
/// barrier error is always classified; a module error takes precedence
/// over it when both are fatal.
fn run_bracket(ctx: &FrameContext<'_>, unit: &GpuUnit<'_>) -> OrreryResult<()> {
    let manager = unit.manager.as_ref();
    let mut dispatched = Ok(());
    let barrier = BarrierCoordinator::bracket(manager, || {
        dispatched = unit
            .members
            .iter()
            .try_for_each(|descriptor| execute(ctx, descriptor, Some((unit.device, manager))));
    });
    let barrier = match barrier {
        Ok(()) => Ok(()),
        Err(error) => ctx.settle_error(&barrier_label(unit.device), error),
    };
    dispatched.and(barrier)
}

fn barrier_label(device: DeviceId) -> String {
    format!("barrier:{device}")
}

// ─── Async Members ───────────────────────────────────────────

async fn run_tasks(
    ctx: &FrameContext<'_>,
    tasks: &[Arc<ModuleDescriptor>],
    sender: Option<&UnboundedSender<ModuleCompletion>>,
) -> OrreryResult<()> {
    if tasks.is_empty() {
        return Ok(());
    }

    let mut pending: FuturesUnordered<_> = tasks
        .iter()
        .enumerate()
        .map(|(index, descriptor)| async move {
            let started = Instant::now();
            let module = descriptor.module().as_ref();
            let result = AssertUnwindSafe(invoke_async(ctx, module, descriptor))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(panicked(descriptor.name(), payload.as_ref())));
            (index, descriptor, started.elapsed(), result)
        })
        .collect();

    let mut results: Vec<Option<OrreryResult<()>>> = tasks.iter().map(|_| None).collect();
    while let Some((index, descriptor, duration, result)) = pending.next().await {
        if let Some(sender) = sender {
            let completion = ModuleCompletion {
                module: descriptor.name().to_string(),
                duration,
                error: result.as_ref().err().map(ToString::to_string),
            };
            // A dropped receiver only stops the stream, not the frame.
            let _ = sender.send(completion);
        }
        results[index] = Some(settle(ctx, descriptor, duration, result, None));
    }
    first_fatal(results.into_iter().flatten())
}

async fn invoke_async(
    ctx: &FrameContext<'_>,
    module: &dyn PhysicsModule,
    descriptor: &ModuleDescriptor,
) -> OrreryResult<()> {
    apply_parameters(ctx, module, descriptor)?;
    if let Some(result) = try_zero_copy(ctx, module, descriptor) {
        return result;
    }
    module.execute_step_async(ctx.graph, ctx.dt).await
}

// ─── Dispatch Wrapper ────────────────────────────────────────

/// Runs one module and settles its outcome.
fn execute(
    ctx: &FrameContext<'_>,
    descriptor: &ModuleDescriptor,
    gpu: Option<(DeviceId, &dyn GpuSync)>,
) -> OrreryResult<()> {
    let started = Instant::now();
    let result = contain(descriptor.name(), || invoke(ctx, descriptor));
    settle(ctx, descriptor, started.elapsed(), result, gpu)
}

fn invoke(ctx: &FrameContext<'_>, descriptor: &ModuleDescriptor) -> OrreryResult<()> {
    let module = descriptor.module().as_ref();
    apply_parameters(ctx, module, descriptor)?;
    if let Some(result) = try_zero_copy(ctx, module, descriptor) {
        return result;
    }
    module.execute_step(ctx.graph, ctx.dt)
}

fn apply_parameters(
    ctx: &FrameContext<'_>,
    module: &dyn PhysicsModule,
    descriptor: &ModuleDescriptor,
) -> OrreryResult<()> {
    if !descriptor.capabilities().dynamic_parameters {
        return Ok(());
    }
    match module.as_dynamic() {
        Some(dynamic) => dynamic.update_parameters(ctx.params),
        None => Ok(()),
    }
}

/// `None` when the zero-copy path does not apply.
fn try_zero_copy(
    ctx: &FrameContext<'_>,
    module: &dyn PhysicsModule,
    descriptor: &ModuleDescriptor,
) -> Option<OrreryResult<()>> {
    if !(ctx.zero_copy && descriptor.capabilities().zero_copy) {
        return None;
    }
    let span = module.as_zero_copy()?;
    let dt = ctx.dt;
    ctx.graph
        .with_buffers(&mut |buffers| span.execute_span(buffers, dt))
}

/// Records the dispatch and classifies a failure.
///
/// GPU failures are wrapped with device context first.
fn settle(
    ctx: &FrameContext<'_>,
    descriptor: &ModuleDescriptor,
    duration: Duration,
    result: OrreryResult<()>,
    gpu: Option<(DeviceId, &dyn GpuSync)>,
) -> OrreryResult<()> {
    ctx.recorder.record(descriptor, duration, ctx.record_timings);
    let Err(error) = result else {
        return Ok(());
    };

    let error = match gpu {
        Some((device, manager)) => OrreryError::GpuModule {
            module: descriptor.name().to_string(),
            device,
            device_name: manager.device_name().map(str::to_string),
            source: Box::new(error),
        },
        None => error,
    };
    ctx.settle_error(descriptor.name(), error)
}

fn first_fatal(results: impl IntoIterator<Item = OrreryResult<()>>) -> OrreryResult<()> {
    results.into_iter().collect()
}

// ─── Panic Containment ───────────────────────────────────────

/// Runs module code, turning a panic into [`OrreryError::ModulePanicked`].
pub(crate) fn contain<T>(module: &str, f: impl FnOnce() -> OrreryResult<T>) -> OrreryResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(panicked(module, payload.as_ref())))
}

fn panicked(module: &str, payload: &(dyn Any + Send)) -> OrreryError {
    OrreryError::ModulePanicked {
        module: module.to_string(),
        message: panic_message(payload),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
