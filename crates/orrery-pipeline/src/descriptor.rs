//! Per-module registration descriptor.
//!
//! Metadata and optional capabilities are resolved once, when a module is
//! registered, so the frame hot path reads plain fields instead of calling
//! back into trait objects.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use orrery_types::DeviceId;

use crate::module::{ExecutionKind, GroupMode, PhysicsModule, Stage};

/// Optional capabilities a module exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub zero_copy: bool,
    pub dynamic_parameters: bool,
    pub serializable: bool,
}

impl Capabilities {
    /// Queries the module's capability accessors.
    pub fn probe(module: &dyn PhysicsModule) -> Self {
        Self {
            zero_copy: module.as_zero_copy().is_some(),
            dynamic_parameters: module.as_dynamic().is_some(),
            serializable: module.as_serializable().is_some(),
        }
    }
}

/// Identity of the group a module is scheduled in.
///
/// Ungrouped modules form a singleton group keyed by their own name. The
/// two variants never compare equal, so a user group can share its text
/// with a module name without merging the two.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// A group declared by `module_group()`.
    Named(String),
    /// The singleton group of an ungrouped module.
    Solo(String),
}

impl GroupKey {
    /// The group name, or the module name for a singleton.
    pub fn name(&self) -> &str {
        match self {
            GroupKey::Named(name) | GroupKey::Solo(name) => name,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Named(name) => write!(f, "{name}"),
            GroupKey::Solo(name) => write!(f, "[{name}]"),
        }
    }
}

/// A registered module plus its cached metadata.
pub struct ModuleDescriptor {
    module: Arc<dyn PhysicsModule>,
    name: String,
    kind: ExecutionKind,
    stage: Stage,
    priority: i32,
    category: String,
    group_key: GroupKey,
    group_mode: GroupMode,
    exclusive_group: Option<String>,
    device: DeviceId,
    capabilities: Capabilities,
    enabled: AtomicBool,
}

impl ModuleDescriptor {
    pub fn new(module: Arc<dyn PhysicsModule>) -> Self {
        let name = module.name().to_string();
        let group_key = match module.module_group() {
            Some(group) => GroupKey::Named(group.to_string()),
            None => GroupKey::Solo(name.clone()),
        };
        Self {
            name,
            kind: module.execution_kind(),
            stage: module.stage(),
            priority: module.priority(),
            category: module.category().to_string(),
            group_key,
            group_mode: module.group_mode(),
            exclusive_group: module.exclusive_group().map(str::to_string),
            device: module.preferred_device(),
            capabilities: Capabilities::probe(module.as_ref()),
            enabled: AtomicBool::new(module.enabled_by_default()),
            module,
        }
    }

    pub fn module(&self) -> &Arc<dyn PhysicsModule> {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ExecutionKind {
        self.kind
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn group_key(&self) -> &GroupKey {
        &self.group_key
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self.group_key, GroupKey::Named(_))
    }

    pub fn group_mode(&self) -> GroupMode {
        self.group_mode
    }

    pub fn exclusive_group(&self) -> Option<&str> {
        self.exclusive_group.as_deref()
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Stores the flag; returns the previous value.
    pub(crate) fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel)
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("stage", &self.stage)
            .field("priority", &self.priority)
            .field("group_key", &self.group_key)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}
