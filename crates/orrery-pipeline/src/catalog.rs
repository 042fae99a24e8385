//! Name → constructor lookup for modules.
//!
//! The pipeline never discovers modules on its own. Callers that select
//! modules by name (the CLI reads them from a config file) fill a catalog
//! up front and install from it.

use std::collections::BTreeMap;
use std::sync::Arc;

use orrery_types::{OrreryError, OrreryResult};

use crate::module::PhysicsModule;
use crate::pipeline::Pipeline;

/// Builds a fresh module instance.
pub type ModuleFactory = Box<dyn Fn() -> Arc<dyn PhysicsModule> + Send + Sync>;

#[derive(Default)]
pub struct ModuleCatalog {
    factories: BTreeMap<String, ModuleFactory>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the factory for `name`.
    pub fn add<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn PhysicsModule> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Known names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(&self, name: &str) -> OrreryResult<Arc<dyn PhysicsModule>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| OrreryError::ModuleNotFound(name.to_string()))
    }

    /// Creates and registers each named module in order. Returns how many
    /// were newly registered.
    pub fn install<S: AsRef<str>>(&self, pipeline: &Pipeline, names: &[S]) -> OrreryResult<usize> {
        let mut added = 0;
        for name in names {
            if pipeline.register(self.create(name.as_ref())?)? {
                added += 1;
            }
        }
        Ok(added)
    }
}
