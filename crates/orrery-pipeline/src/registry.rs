//! Module registry: the ordered list of registered modules.
//!
//! Registration order is the tie-breaker for modules with equal stage and
//! priority, so the backing collection is a plain `Vec` and reordering
//! operations move entries within it. Locking is the pipeline's job; the
//! registry itself is single-threaded.

use std::sync::Arc;

use orrery_types::{OrreryError, OrreryResult};

use crate::descriptor::ModuleDescriptor;

/// Outcome of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Added,
    /// A module with the same name already exists; nothing changed.
    Duplicate,
}

#[derive(Default)]
pub struct ModuleRegistry {
    entries: Vec<Arc<ModuleDescriptor>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts at `index` (clamped to the end), or appends when `None`.
    ///
    /// Fails with [`OrreryError::ExclusiveGroupConflict`] if another enabled
    /// module already holds the newcomer's exclusive group, whether or not
    /// the newcomer itself is enabled.
    pub fn insert(
        &mut self,
        descriptor: ModuleDescriptor,
        index: Option<usize>,
    ) -> OrreryResult<Insertion> {
        if self.position(descriptor.name()).is_some() {
            return Ok(Insertion::Duplicate);
        }
        if let Some(group) = descriptor.exclusive_group() {
            self.check_exclusive(descriptor.name(), group)?;
        }

        let index = index.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries.insert(index, Arc::new(descriptor));
        Ok(Insertion::Added)
    }

    /// Errors if an enabled module other than `name` holds `group`.
    pub fn check_exclusive(&self, name: &str, group: &str) -> OrreryResult<()> {
        let holder = self.entries.iter().find(|d| {
            d.name() != name && d.is_enabled() && d.exclusive_group() == Some(group)
        });
        match holder {
            Some(holder) => Err(OrreryError::ExclusiveGroupConflict {
                module: name.to_string(),
                group: group.to_string(),
                holder: holder.name().to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        let index = self.position(name)?;
        Some(self.entries.remove(index))
    }

    /// Removes every entry, in registration order.
    pub fn drain(&mut self) -> Vec<Arc<ModuleDescriptor>> {
        std::mem::take(&mut self.entries)
    }

    /// Moves one slot toward the front. Returns false if not found or
    /// already first.
    pub fn move_up(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) if index > 0 => {
                self.entries.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    /// Moves one slot toward the back.
    pub fn move_down(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) if index + 1 < self.entries.len() => {
                self.entries.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    /// Moves to `index`, clamped to the last slot.
    pub fn move_to(&mut self, name: &str, index: usize) -> bool {
        let Some(from) = self.position(name) else {
            return false;
        };
        let entry = self.entries.remove(from);
        let to = index.min(self.entries.len());
        self.entries.insert(to, entry);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.entries.iter().find(|d| d.name() == name)
    }

    pub fn by_category(&self, category: &str) -> Vec<Arc<ModuleDescriptor>> {
        self.entries
            .iter()
            .filter(|d| d.category() == category)
            .cloned()
            .collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|d| d.name() == name)
    }

    /// Registered entries in registration order.
    pub fn entries(&self) -> &[Arc<ModuleDescriptor>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
