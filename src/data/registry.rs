// src/data/registry.rs

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::data::dataset::{Dataset, MemoryDataset};
use crate::data::{base_name, value::Value};
use crate::errors::RunError;

type Entries = HashMap<String, Arc<dyn Dataset>>;

/// Mutable mapping from logical names to dataset handles.
///
/// The registry is a cheaply cloneable shared handle: clones see the same
/// entries, so an engine run and its worker tasks all resolve through one
/// map. The `RwLock` guards only the structure of the map; all dataset
/// content synchronization is the handles' own concern.
#[derive(Clone, Default)]
pub struct DataRegistry {
    entries: Arc<RwLock<Entries>>,
}

impl DataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind a dataset handle to a logical name, replacing any previous
    /// binding of that name.
    pub fn register(&self, name: impl Into<String>, dataset: Arc<dyn Dataset>) {
        let name = name.into();
        debug!(dataset = %name, "registering dataset handle");
        self.write().insert(name, dataset);
    }

    /// Promote a raw value to an in-memory handle ("feed" override).
    ///
    /// With `replace = false`, a name that already has a binding is left
    /// untouched; with `replace = true` the feed shadows it.
    pub fn register_feed(&self, name: impl Into<String>, value: Value, replace: bool) {
        let name = name.into();
        let mut entries = self.write();
        if entries.contains_key(&name) {
            if !replace {
                debug!(dataset = %name, "feed ignored; name already bound and replace=false");
                return;
            }
            debug!(dataset = %name, "feed replaces existing binding");
        }
        let dataset = MemoryDataset::with_value(name.clone(), value);
        entries.insert(name, Arc::new(dataset));
    }

    /// Resolve a name to its handle.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Dataset>, RunError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| RunError::MissingDataset(name.to_string()))
    }

    /// Whether a name has a binding.
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Release the named entry and every sibling sharing its base identity.
    ///
    /// Transcoded aliases (`ds@save`, `ds@load`) denote the same underlying
    /// artifact, so dropping cached payload on one must also drop it on the
    /// others; `Dataset::release` is idempotent, which makes the sweep safe.
    pub fn release(&self, name: &str) -> Result<(), RunError> {
        let base = base_name(name).to_string();
        let siblings: Vec<(String, Arc<dyn Dataset>)> = {
            let entries = self.read();
            if !entries.contains_key(name) {
                return Err(RunError::MissingDataset(name.to_string()));
            }
            entries
                .iter()
                .filter(|(entry, _)| base_name(entry.as_str()) == base)
                .map(|(entry, handle)| (entry.clone(), Arc::clone(handle)))
                .collect()
        };

        // Release outside the map guard; handles may do real work here.
        for (entry, handle) in siblings {
            debug!(dataset = %entry, "releasing dataset");
            handle.release();
        }
        Ok(())
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }
}
