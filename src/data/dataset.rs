// src/data/dataset.rs

use std::sync::{Mutex, PoisonError};

use crate::data::value::Value;
use crate::errors::DatasetError;

/// Whether a dataset's content survives beyond the current run.
///
/// Used by the resume advisor: only `Durable` datasets can seed a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Volatile,
    Durable,
}

/// Capability contract for a dataset handle.
///
/// The engine is polymorphic over this interface and never inspects the
/// concrete type behind it. Implementations must be safe to share across
/// concurrently running nodes; the engine guarantees that no two nodes ever
/// write the same name and that reads only happen after the producer
/// finished, so interior synchronization only needs to protect the handle's
/// own state.
pub trait Dataset: Send + Sync {
    /// Load the current value.
    fn load(&self) -> Result<Value, DatasetError>;

    /// Save a value. Saving the null sentinel must be rejected without
    /// partial mutation.
    fn save(&self, value: Value) -> Result<(), DatasetError>;

    /// Drop any in-memory payload. Best-effort and idempotent; the
    /// underlying artifact (if any) stays intact.
    fn release(&self);

    /// Commit signal for datasets with external transactional state, e.g.
    /// advancing a cursor. Only invoked for names a node lists in its
    /// confirm set, after that node's save step.
    fn confirm(&self) -> Result<(), DatasetError> {
        Err(DatasetError::ConfirmUnsupported)
    }

    /// Whether the dataset currently holds loadable content.
    fn exists(&self) -> bool;

    /// Persistence classification for resume suggestions.
    fn persistence(&self) -> Persistence;
}

/// In-memory dataset holding a single shared [`Value`].
///
/// This is what feed overrides promote raw values into; it is also the
/// natural binding for intermediate results that never touch storage.
#[derive(Debug)]
pub struct MemoryDataset {
    name: String,
    slot: Mutex<Option<Value>>,
}

impl MemoryDataset {
    /// Empty dataset; `load` fails until something is saved.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(None),
        }
    }

    /// Dataset pre-populated with a value.
    pub fn with_value(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(Some(value)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Value>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Dataset for MemoryDataset {
    fn load(&self) -> Result<Value, DatasetError> {
        self.slot()
            .clone()
            .ok_or_else(|| DatasetError::Empty(self.name.clone()))
    }

    fn save(&self, value: Value) -> Result<(), DatasetError> {
        if value.is_null() {
            return Err(DatasetError::NullSave(self.name.clone()));
        }
        *self.slot() = Some(value);
        Ok(())
    }

    fn release(&self) {
        *self.slot() = None;
    }

    fn exists(&self) -> bool {
        self.slot().is_some()
    }

    fn persistence(&self) -> Persistence {
        Persistence::Volatile
    }
}
