#![allow(dead_code)]

//! Shared fixtures: instrumented datasets and node builders.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dagrun::{Dataset, DatasetError, Node, Persistence, Value};

/// Shared (op, dataset) event log, mirroring dataset lifetime during a run.
pub type Log = Arc<Mutex<Vec<(String, String)>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<(String, String)> {
    log.lock().unwrap().clone()
}

pub fn entry(op: &str, dataset: &str) -> (String, String) {
    (op.to_string(), dataset.to_string())
}

/// Dataset that records `load`/`release` calls.
///
/// `aliased` variants share one backing slot (two encodings of the same
/// artifact) and treat `release` as a cache drop: the shared artifact
/// stays readable.
pub struct LoggingDataset {
    log: Log,
    label: String,
    backing: Arc<Mutex<Option<Value>>>,
    clear_on_release: bool,
}

impl LoggingDataset {
    pub fn new(log: &Log, label: &str) -> Self {
        Self {
            log: log.clone(),
            label: label.to_string(),
            backing: Arc::new(Mutex::new(None)),
            clear_on_release: true,
        }
    }

    pub fn with_value(log: &Log, label: &str, value: Value) -> Self {
        Self {
            log: log.clone(),
            label: label.to_string(),
            backing: Arc::new(Mutex::new(Some(value))),
            clear_on_release: true,
        }
    }

    pub fn shared_backing() -> Arc<Mutex<Option<Value>>> {
        Arc::new(Mutex::new(None))
    }

    pub fn aliased(log: &Log, label: &str, backing: Arc<Mutex<Option<Value>>>) -> Self {
        Self {
            log: log.clone(),
            label: label.to_string(),
            backing,
            clear_on_release: false,
        }
    }
}

impl Dataset for LoggingDataset {
    fn load(&self) -> Result<Value, DatasetError> {
        self.log
            .lock()
            .unwrap()
            .push(("load".to_string(), self.label.clone()));
        self.backing
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DatasetError::Empty(self.label.clone()))
    }

    fn save(&self, value: Value) -> Result<(), DatasetError> {
        if value.is_null() {
            return Err(DatasetError::NullSave(self.label.clone()));
        }
        *self.backing.lock().unwrap() = Some(value);
        Ok(())
    }

    fn release(&self) {
        self.log
            .lock()
            .unwrap()
            .push(("release".to_string(), self.label.clone()));
        if self.clear_on_release {
            *self.backing.lock().unwrap() = None;
        }
    }

    fn exists(&self) -> bool {
        self.backing.lock().unwrap().is_some()
    }

    fn persistence(&self) -> Persistence {
        Persistence::Volatile
    }
}

/// Stand-in for externally checkpointed storage: always readable, always
/// durable, discards writes.
pub struct DurableStub {
    name: String,
}

impl DurableStub {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Dataset for DurableStub {
    fn load(&self) -> Result<Value, DatasetError> {
        Ok(Value::new(0i32))
    }

    fn save(&self, value: Value) -> Result<(), DatasetError> {
        if value.is_null() {
            return Err(DatasetError::NullSave(self.name.clone()));
        }
        Ok(())
    }

    fn release(&self) {}

    fn exists(&self) -> bool {
        true
    }

    fn persistence(&self) -> Persistence {
        Persistence::Durable
    }
}

/// In-memory dataset that counts `confirm` calls.
pub struct ConfirmTracker {
    label: String,
    slot: Mutex<Option<Value>>,
    confirmed: AtomicUsize,
}

impl ConfirmTracker {
    pub fn new(label: &str, value: Value) -> Self {
        Self {
            label: label.to_string(),
            slot: Mutex::new(Some(value)),
            confirmed: AtomicUsize::new(0),
        }
    }

    pub fn confirmations(&self) -> usize {
        self.confirmed.load(Ordering::SeqCst)
    }
}

impl Dataset for ConfirmTracker {
    fn load(&self) -> Result<Value, DatasetError> {
        self.slot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DatasetError::Empty(self.label.clone()))
    }

    fn save(&self, value: Value) -> Result<(), DatasetError> {
        if value.is_null() {
            return Err(DatasetError::NullSave(self.label.clone()));
        }
        *self.slot.lock().unwrap() = Some(value);
        Ok(())
    }

    fn release(&self) {
        *self.slot.lock().unwrap() = None;
    }

    fn confirm(&self) -> Result<(), DatasetError> {
        self.confirmed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exists(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }

    fn persistence(&self) -> Persistence {
        Persistence::Volatile
    }
}

/// Durable dataset over a UTF-8 text file; payloads must be `String`.
pub struct TextFileDataset {
    name: String,
    path: PathBuf,
}

impl TextFileDataset {
    pub fn new(name: &str, path: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            path,
        }
    }
}

impl Dataset for TextFileDataset {
    fn load(&self) -> Result<Value, DatasetError> {
        fs::read_to_string(&self.path)
            .map(Value::new)
            .map_err(|e| DatasetError::Backend {
                name: self.name.clone(),
                source: e.into(),
            })
    }

    fn save(&self, value: Value) -> Result<(), DatasetError> {
        if value.is_null() {
            return Err(DatasetError::NullSave(self.name.clone()));
        }
        let Some(text) = value.downcast_ref::<String>() else {
            return Err(DatasetError::Backend {
                name: self.name.clone(),
                source: anyhow::anyhow!("expected a String payload"),
            });
        };
        fs::write(&self.path, text).map_err(|e| DatasetError::Backend {
            name: self.name.clone(),
            source: e.into(),
        })
    }

    fn release(&self) {}

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn persistence(&self) -> Persistence {
        Persistence::Durable
    }
}

pub fn identity(name: &str, input: &str, output: &str) -> Node {
    Node::new(name, [input], [output], |values: &[Value]| {
        Ok(vec![values[0].clone()])
    })
    .expect("valid identity node")
}

pub fn source(name: &str, output: &str) -> Node {
    Node::new(name, Vec::<String>::new(), [output], |_: &[Value]| {
        Ok(vec![Value::new("stuff")])
    })
    .expect("valid source node")
}

pub fn sink(name: &str, input: &str) -> Node {
    Node::new(name, [input], Vec::<String>::new(), |_: &[Value]| Ok(vec![]))
        .expect("valid sink node")
}

/// Two-in/two-out pass-through.
pub fn split(name: &str, inputs: [&str; 2], outputs: [&str; 2]) -> Node {
    Node::new(name, inputs, outputs, |values: &[Value]| {
        Ok(vec![values[0].clone(), values[1].clone()])
    })
    .expect("valid split node")
}
