// src/lib.rs

//! `dagrun` — a dataflow execution engine.
//!
//! Given an acyclic graph of named computation steps ([`Node`]s assembled
//! into a [`Pipeline`]) and a [`DataRegistry`] binding dataset names to
//! handles, the [`Engine`] determines a valid execution order, runs each
//! node exactly once (sequentially or with independent nodes overlapped),
//! releases intermediate datasets the moment their last consumer finishes,
//! and on failure reports the minimal set of nodes to re-execute.
//!
//! The engine owns no data formats: everything behind the [`Dataset`]
//! contract — files, databases, in-memory holders — is supplied by the
//! caller.

pub mod data;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod logging;

pub use crate::data::{
    DataRegistry, Dataset, MemoryDataset, Persistence, TRANSCODING_SEPARATOR, Value, base_name,
};
pub use crate::engine::{Engine, ResumeSuggestion, Strategy};
pub use crate::errors::{DatasetError, GraphError, RunError};
pub use crate::graph::{Computation, Node, Pipeline};
