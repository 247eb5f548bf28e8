// src/errors.rs

//! Crate-wide error types.
//!
//! Graph construction, dataset access and pipeline runs each have their own
//! enum; anything open-ended (node computations, dataset backends) flows
//! through an `anyhow::Error` cause chained underneath.

use thiserror::Error;

use crate::engine::resume::ResumeSuggestion;

/// Errors raised while constructing a [`Pipeline`](crate::graph::Pipeline).
///
/// All of these are fatal at build time; no partial graph is produced.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cycle detected in the pipeline graph involving node '{0}'")]
    Cycle(String),

    #[error("output '{name}' is declared by both node '{first}' and node '{second}'")]
    DuplicateOutput {
        name: String,
        first: String,
        second: String,
    },

    #[error("pipeline contains more than one node named '{0}'")]
    DuplicateNode(String),

    #[error("node name must not be empty")]
    EmptyNodeName,

    #[error("invalid dataset name '{name}' on node '{node}': {reason}")]
    InvalidName {
        node: String,
        name: String,
        reason: String,
    },
}

/// Errors raised by dataset handles.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("no data to load in dataset '{0}'")]
    Empty(String),

    #[error("saving a null value to dataset '{0}' is not allowed")]
    NullSave(String),

    #[error("this dataset does not support confirm")]
    ConfirmUnsupported,

    /// Implementation-defined failure (I/O, parsing, remote storage, ...).
    #[error("dataset '{name}': {source}")]
    Backend {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors raised while running a pipeline.
#[derive(Debug, Error)]
pub enum RunError {
    /// Pre-flight validation: a referenced name has no registry binding.
    /// Raised before any node runs.
    #[error("dataset '{0}' is not registered in the data registry")]
    MissingDataset(String),

    /// A load, save or confirm failed inside a node.
    #[error("node '{node}': {source}")]
    Dataset {
        node: String,
        #[source]
        source: DatasetError,
    },

    /// The node's computation itself failed.
    #[error("node '{node}' failed: {source}")]
    Node {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    /// A node produced the null sentinel for a declared output. This signals
    /// an upstream bug, not a transient fault, so it fails the run.
    #[error("node '{node}' produced a null value for declared output '{output}'")]
    Output { node: String, output: String },

    /// The computation returned a different number of values than the node
    /// declares outputs.
    #[error("node '{node}' returned {got} output values, expected {expected}")]
    OutputArity {
        node: String,
        expected: usize,
        got: usize,
    },

    /// A failure halted the run. Carries the resume advisor's suggestion;
    /// the original failure is chained as `source()`.
    #[error("pipeline halted; {resume}")]
    Halted {
        resume: ResumeSuggestion,
        #[source]
        source: Box<RunError>,
    },
}
