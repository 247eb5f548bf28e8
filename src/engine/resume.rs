// src/engine/resume.rs

//! Failure recovery advice.
//!
//! After a partial run, work out the smallest set of nodes whose
//! re-execution reaches the failure point again with all required
//! intermediate state available. The walk relies on persistence
//! classification: only durable datasets (and the graph's original free
//! inputs) can seed a restart.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;

use tracing::debug;

use crate::data::{DataRegistry, Persistence, base_name};
use crate::graph::Pipeline;

/// Outcome of a resume computation.
///
/// `NothingRan` is distinct from an empty restart list so that "the very
/// first node failed" cannot be mistaken for "nothing to redo".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeSuggestion {
    /// No node completed; rerun the pipeline from the start.
    NothingRan,
    /// Re-execute these nodes (sorted) and everything downstream of them.
    RestartFrom(Vec<String>),
}

impl fmt::Display for ResumeSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResumeSuggestion::NothingRan => f.write_str("no nodes ran"),
            ResumeSuggestion::RestartFrom(names) => {
                write!(f, "resume from: {}", names.join(", "))
            }
        }
    }
}

/// Compute the minimal restart frontier for a partially executed pipeline.
///
/// Starting from the remaining pipeline's entry nodes (the ones consuming
/// its free inputs), walk backward along dependency edges. A node whose
/// inputs are all available — original free inputs count as externally
/// durable; anything else must be durable and currently exist — is a
/// restart boundary and is reported; otherwise the walk continues through
/// its parents.
pub fn suggest(
    pipeline: &Pipeline,
    completed: &BTreeSet<String>,
    registry: &DataRegistry,
) -> ResumeSuggestion {
    if completed.is_empty() {
        return ResumeSuggestion::NothingRan;
    }

    let remaining = pipeline.only_nodes(
        pipeline
            .nodes()
            .iter()
            .map(|n| n.name())
            .filter(|name| !completed.contains(*name)),
    );

    // Entry nodes: consume at least one free input of the remaining graph.
    let mut queue: VecDeque<String> = remaining
        .nodes()
        .iter()
        .filter(|node| {
            node.inputs()
                .iter()
                .any(|input| remaining.free_inputs().contains(base_name(input)))
        })
        .map(|node| node.name().to_string())
        .collect();
    let mut visited: HashSet<String> = queue.iter().cloned().collect();
    let mut boundary: BTreeSet<String> = BTreeSet::new();

    while let Some(name) = queue.pop_front() {
        if inputs_available(pipeline, registry, &name) {
            debug!(node = %name, "inputs durably available; restart boundary");
            boundary.insert(name);
            continue;
        }
        for parent in pipeline.dependencies_of(&name) {
            if visited.insert(parent.clone()) {
                queue.push_back(parent.clone());
            }
        }
    }

    ResumeSuggestion::RestartFrom(boundary.into_iter().collect())
}

/// Whether every input of the node can be read back without recomputation.
fn inputs_available(pipeline: &Pipeline, registry: &DataRegistry, node_name: &str) -> bool {
    let Some(node) = pipeline.node(node_name) else {
        return false;
    };
    node.inputs().iter().all(|input| {
        if pipeline.free_inputs().contains(base_name(input)) {
            return true;
        }
        match registry.resolve(input) {
            Ok(handle) => handle.persistence() == Persistence::Durable && handle.exists(),
            Err(_) => false,
        }
    })
}
