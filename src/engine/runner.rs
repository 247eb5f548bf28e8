// src/engine/runner.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::data::{DataRegistry, Value, base_name};
use crate::engine::resume::suggest;
use crate::errors::RunError;
use crate::graph::{Node, Pipeline};

/// How ready nodes are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One node at a time, deterministic layer order.
    Sequential,
    /// Every ready node is dispatched to the blocking worker pool; nodes
    /// without a dependency edge between them may overlap freely.
    Concurrent,
}

/// Per-run state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    /// Waiting on dependencies.
    Pending,
    /// Dispatched to a worker.
    Running,
    /// Completed successfully; outputs are saved.
    Done,
    /// Failed; no dependent will be started.
    Failed,
}

/// Drives a pipeline through load → compute → save against a registry.
///
/// The engine owns no data itself: nodes come from the [`Pipeline`],
/// values live behind the [`DataRegistry`]'s dataset handles. Consumer
/// counts decide release timing — a dataset is dropped the instant its
/// last consumer finishes, except for the graph's own free inputs and
/// terminal outputs.
#[derive(Debug, Clone)]
pub struct Engine {
    strategy: Strategy,
}

impl Engine {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    pub fn sequential() -> Self {
        Self::new(Strategy::Sequential)
    }

    pub fn concurrent() -> Self {
        Self::new(Strategy::Concurrent)
    }

    /// Run the pipeline to completion.
    ///
    /// On success, returns every terminal output name mapped to its final
    /// value. On failure, no new node is started after the first error is
    /// observed, in-flight work is awaited, and the returned
    /// [`RunError::Halted`] carries the resume advisor's suggestion with
    /// the original cause chained underneath.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        registry: &DataRegistry,
    ) -> Result<BTreeMap<String, Value>, RunError> {
        preflight(pipeline, registry)?;
        let mut counts = consumer_counts(pipeline);

        info!(
            strategy = ?self.strategy,
            nodes = pipeline.len(),
            "starting pipeline run"
        );

        let outcome = match self.strategy {
            Strategy::Sequential => run_sequential(pipeline, registry, &mut counts),
            Strategy::Concurrent => run_concurrent(pipeline, registry, &mut counts).await,
        };

        match outcome {
            Ok(()) => {
                info!("pipeline run completed");
                collect_outputs(pipeline, registry)
            }
            Err((completed, err)) => {
                let resume = suggest(pipeline, &completed, registry);
                warn!(%resume, error = %err, "pipeline run failed");
                Err(RunError::Halted {
                    resume,
                    source: Box::new(err),
                })
            }
        }
    }
}

/// Every name a node will touch must already be bound; this runs before
/// any node starts so a typo cannot waste half a pipeline.
fn preflight(pipeline: &Pipeline, registry: &DataRegistry) -> Result<(), RunError> {
    for node in pipeline.nodes() {
        let referenced = node
            .inputs()
            .iter()
            .chain(node.outputs())
            .chain(node.confirms());
        for name in referenced {
            if !registry.contains(name) {
                return Err(RunError::MissingDataset(name.clone()));
            }
        }
    }
    Ok(())
}

/// Initial consumer counts: one per consuming node per input name.
fn consumer_counts(pipeline: &Pipeline) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for node in pipeline.nodes() {
        for input in node.unique_inputs() {
            *counts.entry(input.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

type Halt = (BTreeSet<String>, RunError);

fn run_sequential(
    pipeline: &Pipeline,
    registry: &DataRegistry,
    counts: &mut HashMap<String, usize>,
) -> Result<(), Halt> {
    let mut completed: BTreeSet<String> = BTreeSet::new();

    for layer in pipeline.layers() {
        for name in layer {
            let Some(node) = pipeline.node(name) else {
                warn!(node = %name, "layered node missing from pipeline; skipping");
                continue;
            };
            debug!(node = %name, "running node");
            if let Err(err) = run_node(node, registry) {
                return Err((completed, err));
            }
            completed.insert(name.clone());
            if let Err(err) = settle_after(node, pipeline, registry, counts) {
                return Err((completed, err));
            }
        }
    }
    Ok(())
}

async fn run_concurrent(
    pipeline: &Pipeline,
    registry: &DataRegistry,
    counts: &mut HashMap<String, usize>,
) -> Result<(), Halt> {
    let mut states: HashMap<String, NodeState> = pipeline
        .nodes()
        .iter()
        .map(|n| (n.name().to_string(), NodeState::Pending))
        .collect();
    let mut completed: BTreeSet<String> = BTreeSet::new();
    let mut failure: Option<RunError> = None;
    let mut workers: JoinSet<(String, Result<(), RunError>)> = JoinSet::new();

    loop {
        if failure.is_none() {
            spawn_ready(pipeline, registry, &mut states, &mut workers);
        }

        // Once a failure is observed no new work is issued, but in-flight
        // nodes are drained cooperatively rather than aborted.
        let Some(joined) = workers.join_next().await else {
            break;
        };
        let (name, outcome) = match joined {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "worker task did not complete");
                if failure.is_none() {
                    failure = Some(RunError::Node {
                        node: "<worker>".to_string(),
                        source: anyhow::Error::new(err),
                    });
                }
                continue;
            }
        };

        match outcome {
            Ok(()) => {
                states.insert(name.clone(), NodeState::Done);
                let Some(node) = pipeline.node(&name) else {
                    warn!(node = %name, "completed node missing from pipeline");
                    continue;
                };
                debug!(node = %name, "node completed");
                completed.insert(name);
                if let Err(err) = settle_after(node, pipeline, registry, counts) {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
            }
            Err(err) => {
                states.insert(name.clone(), NodeState::Failed);
                warn!(node = %name, error = %err, "node failed; no further nodes will start");
                if failure.is_none() {
                    failure = Some(err);
                }
            }
        }
    }

    match failure {
        Some(err) => Err((completed, err)),
        None => Ok(()),
    }
}

/// Dispatch every pending node whose dependencies are all done.
fn spawn_ready(
    pipeline: &Pipeline,
    registry: &DataRegistry,
    states: &mut HashMap<String, NodeState>,
    workers: &mut JoinSet<(String, Result<(), RunError>)>,
) {
    // Decide first, then mutate.
    let ready: Vec<String> = pipeline
        .nodes()
        .iter()
        .filter(|node| {
            states.get(node.name()) == Some(&NodeState::Pending)
                && pipeline
                    .dependencies_of(node.name())
                    .iter()
                    .all(|dep| states.get(dep.as_str()) == Some(&NodeState::Done))
        })
        .map(|node| node.name().to_string())
        .collect();

    for name in ready {
        let Some(node) = pipeline.node(&name) else {
            continue;
        };
        debug!(node = %name, "dependencies satisfied; dispatching to worker pool");
        states.insert(name.clone(), NodeState::Running);
        let node = node.clone();
        let registry = registry.clone();
        workers.spawn_blocking(move || {
            let result = run_node(&node, &registry);
            (name, result)
        });
    }
}

/// Load inputs, invoke the computation, save outputs, fire confirms.
fn run_node(node: &Node, registry: &DataRegistry) -> Result<(), RunError> {
    let mut values = Vec::with_capacity(node.inputs().len());
    for input in node.inputs() {
        let handle = registry.resolve(input)?;
        debug!(node = %node.name(), dataset = %input, "loading input");
        let value = handle.load().map_err(|source| RunError::Dataset {
            node: node.name().to_string(),
            source,
        })?;
        values.push(value);
    }

    let outputs = node.call(&values).map_err(|source| RunError::Node {
        node: node.name().to_string(),
        source,
    })?;
    if outputs.len() != node.outputs().len() {
        return Err(RunError::OutputArity {
            node: node.name().to_string(),
            expected: node.outputs().len(),
            got: outputs.len(),
        });
    }

    for (name, value) in node.outputs().iter().zip(outputs) {
        if value.is_null() {
            return Err(RunError::Output {
                node: node.name().to_string(),
                output: name.clone(),
            });
        }
        let handle = registry.resolve(name)?;
        debug!(node = %node.name(), dataset = %name, "saving output");
        handle.save(value).map_err(|source| RunError::Dataset {
            node: node.name().to_string(),
            source,
        })?;
    }

    for name in node.confirms() {
        debug!(node = %node.name(), dataset = %name, "confirming dataset");
        let handle = registry.resolve(name)?;
        handle.confirm().map_err(|source| RunError::Dataset {
            node: node.name().to_string(),
            source,
        })?;
    }

    Ok(())
}

/// Lifetime bookkeeping after a node finished.
///
/// Runs on the coordination task only, so counts need no lock. Releases at
/// the earliest opportunity: an input the moment its last consumer
/// finishes, an output immediately when nothing consumes it (the
/// transcoded save-side alias) — free inputs and terminal outputs of the
/// whole graph are never auto-released.
fn settle_after(
    node: &Node,
    pipeline: &Pipeline,
    registry: &DataRegistry,
    counts: &mut HashMap<String, usize>,
) -> Result<(), RunError> {
    for input in node.unique_inputs() {
        if let Some(count) = counts.get_mut(input) {
            *count = count.saturating_sub(1);
            if *count == 0 && !pipeline.free_inputs().contains(base_name(input)) {
                debug!(dataset = %input, "last consumer finished; releasing");
                registry.release(input)?;
            }
        }
    }
    for output in node.outputs() {
        let consumers = counts.get(output.as_str()).copied().unwrap_or(0);
        if consumers == 0 && !pipeline.terminal_outputs().contains(base_name(output)) {
            debug!(dataset = %output, "output has no consumers; releasing");
            registry.release(output)?;
        }
    }
    Ok(())
}

/// Load the values of the graph's terminal outputs for the caller.
fn collect_outputs(
    pipeline: &Pipeline,
    registry: &DataRegistry,
) -> Result<BTreeMap<String, Value>, RunError> {
    let mut outputs = BTreeMap::new();
    for node in pipeline.nodes() {
        for name in node.outputs() {
            if !pipeline.terminal_outputs().contains(base_name(name)) {
                continue;
            }
            let handle = registry.resolve(name)?;
            let value = handle.load().map_err(|source| RunError::Dataset {
                node: node.name().to_string(),
                source,
            })?;
            outputs.insert(name.clone(), value);
        }
    }
    Ok(outputs)
}
