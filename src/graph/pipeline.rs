// src/graph/pipeline.rs

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::data::base_name;
use crate::errors::GraphError;
use crate::graph::node::Node;

/// Immutable set of nodes plus the dependency edges implied by matching
/// each node's inputs to upstream outputs (on base identity, so transcoded
/// aliases of one artifact connect).
///
/// All derived structure (adjacency, layering, boundary views) is computed
/// once at construction; `union`/`difference`/`only_nodes` return new
/// pipelines, which keeps retry variants and partial runs side-effect-free.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Nodes in declaration order.
    nodes: Vec<Node>,
    by_name: HashMap<String, usize>,
    /// Direct dependencies: node -> producers it reads from.
    deps: HashMap<String, Vec<String>>,
    /// Direct dependents: node -> consumers of its outputs.
    dependents: HashMap<String, Vec<String>>,
    /// Topological generations, name-sorted within a layer.
    layers: Vec<Vec<String>>,
    /// Base names consumed inside the graph but produced by no node.
    free_inputs: BTreeSet<String>,
    /// Base names produced inside the graph but consumed by no node.
    terminal_outputs: BTreeSet<String>,
}

impl Pipeline {
    /// Build a pipeline from a node list.
    ///
    /// Fails if two nodes share a name, if an output base name has more
    /// than one producer, or if the derived dependency relation has a
    /// cycle.
    pub fn build(nodes: Vec<Node>) -> Result<Self, GraphError> {
        for (idx, node) in nodes.iter().enumerate() {
            if nodes[..idx].iter().any(|n| n.name() == node.name()) {
                return Err(GraphError::DuplicateNode(node.name().to_string()));
            }
        }

        // Every output base name has exactly one producer.
        let mut producers: HashMap<&str, &str> = HashMap::new();
        for node in &nodes {
            for output in node.outputs() {
                let base = base_name(output);
                match producers.get(base) {
                    Some(first) => {
                        return Err(GraphError::DuplicateOutput {
                            name: base.to_string(),
                            first: (*first).to_string(),
                            second: node.name().to_string(),
                        });
                    }
                    None => {
                        producers.insert(base, node.name());
                    }
                }
            }
        }

        // A node reading its own output is the smallest possible cycle;
        // catch it directly for a precise error.
        for node in &nodes {
            let reads_own_output = node.inputs().iter().any(|input| {
                node.outputs()
                    .iter()
                    .any(|output| base_name(output) == base_name(input))
            });
            if reads_own_output {
                return Err(GraphError::Cycle(node.name().to_string()));
            }
        }

        // Cycle check over the derived edges. Edge direction: producer -> consumer.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for node in &nodes {
            graph.add_node(node.name());
        }
        for node in &nodes {
            for input in node.inputs() {
                if let Some(producer) = producers.get(base_name(input)) {
                    if *producer != node.name() {
                        graph.add_edge(*producer, node.name(), ());
                    }
                }
            }
        }
        if let Err(cycle) = toposort(&graph, None) {
            return Err(GraphError::Cycle(cycle.node_id().to_string()));
        }

        Ok(Self::assemble(nodes))
    }

    /// Assemble derived structure for an already-validated node set.
    ///
    /// Subsets of a valid pipeline cannot introduce duplicate names,
    /// duplicate outputs or cycles, so `difference` and `only_nodes` come
    /// through here without revalidating.
    fn assemble(nodes: Vec<Node>) -> Self {
        let mut by_name = HashMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            by_name.insert(node.name().to_string(), idx);
        }

        let mut producers: HashMap<String, String> = HashMap::new();
        for node in &nodes {
            for output in node.outputs() {
                producers.insert(base_name(output).to_string(), node.name().to_string());
            }
        }

        let mut deps: HashMap<String, Vec<String>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for node in &nodes {
            deps.insert(node.name().to_string(), Vec::new());
            dependents.insert(node.name().to_string(), Vec::new());
        }
        for node in &nodes {
            for input in node.unique_inputs() {
                let Some(producer) = producers.get(base_name(input)) else {
                    continue;
                };
                if producer == node.name() {
                    continue;
                }
                let entry = deps.entry(node.name().to_string()).or_default();
                if !entry.contains(producer) {
                    entry.push(producer.clone());
                    dependents
                        .entry(producer.clone())
                        .or_default()
                        .push(node.name().to_string());
                }
            }
        }

        // Layering: layer k depends only on layers < k. Iterating the
        // BTreeSet keeps each layer name-sorted for reproducibility.
        let mut placed: HashSet<String> = HashSet::new();
        let mut remaining: BTreeSet<String> = by_name.keys().cloned().collect();
        let mut layers: Vec<Vec<String>> = Vec::new();
        while !remaining.is_empty() {
            let ready: Vec<String> = remaining
                .iter()
                .filter(|name| {
                    self_deps(&deps, name.as_str())
                        .iter()
                        .all(|dep| placed.contains(dep))
                })
                .cloned()
                .collect();
            if ready.is_empty() {
                // Unreachable for validated node sets; bail out rather than spin.
                warn!("topological layering stalled; pipeline left partially layered");
                break;
            }
            for name in &ready {
                remaining.remove(name);
                placed.insert(name.clone());
            }
            layers.push(ready);
        }

        let consumed: BTreeSet<String> = nodes
            .iter()
            .flat_map(|n| n.inputs().iter().map(|i| base_name(i).to_string()))
            .collect();
        let produced: BTreeSet<String> = nodes
            .iter()
            .flat_map(|n| n.outputs().iter().map(|o| base_name(o).to_string()))
            .collect();
        let free_inputs = consumed.difference(&produced).cloned().collect();
        let terminal_outputs = produced.difference(&consumed).cloned().collect();

        Self {
            nodes,
            by_name,
            deps,
            dependents,
            layers,
            free_inputs,
            terminal_outputs,
        }
    }

    /// New pipeline containing the nodes of both operands.
    ///
    /// Revalidates, so duplicate node names or output ownership across the
    /// operands fail; substitution is spelled `difference` then `union`.
    pub fn union(&self, other: &Pipeline) -> Result<Pipeline, GraphError> {
        let mut nodes = self.nodes.clone();
        nodes.extend(other.nodes.iter().cloned());
        Self::build(nodes)
    }

    /// New pipeline without the nodes (by name) present in `other`.
    pub fn difference(&self, other: &Pipeline) -> Pipeline {
        let nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter(|n| other.node(n.name()).is_none())
            .cloned()
            .collect();
        Self::assemble(nodes)
    }

    /// New pipeline keeping only the named nodes.
    pub fn only_nodes<I>(&self, names: I) -> Pipeline
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let keep: HashSet<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        let nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter(|n| keep.contains(n.name()))
            .cloned()
            .collect();
        Self::assemble(nodes)
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.by_name.get(name).map(|&idx| &self.nodes[idx])
    }

    /// Immediate dependencies of a node (producers of its inputs).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.deps.get(name).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of a node (consumers of its outputs).
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents
            .get(name)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Topological generations: layer 0 has no intra-graph dependency,
    /// layer k depends only on layers `< k`.
    pub fn layers(&self) -> &[Vec<String>] {
        &self.layers
    }

    /// Base names consumed inside the graph but produced by no node
    /// (externally supplied; never auto-released).
    pub fn free_inputs(&self) -> &BTreeSet<String> {
        &self.free_inputs
    }

    /// Base names produced inside the graph but consumed by no node
    /// (returned to the caller; never auto-released).
    pub fn terminal_outputs(&self) -> &BTreeSet<String> {
        &self.terminal_outputs
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn self_deps<'a>(deps: &'a HashMap<String, Vec<String>>, name: &str) -> &'a [String] {
    deps.get(name).map(|d| d.as_slice()).unwrap_or(&[])
}
