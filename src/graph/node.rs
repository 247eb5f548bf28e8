// src/graph/node.rs

use std::fmt;
use std::sync::Arc;

use crate::data::{TRANSCODING_SEPARATOR, Value, base_name};
use crate::errors::GraphError;

/// The opaque callable at the heart of a node: a pure function from the
/// ordered input values to the ordered output values.
pub type Computation = Arc<dyn Fn(&[Value]) -> anyhow::Result<Vec<Value>> + Send + Sync>;

/// A single named computation step with declared input/output names.
///
/// Nodes are constructed once and immutable thereafter; substituting the
/// computation (e.g. to retry with a fixed implementation) goes through
/// [`Node::with_computation`] and the pipeline's set algebra, producing new
/// values rather than mutating the graph in place.
#[derive(Clone)]
pub struct Node {
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    confirms: Vec<String>,
    computation: Computation,
}

impl Node {
    /// Create a node.
    ///
    /// Dataset names are validated here rather than at call time: they must
    /// be non-empty and carry at most one transcoding marker, and no output
    /// name may be declared twice on the same node.
    pub fn new<I, O, F>(
        name: impl Into<String>,
        inputs: I,
        outputs: O,
        computation: F,
    ) -> Result<Self, GraphError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
        F: Fn(&[Value]) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(GraphError::EmptyNodeName);
        }

        let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
        let outputs: Vec<String> = outputs.into_iter().map(Into::into).collect();

        for dataset in inputs.iter().chain(outputs.iter()) {
            validate_dataset_name(&name, dataset)?;
        }
        for (idx, output) in outputs.iter().enumerate() {
            if outputs[..idx].iter().any(|o| base_name(o) == base_name(output)) {
                return Err(GraphError::InvalidName {
                    node: name,
                    name: output.clone(),
                    reason: "output declared twice on the same node".to_string(),
                });
            }
        }

        Ok(Self {
            name,
            inputs,
            outputs,
            confirms: Vec::new(),
            computation: Arc::new(computation),
        })
    }

    /// Declare datasets that must receive an explicit `confirm()` after this
    /// node's save step.
    pub fn with_confirms<C>(mut self, confirms: C) -> Result<Self, GraphError>
    where
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let confirms: Vec<String> = confirms.into_iter().map(Into::into).collect();
        for dataset in &confirms {
            validate_dataset_name(&self.name, dataset)?;
        }
        self.confirms = confirms;
        Ok(self)
    }

    /// Copy of this node with a substituted computation.
    ///
    /// Names and confirm declarations are kept; combined with
    /// `difference`/`union` on the pipeline this models "replace node X with
    /// node X'" without touching the original graph.
    pub fn with_computation<F>(&self, computation: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    {
        Self {
            name: self.name.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            confirms: self.confirms.clone(),
            computation: Arc::new(computation),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared input names, in call order.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Declared output names, in the order the computation returns them.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Datasets to confirm after a successful save step.
    pub fn confirms(&self) -> &[String] {
        &self.confirms
    }

    /// Invoke the computation with positionally matched input values.
    pub fn call(&self, inputs: &[Value]) -> anyhow::Result<Vec<Value>> {
        (self.computation)(inputs)
    }

    /// Input names deduplicated but in declaration order; consumer counting
    /// charges a node once per name no matter how often it reads it.
    pub(crate) fn unique_inputs(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for input in &self.inputs {
            if !seen.contains(&input.as_str()) {
                seen.push(input.as_str());
            }
        }
        seen
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("confirms", &self.confirms)
            .finish_non_exhaustive()
    }
}

fn validate_dataset_name(node: &str, name: &str) -> Result<(), GraphError> {
    if base_name(name).is_empty() {
        return Err(GraphError::InvalidName {
            node: node.to_string(),
            name: name.to_string(),
            reason: "dataset name must not be empty".to_string(),
        });
    }
    if name.matches(TRANSCODING_SEPARATOR).count() > 1 {
        return Err(GraphError::InvalidName {
            node: node.to_string(),
            name: name.to_string(),
            reason: format!("at most one '{TRANSCODING_SEPARATOR}' marker is allowed"),
        });
    }
    Ok(())
}
