mod common;

use std::collections::BTreeSet;
use std::error::Error;
use std::sync::Arc;

use common::{DurableStub, identity, split};
use dagrun::engine::suggest;
use dagrun::{DataRegistry, Engine, MemoryDataset, Pipeline, ResumeSuggestion, RunError};

type TestResult = Result<(), Box<dyn Error>>;

/// Diamond with two branches and durable checkpoints at ds0_* and ds2_*:
///
/// ```text
/// node1_A ─┐                ┌─ node3_A ── node4_A
///          ├── node2 (fork) ┤
/// node1_B ─┘                └─ node3_B ── node4_B
/// ```
fn scenario_pipeline() -> Pipeline {
    Pipeline::build(vec![
        identity("node1_A", "ds0_A", "ds1_A"),
        identity("node1_B", "ds0_B", "ds1_B"),
        split("node2", ["ds1_A", "ds1_B"], ["ds2_A", "ds2_B"]),
        identity("node3_A", "ds2_A", "ds3_A"),
        identity("node3_B", "ds2_B", "ds3_B"),
        identity("node4_A", "ds3_A", "ds4_A"),
        identity("node4_B", "ds3_B", "ds4_B"),
    ])
    .expect("valid scenario pipeline")
}

fn scenario_registry() -> DataRegistry {
    let registry = DataRegistry::new();
    for name in ["ds0_A", "ds0_B", "ds2_A", "ds2_B"] {
        registry.register(name, Arc::new(DurableStub::new(name)));
    }
    for name in ["ds1_A", "ds1_B", "ds3_A", "ds3_B", "ds4_A", "ds4_B"] {
        registry.register(name, Arc::new(MemoryDataset::new(name)));
    }
    registry
}

/// Swap the named nodes for failing variants via the pipeline set algebra,
/// the same way a caller would patch in a retry candidate.
fn with_failures(pipeline: &Pipeline, failing: &[&str]) -> Pipeline {
    let mut patched = pipeline.clone();
    for name in failing {
        let broken = patched
            .node(name)
            .expect("node present")
            .with_computation(|_| Err(anyhow::anyhow!("injected failure")));
        patched = patched
            .difference(&patched.only_nodes([*name]))
            .union(&Pipeline::build(vec![broken]).expect("single-node pipeline"))
            .expect("patched pipeline stays valid");
    }
    patched
}

fn restart(names: &[&str]) -> ResumeSuggestion {
    ResumeSuggestion::RestartFrom(names.iter().map(|s| s.to_string()).collect())
}

#[tokio::test]
async fn resume_suggestions_follow_durable_boundaries() -> TestResult {
    let cases: [(&[&str], ResumeSuggestion); 6] = [
        // First node fails: nothing ran, distinct from an empty restart set.
        (&["node1_A"], ResumeSuggestion::NothingRan),
        // Fork fails: its inputs are volatile, walk back to the sources.
        (&["node2"], restart(&["node1_A", "node1_B"])),
        // Branch head fails: its checkpoint input makes it its own boundary,
        // and the sibling branch never ran either.
        (&["node3_A"], restart(&["node3_A", "node3_B"])),
        // Deep failure: ds3_* are volatile, so back up to the checkpoints.
        (&["node4_A"], restart(&["node3_A", "node3_B"])),
        (&["node3_A", "node4_A"], restart(&["node3_A", "node3_B"])),
        (&["node2", "node4_A"], restart(&["node1_A", "node1_B"])),
    ];

    for (failing, expected) in cases {
        let pipeline = with_failures(&scenario_pipeline(), failing);
        let registry = scenario_registry();
        let err = Engine::sequential()
            .run(&pipeline, &registry)
            .await
            .expect_err("injected failure must halt the run");
        match err {
            RunError::Halted { resume, .. } => {
                assert_eq!(resume, expected, "failing nodes: {failing:?}");
            }
            other => panic!("expected Halted, got {other}"),
        }
    }
    Ok(())
}

#[test]
fn advisor_reports_only_the_boundary_nodes() {
    let pipeline = scenario_pipeline();
    let registry = scenario_registry();
    let completed: BTreeSet<String> = ["node1_A", "node1_B", "node2"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    assert_eq!(
        suggest(&pipeline, &completed, &registry),
        restart(&["node3_A", "node3_B"])
    );
}

#[test]
fn suggestion_formats_as_a_human_readable_hint() {
    assert_eq!(ResumeSuggestion::NothingRan.to_string(), "no nodes ran");
    assert_eq!(
        restart(&["node3_A", "node3_B"]).to_string(),
        "resume from: node3_A, node3_B"
    );
}

#[tokio::test]
async fn halted_error_message_names_the_restart_nodes() -> TestResult {
    let pipeline = with_failures(&scenario_pipeline(), &["node2"]);
    let registry = scenario_registry();
    let err = Engine::sequential()
        .run(&pipeline, &registry)
        .await
        .expect_err("injected failure must halt the run");

    assert_eq!(
        err.to_string(),
        "pipeline halted; resume from: node1_A, node1_B"
    );
    Ok(())
}
