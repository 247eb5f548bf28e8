// src/engine/mod.rs

//! Execution engine.
//!
//! This module ties together:
//! - the runner (per-node state machine, consumer counts, release timing,
//!   sequential and concurrent dispatch)
//! - the resume advisor that turns a partial run into a minimal restart
//!   frontier

pub mod resume;
pub mod runner;

pub use resume::{ResumeSuggestion, suggest};
pub use runner::{Engine, Strategy};
