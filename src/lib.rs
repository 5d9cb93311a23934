//! Autotelos: a self-directed improvement loop
//!
//! Agents reflect on what to learn, practice it against real tests, and
//! crystallize what worked into principles. This crate wires the workspace
//! crates into one process.

pub mod config;
pub mod stack;

pub use config::{AutotelosConfig, IntervalConfig, LlmConfig};
pub use stack::AgentStack;
