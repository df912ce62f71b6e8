//! Multi-phase workflow engine for Cadence.
//!
//! A [`Workflow`] runs a fixed sequence of [`Phase`]s. Each phase holds one
//! bounded agent conversation in a brand-new session and hands forward only
//! the data it extracts. The workflow merges that data into an accumulator,
//! gives every later phase its own copy, and stops at the first failure.

pub mod context;
pub mod phase;
pub mod prompts;
pub mod result;
pub mod template;
pub mod workflow;

#[cfg(test)]
mod test_helpers;

pub use context::{PhaseContext, ProgressCallback};
pub use phase::{Phase, PhaseFailure, PhaseOutput, run_phase};
pub use prompts::{PromptsManager, render};
pub use result::{PhaseResult, PhaseStatus, WorkflowResult};
pub use template::{ConfiguredWorkflow, TemplatePhase};
pub use workflow::Workflow;
