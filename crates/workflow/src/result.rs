//! Phase and workflow outcomes.

use cadence_core::context::ContextMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::InProgress => "in_progress",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Failed => "failed",
            PhaseStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of running (or skipping) one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_name: String,
    pub status: PhaseStatus,

    /// Final assistant text
    #[serde(default)]
    pub agent_response: String,

    /// Data handed forward to later phases
    #[serde(default)]
    pub extracted_data: ContextMap,

    pub execution_time_seconds: f64,

    #[serde(default)]
    pub tokens_used: u64,

    /// Human-readable failure descriptions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl PhaseResult {
    pub fn completed(
        phase_name: impl Into<String>,
        agent_response: impl Into<String>,
        extracted_data: ContextMap,
        execution_time_seconds: f64,
        tokens_used: u64,
    ) -> Self {
        Self {
            phase_name: phase_name.into(),
            status: PhaseStatus::Completed,
            agent_response: agent_response.into(),
            extracted_data,
            execution_time_seconds,
            tokens_used,
            errors: Vec::new(),
        }
    }

    pub fn failed(
        phase_name: impl Into<String>,
        errors: Vec<String>,
        execution_time_seconds: f64,
    ) -> Self {
        Self {
            phase_name: phase_name.into(),
            status: PhaseStatus::Failed,
            agent_response: String::new(),
            extracted_data: ContextMap::new(),
            execution_time_seconds,
            tokens_used: 0,
            errors,
        }
    }

    /// Record tokens spent by a phase that did not complete.
    pub fn with_tokens(mut self, tokens_used: u64) -> Self {
        self.tokens_used = tokens_used;
        self
    }

    /// A phase the workflow chose not to run.
    pub fn skipped(phase_name: impl Into<String>) -> Self {
        Self {
            phase_name: phase_name.into(),
            status: PhaseStatus::Skipped,
            agent_response: String::new(),
            extracted_data: ContextMap::new(),
            execution_time_seconds: 0.0,
            tokens_used: 0,
            errors: Vec::new(),
        }
    }

    /// `true` only for [`PhaseStatus::Completed`].
    pub fn success(&self) -> bool {
        self.status == PhaseStatus::Completed
    }

    /// Completed or skipped: the pipeline may continue past this phase.
    pub fn passed(&self) -> bool {
        matches!(self.status, PhaseStatus::Completed | PhaseStatus::Skipped)
    }
}

/// The outcome of a workflow run.
///
/// On failure `phase_results` holds exactly the phases that ran, the last one
/// carrying the errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_name: String,

    pub phase_results: Vec<PhaseResult>,

    pub total_execution_time_seconds: f64,

    pub total_tokens_used: u64,

    #[serde(default)]
    pub output_files: Vec<PathBuf>,

    /// Accumulated data after the last phase that ran
    #[serde(default)]
    pub final_data: ContextMap,

    /// Errors raised after the phases, while finalizing outputs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl WorkflowResult {
    /// Every phase completed or was skipped, and finalizing succeeded.
    pub fn success(&self) -> bool {
        self.errors.is_empty() && self.phase_results.iter().all(PhaseResult::passed)
    }

    /// The phase that stopped the run, if any.
    pub fn failed_phase(&self) -> Option<&PhaseResult> {
        self.phase_results
            .iter()
            .find(|r| r.status == PhaseStatus::Failed)
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseResult> {
        self.phase_results.iter().find(|r| r.phase_name == name)
    }
}
