//! The workflow template: run phases in order, accumulate their data,
//! stop at the first failure.

use async_trait::async_trait;
use cadence_core::context::{ContextMap, merge_context};
use cadence_core::error::Result;
use cadence_core::event::DomainEvent;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::context::PhaseContext;
use crate::phase::Phase;
use crate::result::{PhaseResult, PhaseStatus, WorkflowResult};

/// A fixed, ordered sequence of phases with forward-only data flow.
#[async_trait]
pub trait Workflow: Send + Sync {
    fn name(&self) -> &str;

    /// The phases, in execution order.
    fn get_phases(&self) -> Vec<Arc<dyn Phase>>;

    /// Skip `phase` given the data accumulated so far. A skipped phase is
    /// never executed and contributes nothing.
    fn should_skip(&self, _phase: &dyn Phase, _data: &ContextMap) -> bool {
        false
    }

    /// Produce output artifacts once every phase has passed.
    async fn finalize(&self, _context: &PhaseContext, _data: &ContextMap) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    /// Run every phase. `context.previous_phase_data` seeds the accumulator.
    async fn execute(&self, context: PhaseContext) -> WorkflowResult {
        let start = Instant::now();
        let phases = self.get_phases();
        let mut accumulated = context.previous_phase_data.clone();
        let mut phase_results: Vec<PhaseResult> = Vec::with_capacity(phases.len());
        let mut total_tokens: u64 = 0;

        info!(workflow = %self.name(), phases = phases.len(), "Starting workflow");

        for phase in &phases {
            let phase_name = phase.name().to_string();

            if self.should_skip(phase.as_ref(), &accumulated) {
                info!(workflow = %self.name(), phase = %phase_name, "Skipping phase");
                context.report_progress(&phase_name, PhaseStatus::Skipped);
                context.publish(DomainEvent::PhaseFinished {
                    phase: phase_name.clone(),
                    status: PhaseStatus::Skipped.to_string(),
                    execution_time_ms: 0,
                    timestamp: Utc::now(),
                });
                phase_results.push(PhaseResult::skipped(phase_name));
                continue;
            }

            context.publish(DomainEvent::PhaseStarted {
                phase: phase_name.clone(),
                timestamp: Utc::now(),
            });

            let result = phase.execute(context.for_phase(&accumulated)).await;

            context.publish(DomainEvent::PhaseFinished {
                phase: phase_name.clone(),
                status: result.status.to_string(),
                execution_time_ms: (result.execution_time_seconds * 1000.0) as u64,
                timestamp: Utc::now(),
            });

            if !result.success() {
                warn!(
                    workflow = %self.name(),
                    phase = %phase_name,
                    errors = ?result.errors,
                    "Phase did not complete, stopping workflow"
                );
                total_tokens += result.tokens_used;
                phase_results.push(result);
                return finish_run(
                    &context,
                    WorkflowResult {
                        workflow_name: self.name().to_string(),
                        phase_results,
                        total_execution_time_seconds: start.elapsed().as_secs_f64(),
                        total_tokens_used: total_tokens,
                        final_data: accumulated,
                        ..Default::default()
                    },
                );
            }

            merge_context(&mut accumulated, &result.extracted_data);
            total_tokens += result.tokens_used;
            phase_results.push(result);
        }

        let (output_files, errors) = match self.finalize(&context, &accumulated).await {
            Ok(files) => (files, Vec::new()),
            Err(e) => {
                warn!(workflow = %self.name(), error = %e, "Failed to finalize workflow outputs");
                (Vec::new(), vec![e.to_string()])
            }
        };

        finish_run(
            &context,
            WorkflowResult {
                workflow_name: self.name().to_string(),
                phase_results,
                total_execution_time_seconds: start.elapsed().as_secs_f64(),
                total_tokens_used: total_tokens,
                output_files,
                final_data: accumulated,
                errors,
            },
        )
    }
}

fn finish_run(context: &PhaseContext, result: WorkflowResult) -> WorkflowResult {
    info!(
        workflow = %result.workflow_name,
        success = result.success(),
        phases_run = result.phase_results.len(),
        total_tokens = result.total_tokens_used,
        elapsed_s = result.total_execution_time_seconds,
        "Workflow finished"
    );
    context.publish(DomainEvent::WorkflowFinished {
        workflow: result.workflow_name.clone(),
        success: result.success(),
        phases_run: result.phase_results.len(),
        total_tokens: result.total_tokens_used,
        timestamp: Utc::now(),
    });
    result
}
