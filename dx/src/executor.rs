//! Parallel analysis executor
//!
//! Every job runs concurrently on the calling task through `join_all`, so
//! dropping the round future cancels all outstanding calls. Attempts within a
//! job are sequential; jobs never wait on each other.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::domain::{AnalysisOutcome, AnalysisReport, JobFailure, SpecialistJob};
use crate::error::DiscoveryError;
use crate::events::EventEmitter;
use crate::gate::{AnalysisGate, GateError, GateOptions, GateRequest, submit_streaming};

/// Retry and timeout policy for analysis jobs
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per job, first try included
    pub max_attempts: u32,
    /// Limit on each attempt
    pub attempt_timeout: Duration,
    /// Pause before a retry
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            attempt_timeout: Duration::from_secs(180),
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// A job together with its rendered prompt
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub job: SpecialistJob,
    pub prompt: String,
}

pub struct AnalysisExecutor {
    gate: Arc<dyn AnalysisGate>,
    emitter: EventEmitter,
    options: GateOptions,
    policy: RetryPolicy,
}

impl AnalysisExecutor {
    pub fn new(gate: Arc<dyn AnalysisGate>, emitter: EventEmitter, options: GateOptions, policy: RetryPolicy) -> Self {
        Self {
            gate,
            emitter,
            options,
            policy,
        }
    }

    /// Run every job; one outcome per job, in input order
    pub async fn run(&self, jobs: Vec<PreparedJob>) -> Vec<AnalysisOutcome> {
        debug!(count = jobs.len(), "AnalysisExecutor::run: called");
        self.emitter
            .status(&format!("Running {} analysis jobs in parallel", jobs.len()));

        let outcomes = join_all(jobs.into_iter().map(|prepared| self.run_job(prepared))).await;

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(succeeded, failed = outcomes.len() - succeeded, "Analysis jobs finished");
        outcomes
    }

    async fn run_job(&self, prepared: PreparedJob) -> AnalysisOutcome {
        let PreparedJob { job, prompt } = prepared;
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.policy.retry_delay).await;
                self.emitter
                    .agent(&job.id, &format!("Retrying (attempt {}/{})", attempt, attempts));
            } else {
                self.emitter.agent(&job.id, &format!("Started: {}", job.title));
            }

            match self.attempt(&job, &prompt).await {
                Ok(report) => {
                    debug!(job_id = %job.id, attempt, confidence = report.confidence, "run_job: success");
                    self.emitter.agent(
                        &job.id,
                        &format!("Completed (confidence {})", report.confidence),
                    );
                    return AnalysisOutcome::Success { job, report };
                }
                Err(e) => {
                    warn!(job_id = %job.id, attempt, error = %e, "run_job: attempt failed");
                    last_error = e.to_string();
                    self.emitter.agent_error(
                        &job.id,
                        &format!("Attempt {}/{} failed", attempt, attempts),
                        &last_error,
                    );
                }
            }
        }

        let failure = JobFailure {
            job_id: job.id.clone(),
            attempts,
            last_error,
        };
        self.emitter.agent_error(&job.id, "Failed", &failure.to_string());
        AnalysisOutcome::Failure { job, failure }
    }

    async fn attempt(&self, job: &SpecialistJob, prompt: &str) -> Result<AnalysisReport, GateError> {
        let request = GateRequest {
            prompt: prompt.to_string(),
            output_shape: AnalysisReport::output_shape(),
            options: self.options.clone(),
        };

        let call = submit_streaming(self.gate.as_ref(), request, &self.emitter, &job.id);
        let value = tokio::time::timeout(self.policy.attempt_timeout, call)
            .await
            .map_err(|_| GateError::Timeout(self.policy.attempt_timeout))??;

        AnalysisReport::from_value(value).map_err(GateError::InvalidOutput)
    }
}

/// Fail the round when no job succeeded
pub fn ensure_any_success(outcomes: &[AnalysisOutcome]) -> Result<(), DiscoveryError> {
    if outcomes.iter().any(AnalysisOutcome::is_success) {
        return Ok(());
    }
    Err(DiscoveryError::AllJobsFailed {
        failures: outcomes.iter().filter_map(|o| o.failure().cloned()).collect(),
    })
}
