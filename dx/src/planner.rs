//! Job planner
//!
//! One gate call proposes the round's analysis jobs; deterministic
//! post-processing then enforces id uniqueness, the single profile job, and
//! the job count bounds. A planner failure never fails the round: it falls
//! back to a static plan.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::domain::{SpecialistJob, slugify_id, unique_id};
use crate::events::EventEmitter;
use crate::gate::{AnalysisGate, GateOptions, GateRequest, submit_streaming};

const AGENT: &str = "planner";

const GENERIC_OBJECTIVE: &str = "Gather any further evidence that would sharpen the next interview questions.";

/// A job as proposed by the planning call, before post-processing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedJob {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub objective: String,
    #[serde(default, alias = "produces_profile_artifact")]
    pub produces_profile_artifact: bool,
}

#[derive(Debug, Deserialize)]
struct ProposedPlan {
    #[serde(default)]
    jobs: Vec<ProposedJob>,
}

/// The planner's decision for one round
#[derive(Debug, Clone)]
pub struct JobPlan {
    pub jobs: Vec<SpecialistJob>,
    pub refresh_needed: bool,
    /// The static plan was used because the planning call failed
    pub from_fallback: bool,
}

/// Non-profile jobs used to pad short plans, in priority order
pub fn fallback_jobs() -> Vec<SpecialistJob> {
    vec![
        SpecialistJob::new(
            "requirements-review",
            "Requirements Review",
            "Extract the functional requirements, user roles and success criteria implied by the goal and answers so far.",
        ),
        SpecialistJob::new(
            "risk-assessment",
            "Risk Assessment",
            "Identify delivery risks, hard constraints and unknowns that would block a confident specification.",
        ),
        SpecialistJob::new(
            "user-journeys",
            "User Journeys",
            "Outline the main end-to-end journeys the product must support and where they are still ambiguous.",
        ),
        SpecialistJob::new(
            "integration-survey",
            "Integration Survey",
            "List the external systems, data sources and APIs the product must talk to.",
        ),
    ]
}

/// JSON schema for the planning call's output
pub fn plan_output_shape(max_jobs: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "jobs": {
                "type": "array",
                "maxItems": max_jobs,
                "items": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "title": {"type": "string"},
                        "objective": {"type": "string"},
                        "producesProfileArtifact": {"type": "boolean"}
                    },
                    "required": ["id", "title", "objective"]
                }
            }
        },
        "required": ["jobs"]
    })
}

/// Accept `{"jobs": [...]}` or a bare array
fn parse_proposals(value: Value) -> Result<Vec<ProposedJob>, String> {
    let parsed = if value.is_array() {
        serde_json::from_value::<Vec<ProposedJob>>(value)
    } else {
        serde_json::from_value::<ProposedPlan>(value).map(|p| p.jobs)
    };
    parsed.map_err(|e| format!("plan failed validation: {}", e))
}

fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn pad_to_min(jobs: &mut Vec<SpecialistJob>, min_jobs: usize) {
    let mut used: HashSet<String> = jobs.iter().map(|j| j.id.clone()).collect();
    for job in fallback_jobs() {
        if jobs.len() >= min_jobs {
            return;
        }
        if used.insert(job.id.clone()) {
            jobs.push(job);
        }
    }
    while jobs.len() < min_jobs {
        let id = unique_id("additional-analysis", &mut used);
        jobs.push(SpecialistJob::new(id, "Additional Analysis", GENERIC_OBJECTIVE));
    }
}

/// Turn proposals into a valid plan
///
/// The result has between `min_jobs` and `max_jobs` entries with unique ids,
/// and exactly one profile job when `refresh_needed`, none otherwise.
pub fn finalize_plan(
    proposed: Vec<ProposedJob>,
    refresh_needed: bool,
    min_jobs: usize,
    max_jobs: usize,
) -> Vec<SpecialistJob> {
    debug!(proposed = proposed.len(), refresh_needed, min_jobs, max_jobs, "finalize_plan: called");
    let mut used = HashSet::new();
    let mut jobs = Vec::with_capacity(proposed.len());

    for p in proposed {
        let base = match slugify_id(&p.id) {
            id if id.is_empty() => slugify_id(&p.title),
            id => id,
        };
        if base.is_empty() && p.objective.trim().is_empty() {
            debug!("finalize_plan: dropping empty proposal");
            continue;
        }
        let base = if base.is_empty() { "analysis".to_string() } else { base };
        let id = unique_id(&base, &mut used);
        let title = non_blank(p.title).unwrap_or_else(|| id.clone());
        let objective = non_blank(p.objective).unwrap_or_else(|| id.clone());

        jobs.push(SpecialistJob {
            id,
            title,
            objective,
            produces_profile_artifact: refresh_needed && p.produces_profile_artifact,
        });
    }

    // Only the first flagged job keeps its flag
    let mut flagged = false;
    for job in jobs.iter_mut() {
        if job.produces_profile_artifact {
            job.produces_profile_artifact = !flagged;
            flagged = true;
        }
    }

    if jobs.len() > max_jobs {
        match jobs.iter().position(|j| j.produces_profile_artifact) {
            Some(pos) if pos >= max_jobs => {
                let profile_job = jobs.remove(pos);
                jobs.truncate(max_jobs.saturating_sub(1));
                jobs.push(profile_job);
            }
            _ => jobs.truncate(max_jobs),
        }
    }

    if refresh_needed && !jobs.iter().any(|j| j.produces_profile_artifact) {
        if jobs.len() >= max_jobs {
            jobs.pop();
        }
        let mut used: HashSet<String> = jobs.iter().map(|j| j.id.clone()).collect();
        let mut canonical = SpecialistJob::stack_analysis();
        canonical.id = unique_id(&canonical.id, &mut used);
        debug!(id = %canonical.id, "finalize_plan: injecting profile job");
        jobs.push(canonical);
    }

    pad_to_min(&mut jobs, min_jobs);
    jobs
}

/// Plan used when the planning call fails
pub fn static_plan(refresh_needed: bool, min_jobs: usize, max_jobs: usize) -> Vec<SpecialistJob> {
    debug!(refresh_needed, "static_plan: called");
    let mut jobs = Vec::new();
    if refresh_needed {
        jobs.push(SpecialistJob::stack_analysis());
    }
    jobs.extend(fallback_jobs().into_iter().take(2));
    jobs.truncate(max_jobs);
    pad_to_min(&mut jobs, min_jobs);
    jobs
}

/// Decides the round's job set
pub struct JobPlanner {
    gate: Arc<dyn AnalysisGate>,
    emitter: EventEmitter,
    options: GateOptions,
    min_jobs: usize,
    max_jobs: usize,
    timeout: Duration,
}

impl JobPlanner {
    pub fn new(
        gate: Arc<dyn AnalysisGate>,
        emitter: EventEmitter,
        options: GateOptions,
        min_jobs: usize,
        max_jobs: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            gate,
            emitter,
            options,
            min_jobs,
            max_jobs,
            timeout,
        }
    }

    /// Plan the round from an already rendered planning prompt
    pub async fn plan(&self, prompt: String, refresh_needed: bool) -> JobPlan {
        debug!(refresh_needed, "JobPlanner::plan: called");
        self.emitter.status("Planning analysis jobs");

        let request = GateRequest {
            prompt,
            output_shape: plan_output_shape(self.max_jobs),
            options: self.options.clone(),
        };

        let call = submit_streaming(self.gate.as_ref(), request, &self.emitter, AGENT);
        let proposals = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => parse_proposals(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        };

        let (jobs, from_fallback) = match proposals {
            Ok(proposed) if !proposed.is_empty() => (
                finalize_plan(proposed, refresh_needed, self.min_jobs, self.max_jobs),
                false,
            ),
            Ok(_) => {
                warn!("JobPlanner::plan: planning call proposed no jobs, using static plan");
                self.emitter.log(Some(AGENT), "No jobs proposed; using the static plan");
                (static_plan(refresh_needed, self.min_jobs, self.max_jobs), true)
            }
            Err(e) => {
                warn!(error = %e, "JobPlanner::plan: planning call failed, using static plan");
                self.emitter
                    .log(Some(AGENT), &format!("Planning failed ({}); using the static plan", e));
                (static_plan(refresh_needed, self.min_jobs, self.max_jobs), true)
            }
        };

        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        info!(count = jobs.len(), ?ids, from_fallback, "Planned analysis jobs");
        self.emitter
            .status(&format!("Planned {} analysis jobs: {}", jobs.len(), ids.join(", ")));

        JobPlan {
            jobs,
            refresh_needed,
            from_fallback,
        }
    }
}
