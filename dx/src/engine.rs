//! Discovery engine
//!
//! Coordinates one round: change detection, profile cache read, job planning,
//! parallel analysis, synthesis, and the session update. The engine never
//! persists sessions; it hands back the advanced session for the caller to
//! save.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{ProfileArtifact, ProfileStore};
use crate::config::DiscoveryConfig;
use crate::domain::{Answer, DiscoverySession, InterviewResult, JobFailure, SpecialistJob};
use crate::error::DiscoveryError;
use crate::events::EventEmitter;
use crate::executor::{AnalysisExecutor, PreparedJob, RetryPolicy, ensure_any_success};
use crate::gate::{AnalysisGate, GateOptions};
use crate::planner::JobPlanner;
use crate::prompts::{AnalysisContext, PlannerContext, PromptLoader};
use crate::signals::{ChangeDetector, ChangeSignals};
use crate::synth::{SynthesisInput, SynthesisSource, Synthesizer};

/// Input for one round
#[derive(Debug, Clone, Default)]
pub struct RoundRequest {
    /// Free text added this round
    pub context: Option<String>,
    /// Answers to the previous round's questions
    pub answers: Vec<Answer>,
}

/// Everything a successful round produced
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    /// The session advanced by this round
    pub session: DiscoverySession,
    pub result: InterviewResult,
    /// Jobs that ran; empty when the round carried context forward
    pub jobs: Vec<SpecialistJob>,
    pub failures: Vec<JobFailure>,
    pub signals: ChangeSignals,
    pub carried_forward: bool,
    /// A job rewrote the cached profile
    pub profile_refreshed: bool,
}

pub struct DiscoveryEngine {
    gate: Arc<dyn AnalysisGate>,
    profiles: Arc<dyn ProfileStore>,
    prompts: PromptLoader,
    settings: DiscoveryConfig,
    options: GateOptions,
    detector: ChangeDetector,
}

impl DiscoveryEngine {
    pub fn new(
        gate: Arc<dyn AnalysisGate>,
        profiles: Arc<dyn ProfileStore>,
        prompts: PromptLoader,
        settings: DiscoveryConfig,
    ) -> Result<Self, DiscoveryError> {
        debug!(?settings, "DiscoveryEngine::new: called");
        settings.validate().map_err(|e| DiscoveryError::Config(e.to_string()))?;
        let detector = ChangeDetector::new(settings.signal_window).map_err(|e| DiscoveryError::Config(e.to_string()))?;
        let options = GateOptions {
            max_steps: settings.max_steps,
            ..Default::default()
        };

        Ok(Self {
            gate,
            profiles,
            prompts,
            settings,
            options,
            detector,
        })
    }

    /// Forward a model override and project directory to every call
    pub fn with_gate_options(mut self, options: GateOptions) -> Self {
        self.options = options;
        self
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.job_timeout_secs)
    }

    /// Run one round against `session`
    ///
    /// On error the caller's session is untouched and nothing is returned to
    /// persist.
    pub async fn run_round(
        &self,
        session: &DiscoverySession,
        request: RoundRequest,
        emitter: &EventEmitter,
    ) -> Result<RoundOutcome, DiscoveryError> {
        let round = session.round + 1;
        debug!(session_id = %session.session_id, round, "DiscoveryEngine::run_round: called");
        emitter.round_started(round, &session.goal);

        match self.execute(session, request, emitter, round).await {
            Ok(outcome) => {
                info!(
                    session_id = %session.session_id,
                    round,
                    readiness = outcome.result.readiness_score,
                    carried_forward = outcome.carried_forward,
                    "Round completed"
                );
                emitter.round_completed(round, true);
                Ok(outcome)
            }
            Err(e) => {
                warn!(session_id = %session.session_id, round, error = %e, "Round failed");
                emitter.error("Round failed", &e.to_string());
                emitter.round_completed(round, false);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        session: &DiscoverySession,
        request: RoundRequest,
        emitter: &EventEmitter,
        round: u32,
    ) -> Result<RoundOutcome, DiscoveryError> {
        let answer_texts: Vec<&str> = request.answers.iter().map(|a| a.answer.as_str()).collect();
        let signals = self.detector.detect(request.context.as_deref(), &answer_texts);

        let cached = self.profiles.read(&session.project_id);
        let refresh_needed = cached.is_none() || signals.stack_changed;
        debug!(?signals, cached = cached.is_some(), refresh_needed, "execute: round inputs");
        if signals.any() {
            emitter.status(&format!(
                "Change detected (stack: {}, scope: {})",
                signals.stack_changed, signals.scope_changed
            ));
        }

        let context = session.context_with(request.context.as_deref());
        let mut answers = session.answers.clone();
        answers.extend(request.answers.iter().cloned());

        let synthesizer = Synthesizer::new(self.gate.clone(), emitter.clone(), self.options.clone(), self.timeout());

        let carry_forward = (!refresh_needed && !signals.any())
            .then_some(session.last_result.as_ref())
            .flatten();

        let (result, jobs, failures, profile_refreshed) = match carry_forward {
            Some(prior) => {
                info!(session_id = %session.session_id, "No change detected, carrying context forward");
                emitter.status("No change detected; carrying the previous context forward");
                let result = synthesizer
                    .synthesize(
                        &self.prompts,
                        SynthesisInput {
                            goal: &session.goal,
                            context: &context,
                            answers: &answers,
                            round,
                            source: SynthesisSource::CarryForward { prior },
                            cached_profile: cached.as_ref(),
                        },
                    )
                    .await?;
                (result, Vec::new(), Vec::new(), false)
            }
            None => {
                let planner_prompt = self
                    .prompts
                    .planner(&PlannerContext {
                        goal: session.goal.clone(),
                        context: context.clone(),
                        answers: answers.clone(),
                        round,
                        profile_summary: cached.as_ref().map(|p| p.summary.clone()),
                        profile_hints: cached.as_ref().map(|p| p.hints.clone()).unwrap_or_default(),
                        refresh_needed,
                        stack_changed: signals.stack_changed,
                        scope_changed: signals.scope_changed,
                        min_jobs: self.settings.min_jobs,
                        max_jobs: self.settings.max_jobs,
                    })
                    .map_err(|e| DiscoveryError::Prompt(e.to_string()))?;

                let planner = JobPlanner::new(
                    self.gate.clone(),
                    emitter.clone(),
                    self.options.clone(),
                    self.settings.min_jobs,
                    self.settings.max_jobs,
                    self.timeout(),
                );
                let plan = planner.plan(planner_prompt, refresh_needed).await;

                let prepared = plan
                    .jobs
                    .iter()
                    .map(|job| {
                        let prompt = self
                            .prompts
                            .analysis(&AnalysisContext {
                                goal: session.goal.clone(),
                                context: context.clone(),
                                answers: answers.clone(),
                                round,
                                job_title: job.title.clone(),
                                job_objective: job.objective.clone(),
                                produces_profile: job.produces_profile_artifact,
                                profile_summary: cached.as_ref().map(|p| p.summary.clone()),
                            })
                            .map_err(|e| DiscoveryError::Prompt(e.to_string()))?;
                        Ok(PreparedJob {
                            job: job.clone(),
                            prompt,
                        })
                    })
                    .collect::<Result<Vec<_>, DiscoveryError>>()?;

                let executor = AnalysisExecutor::new(
                    self.gate.clone(),
                    emitter.clone(),
                    self.options.clone(),
                    RetryPolicy {
                        max_attempts: self.settings.max_attempts,
                        attempt_timeout: self.timeout(),
                        retry_delay: Duration::from_millis(self.settings.retry_delay_ms),
                    },
                );
                let outcomes = executor.run(prepared).await;
                ensure_any_success(&outcomes)?;

                let refreshed = outcomes
                    .iter()
                    .filter(|o| o.job().produces_profile_artifact)
                    .find_map(|o| o.report());
                if let Some(report) = refreshed {
                    debug!(project_id = %session.project_id, "execute: writing refreshed profile");
                    self.profiles
                        .write(&session.project_id, &ProfileArtifact::from_report(report));
                    emitter.status("Project profile refreshed");
                }

                let result = synthesizer
                    .synthesize(
                        &self.prompts,
                        SynthesisInput {
                            goal: &session.goal,
                            context: &context,
                            answers: &answers,
                            round,
                            source: SynthesisSource::Fresh { outcomes: &outcomes },
                            cached_profile: cached.as_ref(),
                        },
                    )
                    .await?;

                let failures: Vec<JobFailure> = outcomes.iter().filter_map(|o| o.failure().cloned()).collect();
                (result, plan.jobs, failures, refreshed.is_some())
            }
        };

        let mut next = session.clone();
        next.advance(request.context.as_deref(), request.answers, result.clone());

        Ok(RoundOutcome {
            session: next,
            result,
            jobs,
            failures,
            signals,
            carried_forward: carry_forward.is_some(),
            profile_refreshed,
        })
    }
}
