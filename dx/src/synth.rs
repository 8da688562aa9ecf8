//! Synthesizer
//!
//! Merges analysis reports, or the previous round's context on carry-forward
//! rounds, into one `InterviewResult` through a single gate call, then applies
//! deterministic repairs so the result always has exactly three well-formed
//! questions.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::ProfileArtifact;
use crate::domain::{
    AnalysisOutcome, AnalysisReport, Answer, InferredContext, InterviewResult, JobFailure, MAX_OPTIONS, MIN_OPTIONS,
    QUESTIONS_PER_ROUND, Question, SelectionMode, unique_id,
};
use crate::error::DiscoveryError;
use crate::events::EventEmitter;
use crate::gate::{AnalysisGate, GateOptions, GateRequest, submit_streaming};
use crate::prompts::{PromptLoader, SynthesisContext};

const AGENT: &str = "synthesizer";

/// Id of the synthetic report built from the previous round
pub const CARRIED_CONTEXT_ID: &str = "carried-context";

/// Id of the report built from the cached profile
pub const CACHED_PROFILE_ID: &str = "cached-profile";

/// Options used to pad questions that came back short
const GENERIC_OPTIONS: [&str; 4] = [
    "Not sure yet",
    "Let the team recommend",
    "Depends on cost and effort",
    "Other (describe in your answer)",
];

/// Where the reports for this round come from
#[derive(Debug, Clone, Copy)]
pub enum SynthesisSource<'a> {
    /// Nothing changed; reuse the previous round's result
    CarryForward { prior: &'a InterviewResult },
    /// Outcomes of this round's analysis jobs
    Fresh { outcomes: &'a [AnalysisOutcome] },
}

#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub goal: &'a str,
    pub context: &'a str,
    pub answers: &'a [Answer],
    pub round: u32,
    pub source: SynthesisSource<'a>,
    /// Profile read at round start
    pub cached_profile: Option<&'a ProfileArtifact>,
}

/// Deterministic fallback questions, highest priority first
pub fn fallback_questions() -> Vec<Question> {
    fn question(id: &str, prompt: &str, rationale: &str, selection: SelectionMode, options: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            prompt: prompt.to_string(),
            rationale: rationale.to_string(),
            selection,
            options: options.iter().map(|s| s.to_string()).collect(),
            recommended_option: options[0].to_string(),
        }
    }

    vec![
        question(
            "primary-users",
            "Who are the primary users of the first release?",
            "Every later decision depends on who the product serves first.",
            SelectionMode::Single,
            &["Internal staff", "Business customers", "Individual consumers", "Partners or resellers"],
        ),
        question(
            "success-criteria",
            "What must be true for the first release to count as a success?",
            "Success criteria decide what the draft specification prioritizes.",
            SelectionMode::Multi,
            &[
                "The core workflow works end to end",
                "It ships quickly",
                "The experience is polished",
                "It integrates with existing systems",
                "It is cheap to operate",
            ],
        ),
        question(
            "delivery-constraints",
            "Which constraint is hardest to move on this project?",
            "Hard constraints rule out options before design starts.",
            SelectionMode::Single,
            &[
                "A fixed deadline",
                "A limited budget",
                "Regulatory or compliance rules",
                "Existing technology choices",
            ],
        ),
        question(
            "platform-targets",
            "Where must the product run first?",
            "Target platforms shape architecture and effort.",
            SelectionMode::Multi,
            &["Web browser", "Mobile apps", "Desktop", "API only"],
        ),
    ]
}

/// Report built from the previous round's inferred context
pub fn carried_report(prior: &InterviewResult) -> AnalysisReport {
    let ctx = &prior.inferred_context;
    AnalysisReport {
        summary: prior.direction_summary.clone(),
        findings: Vec::new(),
        signals: ctx.signals.clone(),
        pain_points: ctx.pain_points.clone(),
        constraints: ctx.constraints.clone(),
        scope_hints: ctx.scope.clone(),
        stack_hints: ctx.stack.clone(),
        documentation_hints: ctx.documentation.clone(),
        open_questions: prior.missing_critical_info.clone(),
        confidence: prior.readiness_score,
    }
}

/// Render one report as a uniform markdown block
pub fn format_report_block(id: &str, title: &str, report: &AnalysisReport) -> String {
    let mut block = String::new();
    let _ = writeln!(block, "### {} ({})", title, id);
    let _ = writeln!(block, "Confidence: {}/100", report.confidence);
    let _ = writeln!(block, "Summary: {}", report.summary);

    let sections: [(&str, &[String]); 8] = [
        ("Findings", &report.findings),
        ("Signals", &report.signals),
        ("Pain points", &report.pain_points),
        ("Constraints", &report.constraints),
        ("Scope hints", &report.scope_hints),
        ("Stack hints", &report.stack_hints),
        ("Documentation hints", &report.documentation_hints),
        ("Open questions", &report.open_questions),
    ];
    for (heading, items) in sections {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(block, "{}:", heading);
        for item in items {
            let _ = writeln!(block, "- {}", item);
        }
    }
    block.trim_end().to_string()
}

/// Report blocks and failure lines for the merge prompt
pub fn build_blocks(input: &SynthesisInput<'_>) -> (Vec<String>, Vec<String>) {
    let mut blocks = Vec::new();
    let mut failures = Vec::new();
    let mut profile_refreshed = false;

    match input.source {
        SynthesisSource::CarryForward { prior } => {
            blocks.push(format_report_block(
                CARRIED_CONTEXT_ID,
                "Carried Context",
                &carried_report(prior),
            ));
        }
        SynthesisSource::Fresh { outcomes } => {
            for outcome in outcomes {
                match outcome {
                    AnalysisOutcome::Success { job, report } => {
                        profile_refreshed |= job.produces_profile_artifact;
                        blocks.push(format_report_block(&job.id, &job.title, report));
                    }
                    AnalysisOutcome::Failure { failure, .. } => failures.push(failure.to_string()),
                }
            }
        }
    }

    if !profile_refreshed && let Some(profile) = input.cached_profile {
        blocks.push(format_report_block(
            CACHED_PROFILE_ID,
            "Cached Project Profile",
            &profile.to_report(),
        ));
    }

    (blocks, failures)
}

fn same_text(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Dedupe, bound to 4-5 options, and make the recommendation one of them
pub fn repair_options(question: &mut Question) {
    let mut options: Vec<String> = Vec::new();
    for option in question.options.drain(..) {
        let option = option.trim().to_string();
        if !option.is_empty() && !options.iter().any(|o| same_text(o, &option)) {
            options.push(option);
        }
    }

    let recommended = options.iter().position(|o| same_text(o, &question.recommended_option));
    if let Some(idx) = recommended
        && idx >= MAX_OPTIONS
    {
        let keep = options.remove(idx);
        options.insert(MAX_OPTIONS - 1, keep);
    }
    options.truncate(MAX_OPTIONS);

    for generic in GENERIC_OPTIONS {
        if options.len() >= MIN_OPTIONS {
            break;
        }
        if !options.iter().any(|o| same_text(o, generic)) {
            options.push(generic.to_string());
        }
    }

    question.recommended_option = match recommended {
        Some(idx) => options[idx.min(MAX_OPTIONS - 1)].clone(),
        None => options[0].clone(),
    };
    question.options = options;
}

/// Exactly `QUESTIONS_PER_ROUND` questions, each with repaired options
pub fn fix_questions(questions: Vec<Question>) -> Vec<Question> {
    debug!(count = questions.len(), "fix_questions: called");
    let mut used = HashSet::new();
    let mut fixed: Vec<Question> = Vec::with_capacity(QUESTIONS_PER_ROUND);

    for (n, mut question) in questions.into_iter().enumerate() {
        if fixed.len() == QUESTIONS_PER_ROUND {
            break;
        }
        if question.prompt.trim().is_empty() {
            debug!(n, "fix_questions: dropping question without prompt");
            continue;
        }
        let base = match question.id.trim() {
            "" => format!("question-{}", n + 1),
            id => id.to_string(),
        };
        question.id = unique_id(&base, &mut used);
        fixed.push(question);
    }

    for fallback in fallback_questions() {
        if fixed.len() == QUESTIONS_PER_ROUND {
            break;
        }
        if used.insert(fallback.id.clone()) {
            debug!(id = %fallback.id, "fix_questions: appending fallback");
            fixed.push(fallback);
        }
    }

    for question in fixed.iter_mut() {
        repair_options(question);
    }
    fixed
}

/// Apply every deterministic repair to the merge call's result
pub fn finalize_result(
    mut result: InterviewResult,
    failures: &[JobFailure],
    carried: Option<&InferredContext>,
) -> InterviewResult {
    result.questions = fix_questions(result.questions);

    if let Some(context) = carried {
        result.inferred_context = context.clone();
    }

    for failure in failures {
        let mentioned = result
            .missing_critical_info
            .iter()
            .any(|item| item.contains(&failure.job_id));
        if !mentioned {
            result.missing_critical_info.push(format!(
                "Analysis '{}' produced no evidence ({} attempt(s): {})",
                failure.job_id, failure.attempts, failure.last_error
            ));
        }
    }

    result
}

/// Runs the merge call
pub struct Synthesizer {
    gate: Arc<dyn AnalysisGate>,
    emitter: EventEmitter,
    options: GateOptions,
    timeout: Duration,
}

impl Synthesizer {
    pub fn new(gate: Arc<dyn AnalysisGate>, emitter: EventEmitter, options: GateOptions, timeout: Duration) -> Self {
        Self {
            gate,
            emitter,
            options,
            timeout,
        }
    }

    pub async fn synthesize(
        &self,
        prompts: &PromptLoader,
        input: SynthesisInput<'_>,
    ) -> Result<InterviewResult, DiscoveryError> {
        let carried_forward = matches!(input.source, SynthesisSource::CarryForward { .. });
        debug!(round = input.round, carried_forward, "Synthesizer::synthesize: called");
        self.emitter.status(if carried_forward {
            "Synthesizing from carried-forward context"
        } else {
            "Synthesizing analysis reports"
        });

        let (report_blocks, failure_lines) = build_blocks(&input);
        let prompt = prompts
            .synthesis(&SynthesisContext {
                goal: input.goal.to_string(),
                context: input.context.to_string(),
                answers: input.answers.to_vec(),
                round: input.round,
                carried_forward,
                report_blocks,
                failures: failure_lines,
                question_count: QUESTIONS_PER_ROUND,
                min_options: MIN_OPTIONS,
                max_options: MAX_OPTIONS,
            })
            .map_err(|e| DiscoveryError::Prompt(e.to_string()))?;

        let request = GateRequest {
            prompt,
            output_shape: InterviewResult::output_shape(),
            options: self.options.clone(),
        };
        let call = submit_streaming(self.gate.as_ref(), request, &self.emitter, AGENT);
        let value = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => return Err(self.fail(e.to_string())),
            Err(_) => return Err(self.fail(format!("timed out after {:?}", self.timeout))),
        };

        let raw = InterviewResult::from_value(value).map_err(|e| self.fail(e))?;
        if raw.questions.len() != QUESTIONS_PER_ROUND {
            info!(returned = raw.questions.len(), "Merge call returned wrong question count, repairing");
        }

        let (failures, carried): (Vec<JobFailure>, Option<&InferredContext>) = match input.source {
            SynthesisSource::CarryForward { prior } => (Vec::new(), Some(&prior.inferred_context)),
            SynthesisSource::Fresh { outcomes } => (
                outcomes.iter().filter_map(|o| o.failure().cloned()).collect(),
                None,
            ),
        };

        let result = finalize_result(raw, &failures, carried);
        self.emitter
            .status(&format!("Synthesis complete (readiness {})", result.readiness_score));
        Ok(result)
    }

    fn fail(&self, message: String) -> DiscoveryError {
        warn!(error = %message, "Synthesizer: merge call failed");
        self.emitter.error("Synthesis failed", &message);
        DiscoveryError::Synthesis(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SpecialistJob;

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            prompt: format!("{}?", id),
            rationale: String::new(),
            selection: SelectionMode::Single,
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            recommended_option: "b".to_string(),
        }
    }

    fn ids(questions: &[Question]) -> Vec<&str> {
        questions.iter().map(|q| q.id.as_str()).collect()
    }

    #[test]
    fn test_more_than_three_keeps_first_three() {
        let fixed = fix_questions(vec![question("q1"), question("q2"), question("q3"), question("q4"), question("q5")]);
        assert_eq!(ids(&fixed), vec!["q1", "q2", "q3"]);
    }

    #[test]
    fn test_fewer_than_three_appends_fallbacks_in_order() {
        let fixed = fix_questions(vec![question("q1")]);
        assert_eq!(ids(&fixed), vec!["q1", "primary-users", "success-criteria"]);
    }

    #[test]
    fn test_fallback_skips_colliding_id() {
        let fixed = fix_questions(vec![question("primary-users")]);
        assert_eq!(ids(&fixed), vec!["primary-users", "success-criteria", "delivery-constraints"]);
    }

    #[test]
    fn test_exactly_three_unchanged() {
        let input = vec![question("q1"), question("q2"), question("q3")];
        assert_eq!(fix_questions(input.clone()), input);
    }

    #[test]
    fn test_blank_ids_assigned_and_duplicates_suffixed() {
        let mut blank = question("");
        blank.id = "  ".to_string();
        let fixed = fix_questions(vec![blank, question("dup"), question("dup")]);
        assert_eq!(ids(&fixed), vec!["question-1", "dup", "dup-2"]);
    }

    #[test]
    fn test_repair_options_pads_and_fixes_recommendation() {
        let mut q = question("q");
        q.options = vec!["Web".into(), "web ".into(), "".into(), "Mobile".into()];
        q.recommended_option = "Desktop".to_string();

        repair_options(&mut q);

        assert_eq!(q.options.len(), MIN_OPTIONS);
        assert_eq!(&q.options[..2], &["Web".to_string(), "Mobile".to_string()]);
        assert_eq!(q.recommended_option, "Web");
    }

    #[test]
    fn test_repair_options_truncates_but_keeps_recommended() {
        let mut q = question("q");
        q.options = (1..=7).map(|i| format!("opt{}", i)).collect();
        q.recommended_option = "OPT7".to_string();

        repair_options(&mut q);

        assert_eq!(q.options.len(), MAX_OPTIONS);
        assert!(q.options.contains(&q.recommended_option));
        assert_eq!(q.recommended_option, "opt7");
    }

    #[test]
    fn test_fallback_questions_are_valid() {
        for q in fallback_questions() {
            assert!((MIN_OPTIONS..=MAX_OPTIONS).contains(&q.options.len()), "{}", q.id);
            assert!(q.options.contains(&q.recommended_option));
        }
    }

    fn result_with(questions: Vec<Question>) -> InterviewResult {
        InterviewResult {
            direction_summary: "d".to_string(),
            inferred_context: InferredContext {
                stack: vec!["merged".to_string()],
                ..Default::default()
            },
            questions,
            draft_specification: String::new(),
            readiness_score: 50,
            missing_critical_info: vec!["Pricing model (see api-survey)".to_string()],
        }
    }

    #[test]
    fn test_finalize_mentions_failed_jobs_once() {
        let failures = vec![
            JobFailure {
                job_id: "api-survey".to_string(),
                attempts: 2,
                last_error: "x".to_string(),
            },
            JobFailure {
                job_id: "risk-assessment".to_string(),
                attempts: 2,
                last_error: "y".to_string(),
            },
        ];

        let result = finalize_result(result_with(vec![]), &failures, None);

        assert_eq!(result.questions.len(), 3);
        assert_eq!(result.missing_critical_info.len(), 2);
        assert!(result.missing_critical_info[1].contains("risk-assessment"));
    }

    #[test]
    fn test_finalize_restores_carried_context() {
        let prior = InferredContext {
            stack: vec!["rust".to_string()],
            scope: vec!["mvp".to_string()],
            ..Default::default()
        };
        let result = finalize_result(result_with(vec![]), &[], Some(&prior));
        assert_eq!(result.inferred_context, prior);
    }

    #[test]
    fn test_build_blocks_fresh_includes_profile_unless_refreshed() {
        let report = AnalysisReport::from_value(serde_json::json!({"summary": "s", "confidence": 50})).unwrap();
        let profile = ProfileArtifact::from_report(&report);
        let plain = SpecialistJob::new("a", "A", "o");
        let outcomes = vec![AnalysisOutcome::Success {
            job: plain,
            report: report.clone(),
        }];

        let input = SynthesisInput {
            goal: "g",
            context: "",
            answers: &[],
            round: 1,
            source: SynthesisSource::Fresh { outcomes: &outcomes },
            cached_profile: Some(&profile),
        };
        let (blocks, failures) = build_blocks(&input);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[1].contains(CACHED_PROFILE_ID));
        assert!(failures.is_empty());

        let refreshed = vec![AnalysisOutcome::Success {
            job: SpecialistJob::stack_analysis(),
            report,
        }];
        let input = SynthesisInput {
            source: SynthesisSource::Fresh { outcomes: &refreshed },
            ..input
        };
        assert_eq!(build_blocks(&input).0.len(), 1);
    }

    #[test]
    fn test_format_report_block_skips_empty_sections() {
        let report = AnalysisReport::from_value(serde_json::json!({
            "summary": "Uses Rails",
            "stackHints": ["ruby", "rails"],
            "confidence": 80
        }))
        .unwrap();

        let block = format_report_block("stack-analysis", "Stack Analysis", &report);
        assert!(block.starts_with("### Stack Analysis (stack-analysis)"));
        assert!(block.contains("Stack hints:\n- ruby\n- rails"));
        assert!(!block.contains("Findings"));
    }
}
