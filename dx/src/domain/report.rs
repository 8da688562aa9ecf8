//! Analysis reports and per-job outcomes

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::job::SpecialistJob;

/// Validated output of one analysis job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub summary: String,
    pub findings: Vec<String>,
    pub signals: Vec<String>,
    pub pain_points: Vec<String>,
    pub constraints: Vec<String>,
    pub scope_hints: Vec<String>,
    pub stack_hints: Vec<String>,
    pub documentation_hints: Vec<String>,
    pub open_questions: Vec<String>,
    /// Always 0-100 once validated
    pub confidence: u8,
}

/// Lenient wire form; the model may use either key style and either confidence scale
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReport {
    summary: String,
    #[serde(default)]
    findings: Vec<String>,
    #[serde(default)]
    signals: Vec<String>,
    #[serde(default, alias = "pain_points")]
    pain_points: Vec<String>,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default, alias = "scope_hints")]
    scope_hints: Vec<String>,
    #[serde(default, alias = "stack_hints")]
    stack_hints: Vec<String>,
    #[serde(default, alias = "documentation_hints")]
    documentation_hints: Vec<String>,
    #[serde(default, alias = "open_questions")]
    open_questions: Vec<String>,
    confidence: f64,
}

impl AnalysisReport {
    /// JSON schema the analysis call must satisfy
    pub fn output_shape() -> Value {
        let list = json!({"type": "array", "items": {"type": "string"}});
        json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string"},
                "findings": list,
                "signals": list,
                "painPoints": list,
                "constraints": list,
                "scopeHints": list,
                "stackHints": list,
                "documentationHints": list,
                "openQuestions": list,
                "confidence": {"type": "number", "minimum": 0, "maximum": 100}
            },
            "required": ["summary", "confidence"]
        })
    }

    /// Validate structured output into a report
    pub fn from_value(value: Value) -> Result<Self, String> {
        debug!("AnalysisReport::from_value: called");
        let raw: RawReport = serde_json::from_value(value).map_err(|e| format!("report failed validation: {}", e))?;

        if raw.summary.trim().is_empty() {
            return Err("report failed validation: empty summary".to_string());
        }

        Ok(Self {
            summary: raw.summary.trim().to_string(),
            findings: clean(raw.findings),
            signals: clean(raw.signals),
            pain_points: clean(raw.pain_points),
            constraints: clean(raw.constraints),
            scope_hints: clean(raw.scope_hints),
            stack_hints: clean(raw.stack_hints),
            documentation_hints: clean(raw.documentation_hints),
            open_questions: clean(raw.open_questions),
            confidence: normalize_confidence(raw.confidence),
        })
    }
}

/// Map a 0-1 or 0-100 confidence onto 0-100
pub fn normalize_confidence(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    let scaled = if (0.0..=1.0).contains(&value) { value * 100.0 } else { value };
    scaled.round().clamp(0.0, 100.0) as u8
}

fn clean(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Terminal failure of one job after all attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub job_id: String,
    pub attempts: u32,
    pub last_error: String,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed after {} attempt(s): {}",
            self.job_id, self.attempts, self.last_error
        )
    }
}

/// Exactly one per planned job
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Success { job: SpecialistJob, report: AnalysisReport },
    Failure { job: SpecialistJob, failure: JobFailure },
}

impl AnalysisOutcome {
    pub fn job(&self) -> &SpecialistJob {
        match self {
            AnalysisOutcome::Success { job, .. } | AnalysisOutcome::Failure { job, .. } => job,
        }
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Success { report, .. } => Some(report),
            AnalysisOutcome::Failure { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match self {
            AnalysisOutcome::Success { .. } => None,
            AnalysisOutcome::Failure { failure, .. } => Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success { .. })
    }
}
