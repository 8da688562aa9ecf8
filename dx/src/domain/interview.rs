//! Interview results returned to the caller each round

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

/// Number of questions every result carries
pub const QUESTIONS_PER_ROUND: usize = 3;

/// Fewest options a question may offer
pub const MIN_OPTIONS: usize = 4;

/// Most options a question may offer
pub const MAX_OPTIONS: usize = 5;

/// How many options the user may pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Single,
    Multi,
}

/// One clarifying question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub selection: SelectionMode,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub recommended_option: String,
}

/// What the system believes about the project so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InferredContext {
    #[serde(alias = "stackHints")]
    pub stack: Vec<String>,
    pub documentation: Vec<String>,
    pub scope: Vec<String>,
    #[serde(alias = "pain_points")]
    pub pain_points: Vec<String>,
    pub constraints: Vec<String>,
    pub signals: Vec<String>,
}

/// The round's externally visible output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewResult {
    pub direction_summary: String,
    pub inferred_context: InferredContext,
    pub questions: Vec<Question>,
    pub draft_specification: String,
    pub readiness_score: u8,
    pub missing_critical_info: Vec<String>,
}

/// Lenient form of the merge call's output, before repairs
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInterview {
    #[serde(alias = "direction_summary")]
    direction_summary: String,
    #[serde(default, alias = "inferred_context")]
    inferred_context: InferredContext,
    #[serde(default)]
    questions: Vec<Question>,
    #[serde(default, alias = "draft_specification")]
    draft_specification: String,
    #[serde(default, alias = "readiness_score")]
    readiness_score: f64,
    #[serde(default, alias = "missing_critical_info")]
    missing_critical_info: Vec<String>,
}

impl InterviewResult {
    /// JSON schema the merge call must satisfy
    pub fn output_shape() -> Value {
        let list = json!({"type": "array", "items": {"type": "string"}});
        json!({
            "type": "object",
            "properties": {
                "directionSummary": {"type": "string"},
                "inferredContext": {
                    "type": "object",
                    "properties": {
                        "stack": list,
                        "documentation": list,
                        "scope": list,
                        "painPoints": list,
                        "constraints": list,
                        "signals": list
                    }
                },
                "questions": {
                    "type": "array",
                    "minItems": QUESTIONS_PER_ROUND,
                    "maxItems": QUESTIONS_PER_ROUND,
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "prompt": {"type": "string"},
                            "rationale": {"type": "string"},
                            "selection": {"type": "string", "enum": ["single", "multi"]},
                            "options": {
                                "type": "array",
                                "minItems": MIN_OPTIONS,
                                "maxItems": MAX_OPTIONS,
                                "items": {"type": "string"}
                            },
                            "recommendedOption": {"type": "string"}
                        },
                        "required": ["id", "prompt", "selection", "options", "recommendedOption"]
                    }
                },
                "draftSpecification": {"type": "string"},
                "readinessScore": {"type": "number", "minimum": 0, "maximum": 100},
                "missingCriticalInfo": list
            },
            "required": ["directionSummary", "inferredContext", "questions", "draftSpecification", "readinessScore"]
        })
    }

    /// Parse the merge call's output
    ///
    /// Only the shape is checked here; cardinality and option repairs happen
    /// in the synthesizer.
    pub fn from_value(value: Value) -> Result<Self, String> {
        debug!("InterviewResult::from_value: called");
        let raw: RawInterview =
            serde_json::from_value(value).map_err(|e| format!("interview result failed validation: {}", e))?;

        let readiness = if raw.readiness_score.is_finite() {
            raw.readiness_score.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };

        Ok(Self {
            direction_summary: raw.direction_summary.trim().to_string(),
            inferred_context: raw.inferred_context,
            questions: raw.questions,
            draft_specification: raw.draft_specification,
            readiness_score: readiness,
            missing_critical_info: raw.missing_critical_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Value {
        json!({
            "directionSummary": "A CRM for dentists",
            "inferredContext": {"stack": ["rust"], "painPoints": ["double booking"]},
            "questions": [{
                "id": "q1",
                "prompt": "Who books?",
                "selection": "multi",
                "options": ["a", "b", "c", "d"],
                "recommendedOption": "a"
            }],
            "draftSpecification": "# Draft",
            "readinessScore": 41.6
        })
    }

    #[test]
    fn test_from_value_parses_and_clamps() {
        let result = InterviewResult::from_value(minimal()).unwrap();

        assert_eq!(result.direction_summary, "A CRM for dentists");
        assert_eq!(result.inferred_context.stack, vec!["rust"]);
        assert_eq!(result.inferred_context.pain_points, vec!["double booking"]);
        assert_eq!(result.questions[0].selection, SelectionMode::Multi);
        assert_eq!(result.readiness_score, 42);
        assert!(result.missing_critical_info.is_empty());
    }

    #[test]
    fn test_from_value_clamps_out_of_range_readiness() {
        let mut value = minimal();
        value["readinessScore"] = json!(250);
        assert_eq!(InterviewResult::from_value(value).unwrap().readiness_score, 100);
    }

    #[test]
    fn test_from_value_requires_summary() {
        assert!(InterviewResult::from_value(json!({"questions": []})).is_err());
    }

    #[test]
    fn test_serializes_camel_case() {
        let result = InterviewResult::from_value(minimal()).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert!(json.get("directionSummary").is_some());
        assert!(json.get("missingCriticalInfo").is_some());
        assert_eq!(json["questions"][0]["recommendedOption"], "a");
        assert_eq!(json["inferredContext"]["painPoints"][0], "double booking");
    }
}
