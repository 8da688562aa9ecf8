//! Discovery session state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::interview::InterviewResult;

/// One answer to a question from an earlier round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    pub answer: String,
}

impl Answer {
    pub fn new(question_id: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            answer: answer.into(),
        }
    }
}

/// Per-session state advanced once per successful round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySession {
    pub session_id: String,
    /// Key into the profile cache
    pub project_id: String,
    pub goal: String,
    /// Free-text context accumulated across rounds
    pub context: String,
    /// Answers in the order they were given
    pub answers: Vec<Answer>,
    pub round: u32,
    pub readiness_score: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Result of the latest successful round
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<InterviewResult>,
}

impl DiscoverySession {
    /// Start a session at round zero
    pub fn new(goal: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self::with_id(Uuid::now_v7().to_string(), goal, project_id)
    }

    pub fn with_id(session_id: impl Into<String>, goal: impl Into<String>, project_id: impl Into<String>) -> Self {
        let now = Utc::now();
        let session = Self {
            session_id: session_id.into(),
            project_id: project_id.into(),
            goal: goal.into(),
            context: String::new(),
            answers: Vec::new(),
            round: 0,
            readiness_score: 0,
            created_at: now,
            updated_at: now,
            last_result: None,
        };
        debug!(session_id = %session.session_id, project_id = %session.project_id, "DiscoverySession::new");
        session
    }

    /// Accumulated context with this round's addition appended
    pub fn context_with(&self, additional: Option<&str>) -> String {
        match additional.map(str::trim).filter(|s| !s.is_empty()) {
            Some(extra) if self.context.is_empty() => extra.to_string(),
            Some(extra) => format!("{}\n\n{}", self.context, extra),
            None => self.context.clone(),
        }
    }

    /// Record a successful round
    ///
    /// The only mutation a round performs on a session.
    pub fn advance(&mut self, additional_context: Option<&str>, answers: Vec<Answer>, result: InterviewResult) {
        debug!(session_id = %self.session_id, round = self.round, "DiscoverySession::advance: called");
        self.context = self.context_with(additional_context);
        self.answers.extend(answers);
        self.readiness_score = result.readiness_score;
        self.round += 1;
        self.updated_at = Utc::now();
        self.last_result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interview::InferredContext;

    fn result(readiness: u8) -> InterviewResult {
        InterviewResult {
            direction_summary: "summary".to_string(),
            inferred_context: InferredContext::default(),
            questions: vec![],
            draft_specification: String::new(),
            readiness_score: readiness,
            missing_critical_info: vec![],
        }
    }

    #[test]
    fn test_new_session_starts_at_round_zero() {
        let session = DiscoverySession::new("Build a CRM", "crm");
        assert_eq!(session.round, 0);
        assert_eq!(session.readiness_score, 0);
        assert!(session.last_result.is_none());
        assert!(!session.session_id.is_empty());
    }

    #[test]
    fn test_advance_appends_and_replaces() {
        let mut session = DiscoverySession::with_id("s-1", "Build a CRM", "crm");
        session.advance(Some("B2B only"), vec![Answer::new("q1", "dentists")], result(30));
        session.advance(Some("  "), vec![Answer::new("q2", "web")], result(55));

        assert_eq!(session.round, 2);
        assert_eq!(session.readiness_score, 55);
        assert_eq!(session.context, "B2B only");
        let ids: Vec<_> = session.answers.iter().map(|a| a.question_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2"]);
        assert_eq!(session.last_result.unwrap().readiness_score, 55);
    }

    #[test]
    fn test_context_with_joins_paragraphs() {
        let mut session = DiscoverySession::with_id("s-1", "g", "p");
        session.context = "first".to_string();
        assert_eq!(session.context_with(Some("second")), "first\n\nsecond");
        assert_eq!(session.context_with(None), "first");
    }
}
