//! Heuristic change detection over free-text round input
//!
//! A noun and a change verb within a bounded character window, in either
//! order, mark a change. Stack changes can also be requested explicitly with a
//! refresh token such as `/refresh-stack`.

use regex::Regex;
use tracing::debug;

const REFRESH_TOKENS: &str = r"(?i)(?:^|\s)[/#](?:refresh-stack|refresh-profile|rescan)\b";

const STACK_NOUNS: &str = r"stacks?|frameworks?|languages?|runtimes?|databases?|orms?";
const STACK_VERBS: &str = r"chang(?:e|es|ed|ing)|switch(?:es|ed|ing)?|migrat(?:e|es|ed|ing|ion)|replac(?:e|es|ed|ing)|rewr(?:ite|ites|ote|itten|iting)|refactor(?:s|ed|ing)?|mov(?:e|es|ed|ing)";

const SCOPE_NOUNS: &str = r"scopes?|requirements?|constraints?|deadlines?|timelines?|security|compliance|architecture|infrastructure|databases?|apis?";
const SCOPE_VERBS: &str = r"chang(?:e|es|ed|ing)|switch(?:es|ed|ing)?|replac(?:e|es|ed|ing)|new|different|pivot(?:s|ed|ing)?";

/// What the detector concluded for one round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSignals {
    /// The project's technology stack likely changed
    pub stack_changed: bool,
    /// Scope or requirements likely changed
    pub scope_changed: bool,
}

impl ChangeSignals {
    pub fn any(&self) -> bool {
        self.stack_changed || self.scope_changed
    }
}

/// Join every non-blank entry, trimmed, with newlines
pub fn combine_context(context: Option<&str>, answers: &[&str]) -> String {
    context
        .into_iter()
        .chain(answers.iter().copied())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compiled detector for one window size
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    refresh: Regex,
    stack: Regex,
    scope: Regex,
}

impl ChangeDetector {
    /// Build a detector allowing up to `window` characters between noun and verb
    pub fn new(window: usize) -> Result<Self, regex::Error> {
        debug!(window, "ChangeDetector::new: called");
        Ok(Self {
            refresh: Regex::new(REFRESH_TOKENS)?,
            stack: Regex::new(&pairing(STACK_NOUNS, STACK_VERBS, window))?,
            scope: Regex::new(&pairing(SCOPE_NOUNS, SCOPE_VERBS, window))?,
        })
    }

    /// Evaluate this round's additional context and answers
    pub fn detect(&self, context: Option<&str>, answers: &[&str]) -> ChangeSignals {
        let combined = combine_context(context, answers);
        self.detect_combined(&combined)
    }

    /// Evaluate an already combined string
    pub fn detect_combined(&self, combined: &str) -> ChangeSignals {
        if combined.is_empty() {
            return ChangeSignals::default();
        }

        let signals = ChangeSignals {
            stack_changed: self.refresh.is_match(combined) || self.stack.is_match(combined),
            scope_changed: self.scope.is_match(combined),
        };
        debug!(len = combined.len(), ?signals, "ChangeDetector::detect_combined: done");
        signals
    }
}

/// `noun .{0,w} verb | verb .{0,w} noun`, case-insensitive on word boundaries
fn pairing(nouns: &str, verbs: &str, window: usize) -> String {
    format!(
        r"(?i)\b(?:{n})\b.{{0,{w}}}\b(?:{v})\b|\b(?:{v})\b.{{0,{w}}}\b(?:{n})\b",
        n = nouns,
        v = verbs,
        w = window
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn detector() -> ChangeDetector {
        ChangeDetector::new(48).unwrap()
    }

    #[test]
    fn test_combine_context_skips_blanks() {
        assert_eq!(combine_context(Some("  a "), &["", " b", "   "]), "a\nb");
        assert_eq!(combine_context(None, &[]), "");
        assert_eq!(combine_context(Some("   "), &["\t"]), "");
    }

    #[test]
    fn test_refresh_token_only_flags_stack() {
        let signals = detector().detect(Some("/refresh-stack"), &[]);
        assert_eq!(
            signals,
            ChangeSignals {
                stack_changed: true,
                scope_changed: false
            }
        );
    }

    #[test]
    fn test_all_refresh_tokens() {
        for token in [
            "/refresh-stack",
            "#refresh-stack",
            "/refresh-profile",
            "#refresh-profile",
            "/rescan",
            "#RESCAN",
        ] {
            assert!(detector().detect(None, &[token]).stack_changed, "{}", token);
        }
    }

    #[test]
    fn test_token_inside_a_path_is_not_a_command() {
        assert!(!detector().detect(Some("see docs/rescan"), &[]).stack_changed);
    }

    #[test]
    fn test_verb_before_noun() {
        let signals = detector().detect(Some("We switched database to PostgreSQL"), &[]);
        assert!(signals.stack_changed);
    }

    #[test]
    fn test_noun_before_verb() {
        assert!(detector().detect(Some("The framework is being replaced next quarter"), &[]).stack_changed);
        assert!(detector().detect(Some("Our compliance needs changed"), &[]).scope_changed);
    }

    #[test]
    fn test_words_too_far_apart() {
        let filler = "x".repeat(60);
        let text = format!("the framework {} will change", filler);
        assert!(!detector().detect(Some(&text), &[]).stack_changed);

        let wide = ChangeDetector::new(100).unwrap();
        assert!(wide.detect(Some(&text), &[]).stack_changed);
    }

    #[test]
    fn test_word_boundaries() {
        // "stacked" is not the noun "stack", "exchange" is not the verb "change"
        assert!(!detector().detect(Some("stacked boxes exchange hands"), &[]).stack_changed);
    }

    #[test]
    fn test_scope_only() {
        let signals = detector().detect(None, &["There is a new deadline from legal"]);
        assert!(signals.scope_changed);
        assert!(!signals.stack_changed);
    }

    #[test]
    fn test_unrelated_text() {
        let signals = detector().detect(Some("Users want dark mode"), &["Mostly mobile"]);
        assert!(!signals.any());
    }

    proptest! {
        #[test]
        fn prop_blank_input_never_signals(context in "[ \t\n]{0,8}", answers in proptest::collection::vec("[ \t]{0,4}", 0..4)) {
            let refs: Vec<&str> = answers.iter().map(String::as_str).collect();
            let signals = detector().detect(Some(&context), &refs);
            prop_assert_eq!(signals, ChangeSignals::default());
        }

        #[test]
        fn prop_detection_is_deterministic(text in ".{0,80}") {
            let d = detector();
            prop_assert_eq!(d.detect(Some(&text), &[]), d.detect(Some(&text), &[]));
        }
    }
}
