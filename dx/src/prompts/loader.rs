//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use crate::domain::Answer;

/// Variables for the planner template
#[derive(Debug, Clone, Serialize)]
pub struct PlannerContext {
    pub goal: String,
    pub context: String,
    pub answers: Vec<Answer>,
    pub round: u32,
    pub profile_summary: Option<String>,
    pub profile_hints: Vec<String>,
    pub refresh_needed: bool,
    pub stack_changed: bool,
    pub scope_changed: bool,
    pub min_jobs: usize,
    pub max_jobs: usize,
}

/// Variables for one analysis job's template
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisContext {
    pub goal: String,
    pub context: String,
    pub answers: Vec<Answer>,
    pub round: u32,
    pub job_title: String,
    pub job_objective: String,
    pub produces_profile: bool,
    pub profile_summary: Option<String>,
}

/// Variables for the merge template
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisContext {
    pub goal: String,
    pub context: String,
    pub answers: Vec<Answer>,
    pub round: u32,
    pub carried_forward: bool,
    /// One preformatted block per report
    pub report_blocks: Vec<String>,
    /// One line per failed job
    pub failures: Vec<String>,
    pub question_count: usize,
    pub min_options: usize,
    pub max_options: usize,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// User override directory (`.discovery/prompts/`)
    user_dir: Option<PathBuf>,
    /// Repo default directory (`prompts/`)
    repo_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader rooted at a project directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        debug!(?root, "PromptLoader::new: called");
        let user_dir = root.join(".discovery/prompts");
        let repo_dir = root.join("prompts");

        Self {
            hbs: Self::engine(),
            user_dir: user_dir.exists().then_some(user_dir),
            repo_dir: repo_dir.exists().then_some(repo_dir),
        }
    }

    /// A loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
            repo_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text; HTML escaping would mangle quotes and code
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `.discovery/prompts/{name}.pmt`
    /// 2. Repo default: `prompts/{name}.pmt`
    /// 3. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        for dir in [&self.user_dir, &self.repo_dir].into_iter().flatten() {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found on disk");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        let template = self.load_template(name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", name, e))
    }

    pub fn planner(&self, context: &PlannerContext) -> Result<String> {
        debug!(round = context.round, refresh = context.refresh_needed, "PromptLoader::planner: called");
        self.render("planner", context)
    }

    pub fn analysis(&self, context: &AnalysisContext) -> Result<String> {
        debug!(job = %context.job_title, "PromptLoader::analysis: called");
        self.render("analysis", context)
    }

    pub fn synthesis(&self, context: &SynthesisContext) -> Result<String> {
        debug!(
            reports = context.report_blocks.len(),
            failures = context.failures.len(),
            "PromptLoader::synthesis: called"
        );
        self.render("synthesis", context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn planner_context(refresh_needed: bool) -> PlannerContext {
        PlannerContext {
            goal: "Build a \"smart\" CRM".to_string(),
            context: String::new(),
            answers: vec![Answer::new("q1", "dentists")],
            round: 1,
            profile_summary: None,
            profile_hints: vec![],
            refresh_needed,
            stack_changed: false,
            scope_changed: false,
            min_jobs: 2,
            max_jobs: 6,
        }
    }

    #[test]
    fn test_planner_renders_without_escaping() {
        let loader = PromptLoader::embedded_only();
        let text = loader.planner(&planner_context(true)).unwrap();

        assert!(text.contains("Build a \"smart\" CRM"));
        assert!(text.contains("- q1: dentists"));
        assert!(text.contains("between 2 and 6"));
        assert!(text.contains("must be rebuilt"));
    }

    #[test]
    fn test_planner_without_refresh() {
        let loader = PromptLoader::embedded_only();
        let text = loader.planner(&planner_context(false)).unwrap();
        assert!(text.contains("false on every job"));
    }

    #[test]
    fn test_synthesis_lists_failures() {
        let loader = PromptLoader::embedded_only();
        let text = loader
            .synthesis(&SynthesisContext {
                goal: "g".to_string(),
                context: String::new(),
                answers: vec![],
                round: 2,
                carried_forward: false,
                report_blocks: vec!["### Report A".to_string()],
                failures: vec!["api-survey failed after 2 attempt(s): timeout".to_string()],
                question_count: 3,
                min_options: 4,
                max_options: 5,
            })
            .unwrap();

        assert!(text.contains("### Report A"));
        assert!(text.contains("api-survey failed"));
        assert!(text.contains("exactly 3"));
    }

    #[test]
    fn test_user_override_wins() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join(".discovery/prompts");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("planner.pmt"), "custom {{goal}}").unwrap();

        let loader = PromptLoader::new(temp.path());
        let text = loader.planner(&planner_context(true)).unwrap();
        assert_eq!(text, "custom Build a \"smart\" CRM");
    }

    #[test]
    fn test_unknown_template() {
        let loader = PromptLoader::embedded_only();
        assert!(loader.load_template("nonexistent-template").is_err());
    }
}
