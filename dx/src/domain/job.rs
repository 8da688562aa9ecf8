//! Specialist analysis jobs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Longest id a job may carry
pub const MAX_JOB_ID_LEN: usize = 48;

/// One unit of parallel analysis work planned for a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistJob {
    pub id: String,
    pub title: String,
    /// What evidence the job should gather
    pub objective: String,
    /// Whether this job's report refreshes the cached profile
    pub produces_profile_artifact: bool,
}

impl SpecialistJob {
    pub fn new(id: impl Into<String>, title: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            objective: objective.into(),
            produces_profile_artifact: false,
        }
    }

    /// The canonical job that rebuilds the project profile
    pub fn stack_analysis() -> Self {
        Self {
            id: "stack-analysis".to_string(),
            title: "Stack Analysis".to_string(),
            objective: "Identify the languages, frameworks, runtimes and data stores the project uses or \
                        intends to use, with evidence for each."
                .to_string(),
            produces_profile_artifact: true,
        }
    }
}

/// Convert free text to a kebab-case id of at most `MAX_JOB_ID_LEN` chars
///
/// Returns an empty string when nothing alphanumeric remains.
pub fn slugify_id(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    truncate_id(&slug, MAX_JOB_ID_LEN)
}

fn truncate_id(id: &str, max: usize) -> String {
    // ids are ASCII after slugify, so byte slicing is safe
    let cut = &id[..id.len().min(max)];
    cut.trim_end_matches('-').to_string()
}

/// Return `base` if unused, else `base-2`, `base-3`, ... within the length limit
///
/// The chosen id is recorded in `used`.
pub fn unique_id(base: &str, used: &mut HashSet<String>) -> String {
    debug!(%base, "unique_id: called");
    if !used.contains(base) {
        used.insert(base.to_string());
        return base.to_string();
    }

    let mut n = 2usize;
    loop {
        let suffix = format!("-{}", n);
        let stem = truncate_id(base, MAX_JOB_ID_LEN - suffix.len());
        let candidate = format!("{}{}", stem, suffix);
        if !used.contains(&candidate) {
            debug!(%candidate, "unique_id: resolved collision");
            used.insert(candidate.clone());
            return candidate;
        }
        n += 1;
    }
}
