//! Round-level errors

use thiserror::Error;

use crate::domain::JobFailure;

/// Fatal errors that end a round without advancing the session
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("all {} analysis jobs failed: {}", .failures.len(), describe(.failures))]
    AllJobsFailed { failures: Vec<JobFailure> },

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("prompt rendering failed: {0}")]
    Prompt(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn describe(failures: &[JobFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
