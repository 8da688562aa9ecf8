//! Embedded prompts
//!
//! Compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Job planning prompt
pub const PLANNER: &str = include_str!("../../prompts/planner.pmt");

/// Per-job analysis prompt
pub const ANALYSIS: &str = include_str!("../../prompts/analysis.pmt");

/// Merge prompt producing the interview result
pub const SYNTHESIS: &str = include_str!("../../prompts/synthesis.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "planner" => Some(PLANNER),
        "analysis" => Some(ANALYSIS),
        "synthesis" => Some(SYNTHESIS),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
