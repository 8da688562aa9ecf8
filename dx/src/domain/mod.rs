//! Domain records shared by the round components

mod interview;
mod job;
mod report;
mod session;

pub use interview::{
    InferredContext, InterviewResult, MAX_OPTIONS, MIN_OPTIONS, QUESTIONS_PER_ROUND, Question, SelectionMode,
};
pub use job::{MAX_JOB_ID_LEN, SpecialistJob, slugify_id, unique_id};
pub use report::{AnalysisOutcome, AnalysisReport, JobFailure, normalize_confidence};
pub use session::{Answer, DiscoverySession};
