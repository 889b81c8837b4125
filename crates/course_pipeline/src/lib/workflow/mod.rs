pub mod process_course;
pub mod step;
pub mod summarize_video;

use serde::{Deserialize, Serialize};

pub use process_course::process_course;
pub use summarize_video::{
    check_course_completion, summarize_video, AGE_RESTRICTED_REASON, DISABLED_REASON,
    NO_TRANSCRIPT_REASON,
};

/// Trigger events the orchestrator consumes. `CourseCreate` arrives from
/// an external caller; `VideoSummarize` is emitted in bulk by the playlist
/// fan-out step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CourseCreate { course_id: String },
    VideoSummarize(SummarizeVideoJob),
}

/// Payload of one `video.summarize` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeVideoJob {
    pub course_id: String,
    pub video_id: String,
    pub youtube_video_id: String,
    pub video_title: String,
    pub target_language: String,
}

/// Workflow failures, split by how the runner should react to them.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Input errors (missing or unknown ids): reported once, never
    /// retried.
    #[error("{0}")]
    NonRetriable(String),

    /// Transient failures the runner may retry. Steps completed before
    /// the failure are skipped on re-execution via the step ledger.
    #[error(transparent)]
    Retriable(#[from] anyhow::Error),
}
