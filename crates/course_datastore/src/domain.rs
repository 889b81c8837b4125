use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a course as a whole.
///
/// A course reaches `Completed` once every one of its videos is in a
/// terminal state; individual `Failed` videos do not hold it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Pending => "pending",
            CourseStatus::Processing => "processing",
            CourseStatus::Completed => "completed",
            CourseStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CourseStatus::Completed | CourseStatus::Failed)
    }

    /// Allowed transitions. Terminal states may re-enter `Processing`
    /// when a course is re-ingested.
    pub fn can_transition_to(&self, next: CourseStatus) -> bool {
        use CourseStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Processing)
                | (Failed, Processing)
        )
    }
}

impl TryFrom<String> for CourseStatus {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(CourseStatus::Pending),
            "processing" => Ok(CourseStatus::Processing),
            "completed" => Ok(CourseStatus::Completed),
            "failed" => Ok(CourseStatus::Failed),
            other => Err(anyhow::anyhow!("unknown course status: {other}")),
        }
    }
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-video processing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Transcribing,
    Summarizing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Transcribing => "transcribing",
            VideoStatus::Summarizing => "summarizing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }

    /// Allowed transitions. `Failed` may move forward again because a
    /// retried workflow attempt marks the video failed before re-raising
    /// and then resumes from the failing step.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        use VideoStatus::*;
        matches!(
            (self, next),
            (Pending, Transcribing)
                | (Pending, Failed)
                | (Transcribing, Summarizing)
                | (Transcribing, Failed)
                | (Summarizing, Completed)
                | (Summarizing, Failed)
                | (Failed, Transcribing)
                | (Failed, Summarizing)
                | (Failed, Completed)
        )
    }
}

impl TryFrom<String> for VideoStatus {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(VideoStatus::Pending),
            "transcribing" => Ok(VideoStatus::Transcribing),
            "summarizing" => Ok(VideoStatus::Summarizing),
            "completed" => Ok(VideoStatus::Completed),
            "failed" => Ok(VideoStatus::Failed),
            other => Err(anyhow::anyhow!("unknown video status: {other}")),
        }
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's ingested playlist and its aggregate processing state.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Course {
    pub id: String,
    pub user_id: String,
    pub youtube_playlist_id: String,
    pub playlist_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub video_count: Option<i32>,
    pub total_duration: Option<i64>,
    #[sqlx(try_from = "String")]
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One playlist entry and its per-item processing state.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: String,
    pub course_id: String,
    pub youtube_video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration: Option<String>,
    pub position: i32,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: VideoStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A `{time, text}` pair pointing into the source video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampNote {
    pub time: String,
    pub text: String,
}

/// Structured AI output for one video. Immutable once written; a re-run
/// inserts a fresh record rather than updating in place.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Summary {
    pub id: String,
    pub video_id: String,
    pub course_id: String,
    pub content: String,
    #[sqlx(json)]
    pub key_points: Vec<String>,
    #[sqlx(json)]
    pub timestamps: Vec<TimestampNote>,
    pub created_at: DateTime<Utc>,
}

/// Per-(user, calendar month) usage accumulator.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageCounter {
    pub user_id: String,
    pub month: NaiveDate,
    pub tokens_used: i64,
    pub videos_summarized: i64,
    pub playlists_processed: i64,
}

/// Additive usage increments.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageDelta {
    pub tokens_used: i64,
    pub videos_summarized: i64,
    pub playlists_processed: i64,
}

/// Insert payload for a course created on an ingestion request.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub user_id: String,
    pub youtube_playlist_id: String,
    pub playlist_url: String,
}

/// Playlist-level fields persisted onto a course once the directory
/// lookup succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseMetadata {
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub video_count: i32,
}

/// Insert payload for a video row discovered during playlist fan-out.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub course_id: String,
    pub youtube_video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub position: i32,
}

/// Insert payload for a summary record.
#[derive(Debug, Clone)]
pub struct NewSummary {
    pub video_id: String,
    pub course_id: String,
    pub content: String,
    pub key_points: Vec<String>,
    pub timestamps: Vec<TimestampNote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_status_roundtrip() {
        for status in [
            CourseStatus::Pending,
            CourseStatus::Processing,
            CourseStatus::Completed,
            CourseStatus::Failed,
        ] {
            let parsed = CourseStatus::try_from(status.as_str().to_string()).unwrap();
            assert_eq!(parsed, status);
        }
        assert!(CourseStatus::try_from("bogus".to_string()).is_err());
    }

    #[test]
    fn video_status_roundtrip() {
        for status in [
            VideoStatus::Pending,
            VideoStatus::Transcribing,
            VideoStatus::Summarizing,
            VideoStatus::Completed,
            VideoStatus::Failed,
        ] {
            let parsed = VideoStatus::try_from(status.as_str().to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn course_transitions() {
        assert!(CourseStatus::Pending.can_transition_to(CourseStatus::Processing));
        assert!(CourseStatus::Processing.can_transition_to(CourseStatus::Completed));
        assert!(CourseStatus::Processing.can_transition_to(CourseStatus::Failed));
        assert!(CourseStatus::Completed.can_transition_to(CourseStatus::Processing));

        assert!(!CourseStatus::Pending.can_transition_to(CourseStatus::Completed));
        assert!(!CourseStatus::Completed.can_transition_to(CourseStatus::Failed));
    }

    #[test]
    fn video_transitions() {
        assert!(VideoStatus::Pending.can_transition_to(VideoStatus::Transcribing));
        assert!(VideoStatus::Transcribing.can_transition_to(VideoStatus::Summarizing));
        assert!(VideoStatus::Summarizing.can_transition_to(VideoStatus::Completed));
        assert!(VideoStatus::Failed.can_transition_to(VideoStatus::Summarizing));

        assert!(!VideoStatus::Completed.can_transition_to(VideoStatus::Transcribing));
        assert!(!VideoStatus::Pending.can_transition_to(VideoStatus::Summarizing));
        assert!(!VideoStatus::Pending.can_transition_to(VideoStatus::Completed));
    }

    #[test]
    fn terminal_states() {
        assert!(VideoStatus::Completed.is_terminal());
        assert!(VideoStatus::Failed.is_terminal());
        assert!(!VideoStatus::Summarizing.is_terminal());
        assert!(CourseStatus::Completed.is_terminal());
        assert!(!CourseStatus::Processing.is_terminal());
    }
}
