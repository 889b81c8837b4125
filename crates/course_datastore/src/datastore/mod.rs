use std::future::Future;

pub mod postgres;

use crate::domain::{
    Course, CourseMetadata, CourseStatus, NewCourse, NewSummary, NewVideo, Summary, UsageDelta,
    Video, VideoStatus,
};

/// Persistence operations the pipeline workflows need. Implemented by
/// [`postgres::PgDataStore`] in production and by in-memory fakes in tests.
///
/// No transactionality is assumed beyond per-statement atomicity; every
/// write is a single-row insert or partial update so a retried workflow
/// step can safely re-execute it.
pub trait DataStore {
    /// Create a course for `(user, playlist)` or return the existing one.
    /// At most one course exists per pair.
    fn create_course(&self, new: &NewCourse) -> impl Future<Output = anyhow::Result<Course>> + Send;

    fn get_course(
        &self,
        course_id: &str,
    ) -> impl Future<Output = anyhow::Result<Option<Course>>> + Send;

    fn find_course_by_playlist(
        &self,
        user_id: &str,
        youtube_playlist_id: &str,
    ) -> impl Future<Output = anyhow::Result<Option<Course>>> + Send;

    fn list_courses_by_status(
        &self,
        status: CourseStatus,
    ) -> impl Future<Output = anyhow::Result<Vec<Course>>> + Send;

    fn update_course_status(
        &self,
        course_id: &str,
        status: CourseStatus,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn update_course_metadata(
        &self,
        course_id: &str,
        metadata: &CourseMetadata,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Natural-key lookup used for idempotent video upserts.
    fn find_video_by_youtube_id(
        &self,
        course_id: &str,
        youtube_video_id: &str,
    ) -> impl Future<Output = anyhow::Result<Option<Video>>> + Send;

    fn insert_video(&self, new: &NewVideo) -> impl Future<Output = anyhow::Result<Video>> + Send;

    fn update_video_status(
        &self,
        video_id: &str,
        status: VideoStatus,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Persist the transcript and move the video to `summarizing` in one
    /// update.
    fn save_video_transcript(
        &self,
        video_id: &str,
        transcript: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Denormalize the summary content onto the video and mark it
    /// `completed`.
    fn complete_video(
        &self,
        video_id: &str,
        summary: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn fail_video(
        &self,
        video_id: &str,
        reason: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Count videos in a course whose status is not in `excluded`.
    fn count_videos_excluding(
        &self,
        course_id: &str,
        excluded: &[VideoStatus],
    ) -> impl Future<Output = anyhow::Result<i64>> + Send;

    fn insert_summary(
        &self,
        new: &NewSummary,
    ) -> impl Future<Output = anyhow::Result<Summary>> + Send;

    /// Add `delta` to the user's current-month usage bucket, creating it
    /// on first use. Read-modify-write; concurrent increments may lose
    /// updates, which callers accept (approximate metering only).
    fn increment_usage(
        &self,
        user_id: &str,
        delta: &UsageDelta,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}
