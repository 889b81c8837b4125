use anyhow::Context;
use chrono::{Datelike, Utc};
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, types::Json, PgPool};

use crate::{
    datastore::DataStore,
    domain::{
        Course, CourseMetadata, CourseStatus, NewCourse, NewSummary, NewVideo, Summary, UsageDelta,
        Video, VideoStatus,
    },
};

static MIGRATOR: Migrator = sqlx::migrate!();

#[derive(Debug, Clone)]
pub struct PgDataStore {
    pub pool: PgPool,
}

impl PgDataStore {
    /// Establish connection to database and run pending migrations.
    pub async fn init(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .inspect_err(
                |e| tracing::error!(error = ?e, "Failed to establish connection to database"),
            )
            .context("Failed to connect to postgres database")?;

        MIGRATOR
            .run(&pool)
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to run database migrations"))
            .context("Failed to run database migrations")?;

        Ok(PgDataStore { pool })
    }
}

impl DataStore for PgDataStore {
    async fn create_course(&self, new: &NewCourse) -> anyhow::Result<Course> {
        let inserted = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (user_id, youtube_playlist_id, playlist_url)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, youtube_playlist_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&new.user_id)
        .bind(&new.youtube_playlist_id)
        .bind(&new.playlist_url)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, "Failed to insert course"))
        .context("Failed to insert course")?;

        match inserted {
            Some(course) => Ok(course),
            // Conflict: a course for this (user, playlist) already exists.
            None => self
                .find_course_by_playlist(&new.user_id, &new.youtube_playlist_id)
                .await?
                .context("Course conflicted on insert but was not found"),
        }
    }

    async fn get_course(&self, course_id: &str) -> anyhow::Result<Option<Course>> {
        sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!(error = ?e, course_id, "Failed to fetch course"))
            .context("Failed to fetch course")
    }

    async fn find_course_by_playlist(
        &self,
        user_id: &str,
        youtube_playlist_id: &str,
    ) -> anyhow::Result<Option<Course>> {
        sqlx::query_as::<_, Course>(
            "SELECT * FROM courses WHERE user_id = $1 AND youtube_playlist_id = $2",
        )
        .bind(user_id)
        .bind(youtube_playlist_id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, "Failed to fetch course by playlist"))
        .context("Failed to fetch course by playlist")
    }

    async fn list_courses_by_status(&self, status: CourseStatus) -> anyhow::Result<Vec<Course>> {
        sqlx::query_as::<_, Course>(
            "SELECT * FROM courses WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, "Failed to list courses"))
        .context("Failed to list courses by status")
    }

    async fn update_course_status(
        &self,
        course_id: &str,
        status: CourseStatus,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE courses SET status = $2, updated_at = now() WHERE id = $1")
            .bind(course_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .inspect_err(|e| {
                tracing::error!(error = ?e, course_id, %status, "Failed to update course status")
            })
            .context("Failed to update course status")?;

        Ok(())
    }

    async fn update_course_metadata(
        &self,
        course_id: &str,
        metadata: &CourseMetadata,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE courses
            SET title = $2,
                description = $3,
                thumbnail_url = $4,
                channel_id = $5,
                channel_title = $6,
                video_count = $7,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(course_id)
        .bind(&metadata.title)
        .bind(&metadata.description)
        .bind(&metadata.thumbnail_url)
        .bind(&metadata.channel_id)
        .bind(&metadata.channel_title)
        .bind(metadata.video_count)
        .execute(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, course_id, "Failed to update course metadata"))
        .context("Failed to update course metadata")?;

        Ok(())
    }

    async fn find_video_by_youtube_id(
        &self,
        course_id: &str,
        youtube_video_id: &str,
    ) -> anyhow::Result<Option<Video>> {
        sqlx::query_as::<_, Video>(
            "SELECT * FROM videos WHERE course_id = $1 AND youtube_video_id = $2",
        )
        .bind(course_id)
        .bind(youtube_video_id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, youtube_video_id, "Failed to fetch video"))
        .context("Failed to fetch video by youtube id")
    }

    async fn insert_video(&self, new: &NewVideo) -> anyhow::Result<Video> {
        let inserted = sqlx::query_as::<_, Video>(
            r#"
            INSERT INTO videos (course_id, youtube_video_id, title, description, thumbnail_url, "position")
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (course_id, youtube_video_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&new.course_id)
        .bind(&new.youtube_video_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.thumbnail_url)
        .bind(new.position)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| {
            tracing::error!(
                error = ?e,
                youtube_video_id = %new.youtube_video_id,
                "Failed to insert video"
            )
        })
        .context("Failed to insert video")?;

        match inserted {
            Some(video) => Ok(video),
            // Conflict: a concurrent upsert of the same playlist entry won.
            None => self
                .find_video_by_youtube_id(&new.course_id, &new.youtube_video_id)
                .await?
                .context("Video conflicted on insert but was not found"),
        }
    }

    async fn update_video_status(&self, video_id: &str, status: VideoStatus) -> anyhow::Result<()> {
        sqlx::query("UPDATE videos SET status = $2, updated_at = now() WHERE id = $1")
            .bind(video_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .inspect_err(|e| {
                tracing::error!(error = ?e, video_id, %status, "Failed to update video status")
            })
            .context("Failed to update video status")?;

        Ok(())
    }

    async fn save_video_transcript(&self, video_id: &str, transcript: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE videos
            SET transcript = $2, status = 'summarizing', updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(video_id)
        .bind(transcript)
        .execute(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, video_id, "Failed to save transcript"))
        .context("Failed to save video transcript")?;

        Ok(())
    }

    async fn complete_video(&self, video_id: &str, summary: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE videos
            SET summary = $2, status = 'completed', failure_reason = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(video_id)
        .bind(summary)
        .execute(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, video_id, "Failed to complete video"))
        .context("Failed to complete video")?;

        Ok(())
    }

    async fn fail_video(&self, video_id: &str, reason: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE videos
            SET status = 'failed', failure_reason = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(video_id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, video_id, "Failed to mark video failed"))
        .context("Failed to mark video failed")?;

        Ok(())
    }

    async fn count_videos_excluding(
        &self,
        course_id: &str,
        excluded: &[VideoStatus],
    ) -> anyhow::Result<i64> {
        let excluded: Vec<String> = excluded.iter().map(|s| s.as_str().to_string()).collect();

        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM videos WHERE course_id = $1 AND status <> ALL($2)",
        )
        .bind(course_id)
        .bind(&excluded)
        .fetch_one(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, course_id, "Failed to count videos"))
        .context("Failed to count videos")
    }

    async fn insert_summary(&self, new: &NewSummary) -> anyhow::Result<Summary> {
        sqlx::query_as::<_, Summary>(
            r#"
            INSERT INTO summaries (video_id, course_id, content, key_points, timestamps)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&new.video_id)
        .bind(&new.course_id)
        .bind(&new.content)
        .bind(Json(&new.key_points))
        .bind(Json(&new.timestamps))
        .fetch_one(&self.pool)
        .await
        .inspect_err(|e| {
            tracing::error!(error = ?e, video_id = %new.video_id, "Failed to insert summary")
        })
        .context("Failed to insert summary")
    }

    async fn increment_usage(&self, user_id: &str, delta: &UsageDelta) -> anyhow::Result<()> {
        let month = Utc::now()
            .date_naive()
            .with_day(1)
            .context("Failed to resolve current month bucket")?;

        // Read-modify-write on purpose: concurrent increments for the same
        // user and month can lose updates. Usage metering is approximate.
        let existing = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT tokens_used, videos_summarized, playlists_processed
            FROM usage_counters
            WHERE user_id = $1 AND month = $2
            "#,
        )
        .bind(user_id)
        .bind(month)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, user_id, "Failed to read usage counter"))
        .context("Failed to read usage counter")?;

        match existing {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO usage_counters
                        (user_id, month, tokens_used, videos_summarized, playlists_processed)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (user_id, month) DO NOTHING
                    "#,
                )
                .bind(user_id)
                .bind(month)
                .bind(delta.tokens_used)
                .bind(delta.videos_summarized)
                .bind(delta.playlists_processed)
                .execute(&self.pool)
                .await
                .inspect_err(
                    |e| tracing::error!(error = ?e, user_id, "Failed to seed usage counter"),
                )
                .context("Failed to seed usage counter")?;
            }
            Some((tokens, videos, playlists)) => {
                sqlx::query(
                    r#"
                    UPDATE usage_counters
                    SET tokens_used = $3,
                        videos_summarized = $4,
                        playlists_processed = $5,
                        updated_at = now()
                    WHERE user_id = $1 AND month = $2
                    "#,
                )
                .bind(user_id)
                .bind(month)
                .bind(tokens + delta.tokens_used)
                .bind(videos + delta.videos_summarized)
                .bind(playlists + delta.playlists_processed)
                .execute(&self.pool)
                .await
                .inspect_err(
                    |e| tracing::error!(error = ?e, user_id, "Failed to update usage counter"),
                )
                .context("Failed to update usage counter")?;
            }
        }

        Ok(())
    }
}
