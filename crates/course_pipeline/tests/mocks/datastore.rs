use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use chrono::{Datelike, NaiveDate, Utc};
use course_datastore::{
    Course, CourseMetadata, CourseStatus, DataStore, NewCourse, NewSummary, NewVideo, Summary,
    UsageCounter, UsageDelta, Video, VideoStatus,
};

/// In-memory datastore with the same observable behavior as the Postgres
/// implementation: natural-key upserts, partial-field updates and a
/// read-modify-write usage counter.
#[derive(Clone, Default)]
pub struct MockDataStore {
    pub courses: Arc<Mutex<HashMap<String, Course>>>,
    pub videos: Arc<Mutex<HashMap<String, Video>>>,
    pub summaries: Arc<Mutex<Vec<Summary>>>,
    pub usage: Arc<Mutex<HashMap<(String, NaiveDate), UsageCounter>>>,
    pub fail_usage: bool,
    next_id: Arc<AtomicUsize>,
}

fn month_key() -> NaiveDate {
    Utc::now()
        .date_naive()
        .with_day(1)
        .expect("first of month is always valid")
}

impl MockDataStore {
    pub fn failing_usage() -> Self {
        Self {
            fail_usage: true,
            ..Default::default()
        }
    }

    fn generate_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn seed_course(&self, id: &str, user_id: &str, playlist_id: &str) -> Course {
        let course = Course {
            id: id.to_string(),
            user_id: user_id.to_string(),
            youtube_playlist_id: playlist_id.to_string(),
            playlist_url: format!("https://www.youtube.com/playlist?list={playlist_id}"),
            title: None,
            description: None,
            thumbnail_url: None,
            channel_id: None,
            channel_title: None,
            video_count: None,
            total_duration: None,
            status: CourseStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.courses
            .lock()
            .unwrap()
            .insert(id.to_string(), course.clone());
        course
    }

    pub fn seed_video(
        &self,
        course_id: &str,
        youtube_video_id: &str,
        title: &str,
        status: VideoStatus,
    ) -> Video {
        let video = Video {
            id: self.generate_id("vid"),
            course_id: course_id.to_string(),
            youtube_video_id: youtube_video_id.to_string(),
            title: title.to_string(),
            description: None,
            thumbnail_url: None,
            duration: None,
            position: self.videos.lock().unwrap().len() as i32,
            transcript: None,
            summary: None,
            status,
            failure_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.videos
            .lock()
            .unwrap()
            .insert(video.id.clone(), video.clone());
        video
    }

    pub fn course(&self, course_id: &str) -> Option<Course> {
        self.courses.lock().unwrap().get(course_id).cloned()
    }

    pub fn video_by_youtube_id(&self, youtube_video_id: &str) -> Option<Video> {
        self.videos
            .lock()
            .unwrap()
            .values()
            .find(|v| v.youtube_video_id == youtube_video_id)
            .cloned()
    }

    pub fn video_count(&self) -> usize {
        self.videos.lock().unwrap().len()
    }

    pub fn usage_for(&self, user_id: &str) -> Option<UsageCounter> {
        self.usage
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), month_key()))
            .cloned()
    }
}

impl DataStore for MockDataStore {
    async fn create_course(&self, new: &NewCourse) -> anyhow::Result<Course> {
        if let Some(existing) = self
            .find_course_by_playlist(&new.user_id, &new.youtube_playlist_id)
            .await?
        {
            return Ok(existing);
        }

        let course = Course {
            id: self.generate_id("course"),
            user_id: new.user_id.clone(),
            youtube_playlist_id: new.youtube_playlist_id.clone(),
            playlist_url: new.playlist_url.clone(),
            title: None,
            description: None,
            thumbnail_url: None,
            channel_id: None,
            channel_title: None,
            video_count: None,
            total_duration: None,
            status: CourseStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.courses
            .lock()
            .unwrap()
            .insert(course.id.clone(), course.clone());
        Ok(course)
    }

    async fn get_course(&self, course_id: &str) -> anyhow::Result<Option<Course>> {
        Ok(self.courses.lock().unwrap().get(course_id).cloned())
    }

    async fn find_course_by_playlist(
        &self,
        user_id: &str,
        youtube_playlist_id: &str,
    ) -> anyhow::Result<Option<Course>> {
        Ok(self
            .courses
            .lock()
            .unwrap()
            .values()
            .find(|c| c.user_id == user_id && c.youtube_playlist_id == youtube_playlist_id)
            .cloned())
    }

    async fn list_courses_by_status(&self, status: CourseStatus) -> anyhow::Result<Vec<Course>> {
        Ok(self
            .courses
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect())
    }

    async fn update_course_status(
        &self,
        course_id: &str,
        status: CourseStatus,
    ) -> anyhow::Result<()> {
        if let Some(course) = self.courses.lock().unwrap().get_mut(course_id) {
            course.status = status;
            course.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_course_metadata(
        &self,
        course_id: &str,
        metadata: &CourseMetadata,
    ) -> anyhow::Result<()> {
        if let Some(course) = self.courses.lock().unwrap().get_mut(course_id) {
            course.title = Some(metadata.title.clone());
            course.description = metadata.description.clone();
            course.thumbnail_url = metadata.thumbnail_url.clone();
            course.channel_id = metadata.channel_id.clone();
            course.channel_title = metadata.channel_title.clone();
            course.video_count = Some(metadata.video_count);
            course.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_video_by_youtube_id(
        &self,
        course_id: &str,
        youtube_video_id: &str,
    ) -> anyhow::Result<Option<Video>> {
        Ok(self
            .videos
            .lock()
            .unwrap()
            .values()
            .find(|v| v.course_id == course_id && v.youtube_video_id == youtube_video_id)
            .cloned())
    }

    async fn insert_video(&self, new: &NewVideo) -> anyhow::Result<Video> {
        let video = Video {
            id: self.generate_id("vid"),
            course_id: new.course_id.clone(),
            youtube_video_id: new.youtube_video_id.clone(),
            title: new.title.clone(),
            description: new.description.clone(),
            thumbnail_url: new.thumbnail_url.clone(),
            duration: None,
            position: new.position,
            transcript: None,
            summary: None,
            status: VideoStatus::Pending,
            failure_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.videos
            .lock()
            .unwrap()
            .insert(video.id.clone(), video.clone());
        Ok(video)
    }

    async fn update_video_status(&self, video_id: &str, status: VideoStatus) -> anyhow::Result<()> {
        if let Some(video) = self.videos.lock().unwrap().get_mut(video_id) {
            video.status = status;
            video.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn save_video_transcript(&self, video_id: &str, transcript: &str) -> anyhow::Result<()> {
        if let Some(video) = self.videos.lock().unwrap().get_mut(video_id) {
            video.transcript = Some(transcript.to_string());
            video.status = VideoStatus::Summarizing;
            video.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn complete_video(&self, video_id: &str, summary: &str) -> anyhow::Result<()> {
        if let Some(video) = self.videos.lock().unwrap().get_mut(video_id) {
            video.summary = Some(summary.to_string());
            video.status = VideoStatus::Completed;
            video.failure_reason = None;
            video.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn fail_video(&self, video_id: &str, reason: &str) -> anyhow::Result<()> {
        if let Some(video) = self.videos.lock().unwrap().get_mut(video_id) {
            video.status = VideoStatus::Failed;
            video.failure_reason = Some(reason.to_string());
            video.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn count_videos_excluding(
        &self,
        course_id: &str,
        excluded: &[VideoStatus],
    ) -> anyhow::Result<i64> {
        Ok(self
            .videos
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.course_id == course_id && !excluded.contains(&v.status))
            .count() as i64)
    }

    async fn insert_summary(&self, new: &NewSummary) -> anyhow::Result<Summary> {
        let summary = Summary {
            id: self.generate_id("sum"),
            video_id: new.video_id.clone(),
            course_id: new.course_id.clone(),
            content: new.content.clone(),
            key_points: new.key_points.clone(),
            timestamps: new.timestamps.clone(),
            created_at: Utc::now(),
        };
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(summary)
    }

    async fn increment_usage(&self, user_id: &str, delta: &UsageDelta) -> anyhow::Result<()> {
        if self.fail_usage {
            return Err(anyhow::anyhow!("usage store unavailable"));
        }

        let key = (user_id.to_string(), month_key());
        let mut usage = self.usage.lock().unwrap();
        let counter = usage.entry(key).or_insert_with(|| UsageCounter {
            user_id: user_id.to_string(),
            month: month_key(),
            tokens_used: 0,
            videos_summarized: 0,
            playlists_processed: 0,
        });
        counter.tokens_used += delta.tokens_used;
        counter.videos_summarized += delta.videos_summarized;
        counter.playlists_processed += delta.playlists_processed;
        Ok(())
    }
}
