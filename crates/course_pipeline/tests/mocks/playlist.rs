use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use course_pipeline::{PlaylistDirectory, PlaylistEntry, PlaylistMetadata};

#[derive(Clone)]
pub struct MockPlaylistDirectory {
    pub metadata: PlaylistMetadata,
    pub entries: Vec<PlaylistEntry>,
    pub metadata_calls: Arc<Mutex<Vec<String>>>,
    pub video_calls: Arc<Mutex<Vec<(String, usize)>>>,
    pub fail_with: Option<String>,
    video_failures_left: Arc<AtomicUsize>,
}

impl MockPlaylistDirectory {
    pub fn new(title: &str, entries: Vec<PlaylistEntry>) -> Self {
        Self {
            metadata: PlaylistMetadata {
                title: title.to_string(),
                description: Some("A mock playlist".into()),
                thumbnail_url: None,
                channel_id: Some("UC-mock".into()),
                channel_title: Some("Mock Channel".into()),
                total_videos: entries.len() as i32,
            },
            entries,
            metadata_calls: Arc::new(Mutex::new(Vec::new())),
            video_calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
            video_failures_left: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::new("failing playlist", Vec::new())
        }
    }

    /// Fail the first `failures` video listings, then succeed.
    pub fn flaky_videos(self, failures: usize) -> Self {
        self.video_failures_left.store(failures, Ordering::SeqCst);
        self
    }

    pub fn entry(youtube_video_id: &str, title: &str, position: i32) -> PlaylistEntry {
        PlaylistEntry {
            youtube_video_id: youtube_video_id.to_string(),
            title: title.to_string(),
            description: None,
            thumbnail_url: None,
            published_at: None,
            position,
            channel_id: Some("UC-mock".into()),
            channel_title: Some("Mock Channel".into()),
        }
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl PlaylistDirectory for MockPlaylistDirectory {
    type Error = anyhow::Error;

    async fn fetch_playlist_metadata(
        &self,
        playlist_id: &str,
    ) -> Result<PlaylistMetadata, Self::Error> {
        self.metadata_calls
            .lock()
            .unwrap()
            .push(playlist_id.to_string());

        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }

        Ok(self.metadata.clone())
    }

    async fn fetch_playlist_videos(
        &self,
        playlist_id: &str,
        max_results: usize,
    ) -> Result<Vec<PlaylistEntry>, Self::Error> {
        self.video_calls
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), max_results));

        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        if take_failure(&self.video_failures_left) {
            return Err(anyhow::anyhow!("transient video listing failure"));
        }

        Ok(self.entries.iter().take(max_results).cloned().collect())
    }
}
