pub mod playlist;
pub mod transcript;

use std::{fmt::Debug, future::Future};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Playlist-level metadata as reported by the directory source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistMetadata {
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub total_videos: i32,
}

/// One member video of a playlist, in playlist order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub youtube_video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub position: i32,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
}

/// Lists a playlist's metadata and member videos.
pub trait PlaylistDirectory {
    type Error: Debug + Send + Sync;

    fn fetch_playlist_metadata(
        &self,
        playlist_id: &str,
    ) -> impl Future<Output = Result<PlaylistMetadata, Self::Error>> + Send;

    /// Returns at most `max_results` entries, following pagination as
    /// needed and preserving playlist order. Private and deleted entries
    /// are dropped before the limit is applied.
    fn fetch_playlist_videos(
        &self,
        playlist_id: &str,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<PlaylistEntry>, Self::Error>> + Send;
}

/// Why a transcript could not be produced.
///
/// `AgeRestricted` and `Disabled` are business outcomes the caller records
/// verbatim on the video; `Unavailable` is the catch-all the caller treats
/// like "no transcript"; the transport variants are transient.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("captions for this video require sign-in")]
    AgeRestricted,
    #[error("captions are turned off for this video")]
    Disabled,
    #[error("transcript unavailable: {0}")]
    Unavailable(String),
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest_middleware::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Retrieves the spoken-text transcript for one video.
pub trait TranscriptSource {
    /// `Ok(None)` means the video is reachable but has no transcript.
    fn fetch_transcript(
        &self,
        video_id: &str,
    ) -> impl Future<Output = Result<Option<String>, TranscriptError>> + Send;
}

/// Extracts a playlist id from a playlist URL, or passes a bare id
/// through.
pub fn parse_playlist_id(input: &str) -> Option<String> {
    let input = input.trim();

    if let Some(idx) = input.find("list=") {
        let rest = &input[idx + "list=".len()..];
        let end = rest.find(['&', '#']).unwrap_or(rest.len());
        let id = &rest[..end];
        return (!id.is_empty()).then(|| id.to_string());
    }

    if !input.is_empty() && !input.contains('/') && !input.contains(' ') {
        return Some(input.to_string());
    }

    None
}
