use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use reqwest_retry_after::RetryAfterMiddleware;
use serde::de::DeserializeOwned;

use crate::{
    types::{PlaylistItemListResponse, PlaylistItemResource, PlaylistListResponse},
    yt::{PlaylistDirectory, PlaylistEntry, PlaylistMetadata},
};

#[derive(Debug, thiserror::Error)]
pub enum YouTubeError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest_middleware::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("playlist not found: {0}")]
    PlaylistNotFound(String),
}

/// Playlist directory backed by the YouTube Data API v3.
#[derive(Clone)]
pub struct YouTubeDataApi {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
}

impl YouTubeDataApi {
    /// API maximum page size for `playlistItems`.
    const PAGE_SIZE: usize = 50;

    // Sentinel titles the API reports for entries it cannot expose.
    const PRIVATE_VIDEO_TITLE: &'static str = "Private video";
    const DELETED_VIDEO_TITLE: &'static str = "Deleted video";

    pub fn new(api_key: impl Into<String>) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryAfterMiddleware::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            api_key: api_key.into(),
            base_url: "https://www.googleapis.com/youtube/v3".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, YouTubeError> {
        let resp = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, path, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(YouTubeError::Api { status, message });
        }

        Ok(resp.json::<T>().await?)
    }
}

/// Converts one API item into a playlist entry, dropping private and
/// deleted placeholders.
fn entry_from_item(item: PlaylistItemResource) -> Option<PlaylistEntry> {
    let snippet = item.snippet;

    if snippet.title == YouTubeDataApi::PRIVATE_VIDEO_TITLE
        || snippet.title == YouTubeDataApi::DELETED_VIDEO_TITLE
    {
        return None;
    }

    Some(PlaylistEntry {
        youtube_video_id: snippet.resource_id.video_id,
        title: snippet.title,
        description: (!snippet.description.is_empty()).then_some(snippet.description),
        thumbnail_url: snippet.thumbnails.best_url(),
        published_at: snippet.published_at,
        position: snippet.position,
        channel_id: snippet.channel_id,
        channel_title: snippet.channel_title,
    })
}

impl PlaylistDirectory for YouTubeDataApi {
    type Error = YouTubeError;

    #[tracing::instrument(skip(self))]
    async fn fetch_playlist_metadata(
        &self,
        playlist_id: &str,
    ) -> Result<PlaylistMetadata, Self::Error> {
        let resp: PlaylistListResponse = self
            .get_json(
                "playlists",
                &[("part", "snippet,contentDetails"), ("id", playlist_id)],
            )
            .await?;

        let playlist = resp
            .items
            .into_iter()
            .next()
            .ok_or_else(|| YouTubeError::PlaylistNotFound(playlist_id.to_string()))?;

        Ok(PlaylistMetadata {
            title: playlist.snippet.title,
            description: (!playlist.snippet.description.is_empty())
                .then_some(playlist.snippet.description),
            thumbnail_url: playlist.snippet.thumbnails.best_url(),
            channel_id: playlist.snippet.channel_id,
            channel_title: playlist.snippet.channel_title,
            total_videos: playlist
                .content_details
                .map(|d| d.item_count)
                .unwrap_or_default(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_playlist_videos(
        &self,
        playlist_id: &str,
        max_results: usize,
    ) -> Result<Vec<PlaylistEntry>, Self::Error> {
        let mut entries: Vec<PlaylistEntry> = Vec::new();
        let mut page_token: Option<String> = None;
        let page_size = Self::PAGE_SIZE.to_string();

        loop {
            let mut query = vec![
                ("part", "snippet"),
                ("playlistId", playlist_id),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let page: PlaylistItemListResponse = self.get_json("playlistItems", &query).await?;

            // Filter placeholders before counting toward the limit.
            entries.extend(page.items.into_iter().filter_map(entry_from_item));

            if entries.len() >= max_results || page.next_page_token.is_none() {
                break;
            }
            page_token = page.next_page_token;
        }

        entries.truncate(max_results);
        tracing::debug!(count = entries.len(), playlist_id, "Collected playlist entries");

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, video_id: &str, position: i32) -> PlaylistItemResource {
        let json = serde_json::json!({
            "snippet": {
                "title": title,
                "position": position,
                "resourceId": {"videoId": video_id},
            }
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_private_and_deleted_entries_are_dropped() {
        assert!(entry_from_item(item("Private video", "p1", 0)).is_none());
        assert!(entry_from_item(item("Deleted video", "d1", 1)).is_none());
        assert!(entry_from_item(item("A real video", "r1", 2)).is_some());
    }

    #[test]
    fn test_entry_preserves_position_and_id() {
        let entry = entry_from_item(item("Lesson 3", "vid3", 7)).unwrap();
        assert_eq!(entry.youtube_video_id, "vid3");
        assert_eq!(entry.position, 7);
        assert_eq!(entry.title, "Lesson 3");
        assert!(entry.description.is_none());
    }

    #[test]
    fn test_filtering_keeps_positions_monotonic() {
        let items = vec![
            item("Lesson 1", "v1", 0),
            item("Private video", "p", 1),
            item("Lesson 2", "v2", 2),
        ];
        let entries: Vec<_> = items.into_iter().filter_map(entry_from_item).collect();

        assert_eq!(entries.len(), 2);
        assert!(entries[0].position < entries[1].position);
    }
}
