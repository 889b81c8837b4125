use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use reqwest_retry_after::RetryAfterMiddleware;
use serde_json::Value;

use crate::{
    parser,
    yt::{TranscriptError, TranscriptSource},
};

static CAPTION_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<text[^>]*>(?s)(.*?)</text>").unwrap());

/// Transcript source that scrapes the watch page for the player response
/// and downloads the first caption track's timedtext XML.
#[derive(Clone)]
pub struct TimedTextClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl Default for TimedTextClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TimedTextClient {
    pub fn new() -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryAfterMiddleware::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            base_url: "https://www.youtube.com".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

impl TranscriptSource for TimedTextClient {
    #[tracing::instrument(skip(self))]
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>, TranscriptError> {
        let html = self
            .client
            .get(format!("{}/watch", self.base_url))
            .query(&[("v", video_id)])
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to load watch page"))?
            .text()
            .await?;

        let player_response = extract_player_response(&html).ok_or_else(|| {
            TranscriptError::Unavailable("no player response in watch page".into())
        })?;

        let track_url = caption_track_url(&player_response)?;

        let xml = self
            .client
            .get(&track_url)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to fetch caption track"))?
            .text()
            .await?;

        Ok(parse_caption_xml(&xml))
    }
}

/// Pulls the `ytInitialPlayerResponse` JSON object out of a watch page.
fn extract_player_response(html: &str) -> Option<Value> {
    let idx = html.find("ytInitialPlayerResponse")?;
    let json = parser::extract_json_object(&html[idx..])?;
    serde_json::from_str(json).ok()
}

/// Classifies the player response and returns the first caption track URL.
fn caption_track_url(player_response: &Value) -> Result<String, TranscriptError> {
    let playability = player_response["playabilityStatus"]["status"]
        .as_str()
        .unwrap_or_default();

    if playability == "LOGIN_REQUIRED" {
        return Err(TranscriptError::AgeRestricted);
    }
    if playability == "ERROR" {
        let reason = player_response["playabilityStatus"]["reason"]
            .as_str()
            .unwrap_or("video unplayable");
        return Err(TranscriptError::Unavailable(reason.to_string()));
    }

    let tracks = player_response["captions"]["playerCaptionsTracklistRenderer"]["captionTracks"]
        .as_array()
        .filter(|t| !t.is_empty())
        .ok_or(TranscriptError::Disabled)?;

    tracks[0]["baseUrl"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| TranscriptError::Unavailable("caption track has no baseUrl".into()))
}

/// Joins the caption segments of a timedtext document into one
/// whitespace-separated transcript. Returns `None` for an empty document.
fn parse_caption_xml(xml: &str) -> Option<String> {
    let joined = CAPTION_TEXT_RE
        .captures_iter(xml)
        .map(|cap| decode_entities(cap[1].trim()))
        .filter(|text| !text.is_empty())
        .join(" ");

    (!joined.is_empty()).then_some(joined)
}

fn decode_entities(text: &str) -> String {
    // &amp; decoded last so "&amp;lt;" does not double-decode.
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
