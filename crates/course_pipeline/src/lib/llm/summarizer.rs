use std::{fmt::Debug, future::Future};

use course_datastore::TimestampNote;
use futures::future::try_join_all;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    llm::{ChatCompletion, ChatMessage, ChatRequest},
    parser,
};

pub trait Summarizer {
    /// Transcripts longer than this many characters are split at sentence
    /// boundaries and summarized map-reduce style.
    const CHUNK_THRESHOLD: usize = 12_000;

    type Error: Debug + Send;

    fn summarize(
        &self,
        transcript: &str,
        title: &str,
        language: &str,
    ) -> impl Future<Output = Result<SummaryOutput, Self::Error>> + Send;
}

/// Structured result of summarizing one video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutput {
    pub content: String,
    pub key_points: Vec<String>,
    pub timestamps: Vec<TimestampNote>,
}

/// Summarizer that sends short transcripts through a single completion and
/// map-reduces long ones: each chunk is summarized independently (and in
/// parallel), then a synthesis pass merges the partial summaries.
pub struct MapReduceSummarizer<C: ChatCompletion> {
    chat: C,
    chunk_model: String,
    synthesis_model: String,
}

impl<C: ChatCompletion> MapReduceSummarizer<C> {
    const SUMMARIZE_PROMPT: &'static str = include_str!("./prompts/summarize_system.txt");
    const CHUNK_PROMPT: &'static str = include_str!("./prompts/chunk_system.txt");
    const SYNTHESIS_PROMPT: &'static str = include_str!("./prompts/synthesis_system.txt");

    const MAX_COMPLETION_TOKENS: u32 = 2_048;
    // Low temperature keeps repeated runs over the same transcript close
    // to each other.
    const TEMPERATURE: f32 = 0.3;

    pub const DEFAULT_CHUNK_MODEL: &'static str = "gpt-4o-mini";
    pub const DEFAULT_SYNTHESIS_MODEL: &'static str = "gpt-4o";

    pub fn new(chat: C) -> Self {
        Self {
            chat,
            chunk_model: Self::DEFAULT_CHUNK_MODEL.into(),
            synthesis_model: Self::DEFAULT_SYNTHESIS_MODEL.into(),
        }
    }

    /// Override the per-chunk and synthesis models. The synthesis pass may
    /// use a higher-capability model than the per-chunk calls.
    pub fn with_models(
        mut self,
        chunk_model: impl Into<String>,
        synthesis_model: impl Into<String>,
    ) -> Self {
        self.chunk_model = chunk_model.into();
        self.synthesis_model = synthesis_model.into();
        self
    }

    fn system_prompt(template: &str, language: &str) -> String {
        format!("{template}\nWrite the summary in {language}.")
    }

    async fn request_reply(
        &self,
        model: &str,
        system: String,
        user: String,
    ) -> Result<String, C::Error> {
        let reply = self
            .chat
            .complete(ChatRequest {
                model: model.to_string(),
                messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
                max_tokens: Self::MAX_COMPLETION_TOKENS,
                temperature: Self::TEMPERATURE,
            })
            .await?;

        Ok(reply.content)
    }

    async fn summarize_chunk(
        &self,
        index: usize,
        total: usize,
        chunk: &str,
        title: &str,
        language: &str,
    ) -> Result<String, C::Error> {
        self.request_reply(
            &self.chunk_model,
            Self::system_prompt(Self::CHUNK_PROMPT, language),
            format!("Video title: {title}\nSegment {index} of {total}\n\nTranscript segment:\n{chunk}"),
        )
        .await
    }
}

impl<C> Summarizer for MapReduceSummarizer<C>
where
    C: ChatCompletion + Send + Sync,
{
    type Error = C::Error;

    #[tracing::instrument(skip(self, transcript))]
    async fn summarize(
        &self,
        transcript: &str,
        title: &str,
        language: &str,
    ) -> Result<SummaryOutput, Self::Error> {
        if transcript.len() <= Self::CHUNK_THRESHOLD {
            let reply = self
                .request_reply(
                    &self.synthesis_model,
                    Self::system_prompt(Self::SUMMARIZE_PROMPT, language),
                    format!("Video title: {title}\n\nTranscript:\n{transcript}"),
                )
                .await?;

            return Ok(parser::parse_summary_reply(&reply));
        }

        let chunks = split_transcript(transcript, Self::CHUNK_THRESHOLD);
        tracing::info!(
            chunks = chunks.len(),
            transcript_len = transcript.len(),
            "Transcript over threshold, summarizing chunks"
        );

        // Map: one summary per chunk, all in flight at once. A failed
        // chunk fails the whole summarization; there is no partial result.
        let partials = try_join_all(
            chunks
                .iter()
                .enumerate()
                .map(|(i, chunk)| self.summarize_chunk(i + 1, chunks.len(), chunk, title, language)),
        )
        .await?;

        // Reduce: synthesize the partial summaries into the final result.
        let combined = partials.iter().join("\n\n");
        let reply = self
            .request_reply(
                &self.synthesis_model,
                Self::system_prompt(Self::SYNTHESIS_PROMPT, language),
                format!("Video title: {title}\n\nPartial summaries in order:\n{combined}"),
            )
            .await?;

        Ok(parser::parse_summary_reply(&reply))
    }
}

/// Splits a transcript into chunks of at most `threshold` characters,
/// cutting only at sentence boundaries. A single sentence longer than the
/// threshold becomes its own oversized chunk. Concatenating the returned
/// chunks reproduces the input exactly.
pub fn split_transcript(transcript: &str, threshold: usize) -> Vec<String> {
    if transcript.len() <= threshold {
        return vec![transcript.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentence_spans(transcript) {
        if !current.is_empty() && current.len() + sentence.len() > threshold {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(sentence);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Partitions text into sentence spans. A sentence ends at `.`, `!` or `?`
/// and swallows the whitespace run that follows it, so the spans tile the
/// input with nothing dropped.
fn sentence_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let mut end = i + c.len_utf8();
            while let Some(&(j, w)) = chars.peek() {
                if w.is_whitespace() {
                    chars.next();
                    end = j + w.len_utf8();
                } else {
                    break;
                }
            }
            spans.push(&text[start..end]);
            start = end;
        }
    }

    if start < text.len() {
        spans.push(&text[start..]);
    }

    spans
}
