use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use course_pipeline::{TranscriptError, TranscriptSource};

#[derive(Clone, Debug)]
pub enum MockTranscript {
    Text(String),
    Missing,
    AgeRestricted,
    Disabled,
}

/// Transcript source scripted per video id. Unknown ids behave like
/// reachable videos without a transcript.
#[derive(Clone, Default)]
pub struct MockTranscriptSource {
    outcomes: Arc<Mutex<HashMap<String, MockTranscript>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockTranscriptSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, video_id: &str, text: &str) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(video_id.to_string(), MockTranscript::Text(text.to_string()));
        self
    }

    pub fn with_outcome(self, video_id: &str, outcome: MockTranscript) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(video_id.to_string(), outcome);
        self
    }
}

impl TranscriptSource for MockTranscriptSource {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>, TranscriptError> {
        self.calls.lock().unwrap().push(video_id.to_string());

        let outcome = self.outcomes.lock().unwrap().get(video_id).cloned();
        match outcome {
            Some(MockTranscript::Text(text)) => Ok(Some(text)),
            Some(MockTranscript::Missing) | None => Ok(None),
            Some(MockTranscript::AgeRestricted) => Err(TranscriptError::AgeRestricted),
            Some(MockTranscript::Disabled) => Err(TranscriptError::Disabled),
        }
    }
}
