use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use course_datastore::TimestampNote;
use course_pipeline::{Summarizer, SummaryOutput};

#[derive(Clone)]
pub struct MockSummarizer {
    pub output: SummaryOutput,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_with: Option<String>,
    pub delay: Option<Duration>,
    active: Arc<AtomicUsize>,
    pub max_active: Arc<AtomicUsize>,
}

impl MockSummarizer {
    pub fn new(content: &str) -> Self {
        Self {
            output: SummaryOutput {
                content: content.to_string(),
                key_points: vec!["First takeaway".into(), "Second takeaway".into()],
                timestamps: vec![TimestampNote {
                    time: "00:30".into(),
                    text: "introduction".into(),
                }],
            },
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
            delay: None,
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::new("")
        }
    }

    /// Hold each call open for `delay` so overlap becomes observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Summarizer for MockSummarizer {
    type Error = anyhow::Error;

    async fn summarize(
        &self,
        transcript: &str,
        _title: &str,
        _language: &str,
    ) -> Result<SummaryOutput, Self::Error> {
        self.calls.lock().unwrap().push(transcript.to_string());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }

        Ok(self.output.clone())
    }
}
