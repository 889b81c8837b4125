use std::sync::Arc;

use course_datastore::DataStore;
use tokio::sync::Semaphore;

use crate::{
    llm::summarizer::Summarizer,
    pipeline::{CoursePipeline, PipelineConfig, PipelineCtx},
    workflow::step::{MemoryStepLedger, StepLedger},
    yt::{PlaylistDirectory, TranscriptSource},
};

pub struct CoursePipelineBuilder<D = (), P = (), T = (), S = ()> {
    store: D,
    playlist: P,
    transcripts: T,
    summarizer: S,
    ledger: Box<dyn StepLedger>,
    config: PipelineConfig,
}

impl CoursePipelineBuilder {
    pub fn new() -> Self {
        Self {
            store: (),
            playlist: (),
            transcripts: (),
            summarizer: (),
            ledger: Box::new(MemoryStepLedger::new()),
            config: PipelineConfig::default(),
        }
    }
}

impl Default for CoursePipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, P, T, S> CoursePipelineBuilder<D, P, T, S> {
    pub fn store<D2: DataStore + Send + Sync + 'static>(
        self,
        store: D2,
    ) -> CoursePipelineBuilder<D2, P, T, S> {
        CoursePipelineBuilder {
            store,
            playlist: self.playlist,
            transcripts: self.transcripts,
            summarizer: self.summarizer,
            ledger: self.ledger,
            config: self.config,
        }
    }

    pub fn playlist<P2: PlaylistDirectory + Send + Sync + 'static>(
        self,
        playlist: P2,
    ) -> CoursePipelineBuilder<D, P2, T, S> {
        CoursePipelineBuilder {
            store: self.store,
            playlist,
            transcripts: self.transcripts,
            summarizer: self.summarizer,
            ledger: self.ledger,
            config: self.config,
        }
    }

    pub fn transcripts<T2: TranscriptSource + Send + Sync + 'static>(
        self,
        transcripts: T2,
    ) -> CoursePipelineBuilder<D, P, T2, S> {
        CoursePipelineBuilder {
            store: self.store,
            playlist: self.playlist,
            transcripts,
            summarizer: self.summarizer,
            ledger: self.ledger,
            config: self.config,
        }
    }

    pub fn summarizer<S2: Summarizer + Send + Sync + 'static>(
        self,
        summarizer: S2,
    ) -> CoursePipelineBuilder<D, P, T, S2> {
        CoursePipelineBuilder {
            store: self.store,
            playlist: self.playlist,
            transcripts: self.transcripts,
            summarizer,
            ledger: self.ledger,
            config: self.config,
        }
    }

    /// Substitute a different step ledger, e.g. a durable one.
    pub fn step_ledger(mut self, ledger: impl StepLedger + 'static) -> Self {
        self.ledger = Box::new(ledger);
        self
    }

    pub fn max_videos(mut self, max_videos: usize) -> Self {
        self.config.max_videos = max_videos;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn target_language(mut self, language: impl Into<String>) -> Self {
        self.config.target_language = language.into();
        self
    }
}

impl<D, P, T, S> CoursePipelineBuilder<D, P, T, S>
where
    D: DataStore + Send + Sync + 'static,
    P: PlaylistDirectory + Send + Sync + 'static,
    T: TranscriptSource + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    pub fn build(self) -> CoursePipeline<D, P, T, S> {
        let permits = self.config.concurrency.max(1);

        CoursePipeline {
            semaphore: Arc::new(Semaphore::new(permits)),
            ctx: Arc::new(PipelineCtx {
                store: self.store,
                playlist: self.playlist,
                transcripts: self.transcripts,
                summarizer: self.summarizer,
                ledger: self.ledger,
                config: self.config,
            }),
        }
    }
}
