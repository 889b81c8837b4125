use std::sync::Arc;

use course_datastore::{CourseStatus, DataStore};
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinSet,
};

use crate::{
    llm::summarizer::Summarizer,
    workflow::{
        self,
        step::StepLedger,
        Event, SummarizeVideoJob, WorkflowError,
    },
    yt::{PlaylistDirectory, TranscriptSource},
};

pub mod builder;

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on videos ingested per course.
    pub max_videos: usize,
    /// Global cap on concurrently executing video summarizations. Excess
    /// jobs queue behind the cap instead of running.
    pub concurrency: usize,
    /// Maximum attempts for a workflow that keeps failing with retriable
    /// errors.
    pub max_retries: u32,
    /// Language summaries are written in.
    pub target_language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_videos: 50,
            concurrency: 5,
            max_retries: 3,
            target_language: "English".into(),
        }
    }
}

/// The playlist ingestion and summarization orchestrator.
///
/// Consumes trigger events, runs the matching workflow for each with
/// bounded concurrency and per-workflow retries, and lets workflows fan
/// out further events onto the same queue.
pub struct CoursePipeline<D, P, T, S>
where
    D: DataStore + Send + Sync + 'static,
    P: PlaylistDirectory + Send + Sync + 'static,
    T: TranscriptSource + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    ctx: Arc<PipelineCtx<D, P, T, S>>,
    semaphore: Arc<Semaphore>,
}

struct PipelineCtx<D, P, T, S> {
    store: D,
    playlist: P,
    transcripts: T,
    summarizer: S,
    ledger: Box<dyn StepLedger>,
    config: PipelineConfig,
}

impl<D, P, T, S> CoursePipeline<D, P, T, S>
where
    D: DataStore + Send + Sync + 'static,
    P: PlaylistDirectory + Send + Sync + 'static,
    T: TranscriptSource + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    /// Dispatches the seed events and runs until the queue is drained and
    /// every spawned workflow has finished.
    #[tracing::instrument(skip_all, fields(seed = events.len()))]
    pub async fn run(self, events: Vec<Event>) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks: JoinSet<()> = JoinSet::new();

        for event in events {
            self.dispatch(event, &tx, &mut tasks);
        }

        loop {
            // Drain whatever is immediately available before deciding
            // whether we are idle.
            while let Ok(event) = rx.try_recv() {
                self.dispatch(event, &tx, &mut tasks);
            }

            // New events only come from running tasks, so an empty queue
            // with no tasks means the run is over.
            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                Some(event) = rx.recv() => self.dispatch(event, &tx, &mut tasks),
                Some(joined) = tasks.join_next() => {
                    if let Err(e) = joined {
                        tracing::error!(error = ?e, "Workflow task panicked");
                    }
                }
            }
        }

        Ok(())
    }

    fn dispatch(
        &self,
        event: Event,
        tx: &mpsc::UnboundedSender<Event>,
        tasks: &mut JoinSet<()>,
    ) {
        match event {
            Event::CourseCreate { course_id } => {
                let ctx = Arc::clone(&self.ctx);
                let tx = tx.clone();
                tasks.spawn(async move {
                    ctx.run_process_course(&course_id, &tx).await;
                });
            }
            Event::VideoSummarize(job) => {
                let ctx = Arc::clone(&self.ctx);
                let semaphore = Arc::clone(&self.semaphore);
                tasks.spawn(async move {
                    // Queue behind the global cap; the semaphore is never
                    // closed, so acquisition only fails on shutdown.
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    ctx.run_summarize_video(&job).await;
                });
            }
        }
    }
}

impl<D, P, T, S> PipelineCtx<D, P, T, S>
where
    D: DataStore + Send + Sync + 'static,
    P: PlaylistDirectory + Send + Sync + 'static,
    T: TranscriptSource + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    async fn run_process_course(&self, course_id: &str, events: &mpsc::UnboundedSender<Event>) {
        for attempt in 1..=self.config.max_retries {
            match workflow::process_course(
                &self.store,
                &self.playlist,
                self.ledger.as_ref(),
                events,
                &self.config,
                course_id,
            )
            .await
            {
                Ok(()) => return,
                Err(WorkflowError::NonRetriable(reason)) => {
                    tracing::error!(course_id, %reason, "Course processing rejected");
                    self.mark_course_failed(course_id).await;
                    return;
                }
                Err(WorkflowError::Retriable(err)) => {
                    tracing::warn!(
                        course_id,
                        attempt,
                        error = ?err,
                        "Course processing attempt failed"
                    );
                }
            }
        }

        tracing::error!(course_id, "Course processing failed after retries");
        self.mark_course_failed(course_id).await;
    }

    async fn mark_course_failed(&self, course_id: &str) {
        if let Err(e) = self
            .store
            .update_course_status(course_id, CourseStatus::Failed)
            .await
        {
            tracing::error!(error = ?e, course_id, "Failed to mark course failed");
        }
    }

    async fn run_summarize_video(&self, job: &SummarizeVideoJob) {
        for attempt in 1..=self.config.max_retries {
            match workflow::summarize_video(
                &self.store,
                &self.transcripts,
                &self.summarizer,
                self.ledger.as_ref(),
                job,
            )
            .await
            {
                Ok(()) => return,
                Err(WorkflowError::NonRetriable(reason)) => {
                    tracing::error!(
                        video_id = %job.video_id,
                        %reason,
                        "Video summarization rejected"
                    );
                    break;
                }
                Err(WorkflowError::Retriable(err)) => {
                    tracing::warn!(
                        video_id = %job.video_id,
                        attempt,
                        error = ?err,
                        "Video summarization attempt failed"
                    );
                }
            }
        }

        // The workflow marked the video failed before re-raising; still
        // settle the course so a permanently failed video cannot wedge it.
        if let Err(e) =
            workflow::check_course_completion(&self.store, &job.course_id).await
        {
            tracing::error!(
                error = ?e,
                course_id = %job.course_id,
                "Completion check after failed video did not run"
            );
        }
    }
}
