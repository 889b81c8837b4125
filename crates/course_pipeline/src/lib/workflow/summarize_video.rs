use course_datastore::{CourseStatus, DataStore, NewSummary, UsageDelta, VideoStatus};
use serde::{Deserialize, Serialize};

use crate::{
    llm::summarizer::{Summarizer, SummaryOutput},
    workflow::{
        step::{run_step, StepLedger},
        SummarizeVideoJob, WorkflowError,
    },
    yt::{TranscriptError, TranscriptSource},
};

pub const AGE_RESTRICTED_REASON: &str = "This video is age-restricted and cannot be transcribed";
pub const DISABLED_REASON: &str = "Transcripts are disabled for this video";
pub const NO_TRANSCRIPT_REASON: &str = "No transcript available for this video";

/// What the transcript fetch step concluded. Classified failures are data,
/// not errors: they end the workflow normally with the video marked failed
/// and a human-readable reason persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TranscriptOutcome {
    Available(String),
    Missing(String),
}

/// Per-video workflow, triggered by one `video.summarize` event.
///
/// Fetches the transcript, generates the summary, persists progress after
/// every step and finally re-checks whether the whole course is done. Any
/// unexpected failure past the transcribing stage marks the video failed
/// before the error is re-raised to the runner.
#[tracing::instrument(
    skip_all,
    fields(video_id = %job.video_id, course_id = %job.course_id)
)]
pub async fn summarize_video<D, T, S>(
    store: &D,
    transcripts: &T,
    summarizer: &S,
    ledger: &dyn StepLedger,
    job: &SummarizeVideoJob,
) -> Result<(), WorkflowError>
where
    D: DataStore + Sync,
    T: TranscriptSource + Sync,
    S: Summarizer + Sync,
{
    let instance = format!("video.summarize:{}", job.video_id);

    run_step(ledger, &instance, "mark-transcribing", || async {
        store
            .update_video_status(&job.video_id, VideoStatus::Transcribing)
            .await
            .map_err(WorkflowError::Retriable)
    })
    .await?;

    let outcome: TranscriptOutcome = run_step(ledger, &instance, "fetch-transcript", || async {
        match transcripts.fetch_transcript(&job.youtube_video_id).await {
            Ok(Some(text)) => Ok(TranscriptOutcome::Available(text)),
            Ok(None) => Ok(TranscriptOutcome::Missing(NO_TRANSCRIPT_REASON.to_string())),
            Err(TranscriptError::AgeRestricted) => {
                Ok(TranscriptOutcome::Missing(AGE_RESTRICTED_REASON.to_string()))
            }
            Err(TranscriptError::Disabled) => {
                Ok(TranscriptOutcome::Missing(DISABLED_REASON.to_string()))
            }
            Err(TranscriptError::Unavailable(reason)) => {
                // Indistinguishable from "no transcript" for the caller.
                tracing::warn!(%reason, "Transcript unavailable");
                Ok(TranscriptOutcome::Missing(NO_TRANSCRIPT_REASON.to_string()))
            }
            Err(err) => Err(WorkflowError::Retriable(anyhow::anyhow!(
                "Failed to fetch transcript: {err}"
            ))),
        }
    })
    .await?;

    let transcript = match outcome {
        TranscriptOutcome::Missing(reason) => {
            // Expected business outcome, not a fault: persist the reason
            // and end normally.
            run_step(ledger, &instance, "mark-unavailable", || async {
                store
                    .fail_video(&job.video_id, &reason)
                    .await
                    .map_err(WorkflowError::Retriable)
            })
            .await?;

            return check_course_completion(store, &job.course_id).await;
        }
        TranscriptOutcome::Available(text) => text,
    };

    let summarized = async {
        run_step(ledger, &instance, "persist-transcript", || async {
            store
                .save_video_transcript(&job.video_id, &transcript)
                .await
                .map_err(WorkflowError::Retriable)
        })
        .await?;

        let summary: SummaryOutput = run_step(ledger, &instance, "generate-summary", || async {
            summarizer
                .summarize(&transcript, &job.video_title, &job.target_language)
                .await
                .map_err(|e| {
                    WorkflowError::Retriable(anyhow::anyhow!("Failed to generate summary: {e:?}"))
                })
        })
        .await?;

        run_step(ledger, &instance, "persist-summary", || async {
            store
                .insert_summary(&NewSummary {
                    video_id: job.video_id.clone(),
                    course_id: job.course_id.clone(),
                    content: summary.content.clone(),
                    key_points: summary.key_points.clone(),
                    timestamps: summary.timestamps.clone(),
                })
                .await
                .map_err(WorkflowError::Retriable)?;

            store
                .complete_video(&job.video_id, &summary.content)
                .await
                .map_err(WorkflowError::Retriable)
        })
        .await?;

        Ok::<SummaryOutput, WorkflowError>(summary)
    }
    .await;

    let summary = match summarized {
        Ok(summary) => summary,
        Err(err) => {
            // Mark failed before re-raising so the row reflects the fault
            // even if no retry follows.
            if let Err(e) = store
                .fail_video(&job.video_id, &format!("Summarization failed: {err}"))
                .await
            {
                tracing::error!(error = ?e, "Failed to record video failure");
            }
            return Err(err);
        }
    };

    run_step(ledger, &instance, "record-usage", || async {
        // Rough 4-characters-per-token estimate over input and output.
        let tokens = ((transcript.len() + summary.content.len()) / 4) as i64;
        let delta = UsageDelta {
            tokens_used: tokens,
            videos_summarized: 1,
            playlists_processed: 0,
        };

        // Best effort: metering must never fail the workflow.
        match store.get_course(&job.course_id).await {
            Ok(Some(course)) => {
                if let Err(e) = store.increment_usage(&course.user_id, &delta).await {
                    tracing::warn!(error = ?e, "Failed to update usage counters");
                }
            }
            Ok(None) => tracing::warn!("Course disappeared before usage accounting"),
            Err(e) => tracing::warn!(error = ?e, "Failed to load course for usage accounting"),
        }

        Ok(())
    })
    .await?;

    check_course_completion(store, &job.course_id).await
}

/// Flips the course to `completed` once no video remains outside a
/// terminal state. Failed videos count as terminal, so partial success
/// still completes the course.
///
/// Concurrent sibling workflows race to finish last; each one re-reads the
/// live count rather than trusting any cached value, so whichever instance
/// actually is last sees zero and flips the course.
pub async fn check_course_completion<D>(store: &D, course_id: &str) -> Result<(), WorkflowError>
where
    D: DataStore + Sync,
{
    let unfinished = store
        .count_videos_excluding(course_id, &[VideoStatus::Completed, VideoStatus::Failed])
        .await
        .map_err(WorkflowError::Retriable)?;

    if unfinished == 0 {
        store
            .update_course_status(course_id, CourseStatus::Completed)
            .await
            .map_err(WorkflowError::Retriable)?;
        tracing::info!(course_id, "All videos in a terminal state, course completed");
    }

    Ok(())
}
