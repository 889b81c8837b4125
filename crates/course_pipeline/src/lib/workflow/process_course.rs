use course_datastore::{Course, CourseMetadata, CourseStatus, DataStore, NewVideo, UsageDelta};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    pipeline::PipelineConfig,
    workflow::{
        step::{run_step, StepLedger},
        Event, SummarizeVideoJob, WorkflowError,
    },
    yt::{PlaylistDirectory, PlaylistEntry, PlaylistMetadata},
};

/// The fields fan-out needs per upserted video row.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FanOutVideo {
    video_id: String,
    youtube_video_id: String,
    title: String,
}

/// Playlist-processing workflow, triggered by a `course.create` event.
///
/// Resolves the course, persists playlist metadata, upserts one video row
/// per playlist entry and emits a `video.summarize` event for each. The
/// course is deliberately left in `processing`; completion is decided
/// asynchronously by the per-video workflow as siblings finish.
#[tracing::instrument(skip(store, playlist, ledger, events, config))]
pub async fn process_course<D, P>(
    store: &D,
    playlist: &P,
    ledger: &dyn StepLedger,
    events: &UnboundedSender<Event>,
    config: &PipelineConfig,
    course_id: &str,
) -> Result<(), WorkflowError>
where
    D: DataStore + Sync,
    P: PlaylistDirectory + Sync,
{
    if course_id.is_empty() {
        return Err(WorkflowError::NonRetriable("course id is missing".into()));
    }

    let instance = format!("course.process:{course_id}");

    let course: Course = run_step(ledger, &instance, "fetch-course", || async {
        store
            .get_course(course_id)
            .await
            .map_err(WorkflowError::Retriable)?
            .ok_or_else(|| WorkflowError::NonRetriable(format!("course {course_id} not found")))
    })
    .await?;

    run_step(ledger, &instance, "mark-processing", || async {
        if course.status == CourseStatus::Processing {
            // An earlier attempt already got here.
            return Ok(());
        }
        if !course.status.can_transition_to(CourseStatus::Processing) {
            tracing::warn!(status = %course.status, "Re-processing course from a terminal state");
        }
        store
            .update_course_status(course_id, CourseStatus::Processing)
            .await
            .map_err(WorkflowError::Retriable)
    })
    .await?;

    let metadata: PlaylistMetadata =
        run_step(ledger, &instance, "fetch-playlist-metadata", || async {
            playlist
                .fetch_playlist_metadata(&course.youtube_playlist_id)
                .await
                .map_err(|e| {
                    WorkflowError::Retriable(anyhow::anyhow!(
                        "Failed to fetch playlist metadata: {e:?}"
                    ))
                })
        })
        .await?;

    run_step(ledger, &instance, "persist-playlist-metadata", || async {
        store
            .update_course_metadata(
                course_id,
                &CourseMetadata {
                    title: metadata.title.clone(),
                    description: metadata.description.clone(),
                    thumbnail_url: metadata.thumbnail_url.clone(),
                    channel_id: metadata.channel_id.clone(),
                    channel_title: metadata.channel_title.clone(),
                    video_count: metadata.total_videos,
                },
            )
            .await
            .map_err(WorkflowError::Retriable)
    })
    .await?;

    let entries: Vec<PlaylistEntry> =
        run_step(ledger, &instance, "fetch-playlist-videos", || async {
            playlist
                .fetch_playlist_videos(&course.youtube_playlist_id, config.max_videos)
                .await
                .map_err(|e| {
                    WorkflowError::Retriable(anyhow::anyhow!(
                        "Failed to fetch playlist videos: {e:?}"
                    ))
                })
        })
        .await?;

    let videos: Vec<FanOutVideo> = run_step(ledger, &instance, "upsert-videos", || async {
        let mut upserted = Vec::with_capacity(entries.len());

        for entry in &entries {
            // Look up by natural key first so a retried step (or a
            // re-ingested playlist) reuses the existing row.
            let existing = store
                .find_video_by_youtube_id(course_id, &entry.youtube_video_id)
                .await
                .map_err(WorkflowError::Retriable)?;

            let video = match existing {
                Some(video) => video,
                None => store
                    .insert_video(&NewVideo {
                        course_id: course_id.to_string(),
                        youtube_video_id: entry.youtube_video_id.clone(),
                        title: entry.title.clone(),
                        description: entry.description.clone(),
                        thumbnail_url: entry.thumbnail_url.clone(),
                        position: entry.position,
                    })
                    .await
                    .map_err(WorkflowError::Retriable)?,
            };

            upserted.push(FanOutVideo {
                video_id: video.id,
                youtube_video_id: entry.youtube_video_id.clone(),
                title: entry.title.clone(),
            });
        }

        Ok(upserted)
    })
    .await?;

    run_step(ledger, &instance, "fan-out-videos", || async {
        if videos.is_empty() {
            // Nothing to summarize; the course completes vacuously.
            tracing::info!("Playlist has no processable videos, completing course");
            return store
                .update_course_status(course_id, CourseStatus::Completed)
                .await
                .map_err(WorkflowError::Retriable);
        }

        for video in &videos {
            events
                .send(Event::VideoSummarize(SummarizeVideoJob {
                    course_id: course_id.to_string(),
                    video_id: video.video_id.clone(),
                    youtube_video_id: video.youtube_video_id.clone(),
                    video_title: video.title.clone(),
                    target_language: config.target_language.clone(),
                }))
                .map_err(|e| {
                    WorkflowError::Retriable(anyhow::anyhow!("Failed to enqueue video event: {e}"))
                })?;
        }

        tracing::info!(count = videos.len(), "Fanned out video summarization");
        Ok(())
    })
    .await?;

    run_step(ledger, &instance, "record-usage", || async {
        let delta = UsageDelta {
            playlists_processed: 1,
            ..Default::default()
        };
        // Best effort: metering must never fail the workflow.
        if let Err(e) = store.increment_usage(&course.user_id, &delta).await {
            tracing::warn!(error = ?e, "Failed to update usage counters");
        }
        Ok(())
    })
    .await?;

    Ok(())
}
