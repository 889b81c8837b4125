use std::str::FromStr;

use apalis::{
    layers::{retry::RetryPolicy, sentry::SentryLayer},
    prelude::*,
};
use apalis_cron::{CronStream, Tick};
use clap::{Parser, Subcommand};
use course_datastore::{CourseStatus, DataStore, NewCourse, PgDataStore};
use course_pipeline::{
    openai::OpenAIClient,
    tracing::init_tracing_subscriber,
    yt::{parse_playlist_id, playlist::YouTubeDataApi, transcript::TimedTextClient},
    CoursePipelineBuilder, Event, MapReduceSummarizer,
};
use cron::Schedule;

#[derive(Parser)]
#[command(name = "coursegen", about = "Playlist-to-course summarization pipeline")]
struct Cli {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: String,

    /// YouTube Data API key
    #[arg(long, env = "YOUTUBE_API_KEY")]
    youtube_key: String,

    /// Maximum videos to ingest per course
    #[arg(long, env = "MAX_VIDEOS_PER_COURSE", default_value = "50")]
    max_videos: usize,

    /// Concurrent video summarizations
    #[arg(long, env = "SUMMARIZE_CONCURRENCY", default_value = "5")]
    concurrency: usize,

    /// Language summaries are written in
    #[arg(long, env = "SUMMARY_LANGUAGE", default_value = "English")]
    language: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create (or reuse) a course for a playlist and run the pipeline once
    Ingest {
        /// Owner of the course
        #[arg(long)]
        user_id: String,

        /// Playlist URL or bare playlist id
        #[arg(long)]
        playlist: String,
    },
    /// Run the pipeline once for an existing course
    Process {
        #[arg(long)]
        course_id: String,
    },
    /// Start the cron scheduler; each tick picks up pending courses
    Cron {
        /// Cron schedule expression
        #[arg(long, env = "CRON_SCHEDULE", default_value = "0 */5 * * * *")]
        schedule: String,
    },
}

#[derive(Clone)]
struct Config {
    db_url: String,
    openai_key: String,
    youtube_key: String,
    max_videos: usize,
    concurrency: usize,
    language: String,
}

async fn run_pipeline(config: &Config, events: Vec<Event>) -> anyhow::Result<()> {
    let store = PgDataStore::init(&config.db_url).await?;

    let pipeline = CoursePipelineBuilder::new()
        .store(store)
        .playlist(YouTubeDataApi::new(&config.youtube_key))
        .transcripts(TimedTextClient::new())
        .summarizer(MapReduceSummarizer::new(OpenAIClient::new(
            &config.openai_key,
        )))
        .max_videos(config.max_videos)
        .concurrency(config.concurrency)
        .target_language(&config.language)
        .build();

    pipeline.run(events).await
}

async fn handle_tick(_tick: Tick, config: Data<Config>) -> anyhow::Result<()> {
    let store = PgDataStore::init(&config.db_url).await?;
    let pending = store.list_courses_by_status(CourseStatus::Pending).await?;

    if pending.is_empty() {
        tracing::info!("No pending courses at this time");
        return Ok(());
    }

    tracing::info!(count = pending.len(), "Processing pending courses...");
    let events = pending
        .into_iter()
        .map(|course| Event::CourseCreate {
            course_id: course.id,
        })
        .collect();

    run_pipeline(&config, events).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some("production".into()),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let config = Config {
        db_url: cli.database_url,
        openai_key: cli.openai_key,
        youtube_key: cli.youtube_key,
        max_videos: cli.max_videos,
        concurrency: cli.concurrency,
        language: cli.language,
    };

    match cli.command {
        Command::Ingest { user_id, playlist } => {
            let playlist_id = parse_playlist_id(&playlist).ok_or_else(|| {
                anyhow::anyhow!("Could not extract a playlist id from '{playlist}'")
            })?;
            let playlist_url = if playlist.starts_with("http") {
                playlist.clone()
            } else {
                format!("https://www.youtube.com/playlist?list={playlist_id}")
            };

            let store = PgDataStore::init(&config.db_url).await?;
            let course = store
                .create_course(&NewCourse {
                    user_id,
                    youtube_playlist_id: playlist_id,
                    playlist_url,
                })
                .await?;

            tracing::info!(course_id = %course.id, "Course ready, running pipeline...");
            run_pipeline(
                &config,
                vec![Event::CourseCreate {
                    course_id: course.id,
                }],
            )
            .await?;
        }
        Command::Process { course_id } => {
            tracing::info!(%course_id, "Running pipeline once...");
            run_pipeline(&config, vec![Event::CourseCreate { course_id }]).await?;
        }
        Command::Cron { schedule } => {
            tracing::info!(%schedule, "Starting cron scheduler...");
            let schedule = Schedule::from_str(&schedule)?;

            let worker = WorkerBuilder::new("coursegen-cron")
                .backend(CronStream::new(schedule))
                .retry(RetryPolicy::retries(3))
                .layer(SentryLayer::new())
                .data(config)
                .build(handle_tick);

            worker.run().await?;
        }
    }

    Ok(())
}
