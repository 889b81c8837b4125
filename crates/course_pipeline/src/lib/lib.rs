mod error;
mod llm;
pub mod parser;
mod pipeline;
pub mod tracing;
pub mod types;
pub mod workflow;
pub mod yt;

pub use error::Error;
pub use llm::openai;
pub use llm::{
    summarizer::{MapReduceSummarizer, Summarizer, SummaryOutput},
    ChatCompletion, ChatMessage, ChatReply, ChatRequest, ChatUsage,
};
pub use pipeline::{builder::CoursePipelineBuilder, CoursePipeline, PipelineConfig};
pub use workflow::{Event, SummarizeVideoJob, WorkflowError};
pub use yt::{
    PlaylistDirectory, PlaylistEntry, PlaylistMetadata, TranscriptError, TranscriptSource,
};
