//! # Course DataStore
//!
//! This module provides functionality for interacting with a Postgres
//! database to store and retrieve playlist-derived courses, their videos,
//! AI summaries and per-user usage counters.
//!
//! The module uses sqlx for database operations and provides an abstraction
//! layer (the [`DataStore`] trait) over the row-level CRUD the pipeline
//! workflows perform, so tests can substitute an in-memory fake.

mod datastore;
mod domain;

pub use datastore::postgres::PgDataStore;
pub use datastore::DataStore;
pub use domain::{
    Course, CourseMetadata, CourseStatus, NewCourse, NewSummary, NewVideo, Summary, TimestampNote,
    UsageCounter, UsageDelta, Video, VideoStatus,
};
