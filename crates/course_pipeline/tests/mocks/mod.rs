pub mod chat;
pub mod datastore;
pub mod playlist;
pub mod summarizer;
pub mod transcript;
