/// Errors produced while parsing collaborator payloads (model replies,
/// watch-page documents).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    ParseError(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
