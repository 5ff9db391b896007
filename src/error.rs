use thiserror::Error;

/// Failure talking to an upstream content source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed could not be parsed: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),
}

/// Failure obtaining a usable completion from the language model.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion contained no message")]
    EmptyResponse,
    #[error("completion is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("completion is not a JSON object")]
    NotAnObject,
}
