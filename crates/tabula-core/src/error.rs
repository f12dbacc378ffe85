use thiserror::Error;

/// Failure to turn untrusted suggestion text into rules or modifications.
///
/// Fatal to the one request it came from: the caller gets zero items and a
/// single message, never a partially ingested set. Individual array entries
/// with a bad shape are dropped silently before this error can arise.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("could not parse suggested rules")]
    MalformedSuggestion,
}

/// Settings file I/O failure.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings encode: {0}")]
    Json(#[from] serde_json::Error),
}
