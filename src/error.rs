//! Error taxonomy for the limits editing workflow

use std::path::PathBuf;

use crate::pipeline::CommitStage;

#[derive(thiserror::Error, Debug)]
pub enum LimitsError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("limit '{key}' has no integer '{field}'")]
    MissingField { key: String, field: String },

    #[error("expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("staged edit belongs to session {owner}, not {requested}")]
    Conflict { owner: String, requested: String },

    #[error("commit step requires stage {expected:?}, pipeline is at {actual:?}")]
    OutOfOrder {
        expected: CommitStage,
        actual: CommitStage,
    },

    #[error("failed to fetch live limits from {url}: {message}")]
    Live { url: String, message: String },

    #[error(
        "live limit for '{key}' still {observed:?} after {attempts} attempts (wanted {expected}); reload the config manually"
    )]
    ReconciliationExhausted {
        key: String,
        expected: i64,
        observed: Option<i64>,
        attempts: u32,
    },
}

impl LimitsError {
    /// Map an io error on `path`, turning a missing file into `NotFound`
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            LimitsError::NotFound { path }
        } else {
            LimitsError::Io { path, source }
        }
    }

    pub(crate) fn missing(key: &str, field: &str) -> Self {
        LimitsError::MissingField {
            key: key.to_string(),
            field: field.to_string(),
        }
    }
}

pub type LimitsResult<T> = std::result::Result<T, LimitsError>;
