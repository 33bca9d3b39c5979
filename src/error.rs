use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Cannot access {}: {source}", .path.display())]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{action} for {target} failed with HTTP code {status}")]
    HttpStatus {
        action: &'static str,
        target: String,
        status: u16,
    },

    #[error("Malformed JSON in {}: {source}", .path.display())]
    MalformedJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{} of {total} deletions failed: {}", .failed.len(), .failed.join(", "))]
    PartialFailure { failed: Vec<String>, total: usize },
}

impl DeployError {
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeployError::FileSystem {
            path: path.into(),
            source,
        }
    }

    pub fn status(action: &'static str, target: impl Into<String>, status: u16) -> Self {
        DeployError::HttpStatus {
            action,
            target: target.into(),
            status,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
