use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a fetch collaborator (network, auth, bad payload).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected response from {url}: {message}")]
    Payload { url: String, message: String },
}

/// Storage-format body that could not be turned into a tree.
#[derive(Debug, Error)]
#[error("malformed markup at byte {position}: {message}")]
pub struct TranspileError {
    pub position: u64,
    pub message: String,
}

/// Errors surfaced by the export pipeline.
///
/// Only [`ExportError::OutputRoot`] aborts a space; everything else is scoped to a
/// single document or attachment and is logged and counted instead of propagated.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot create output directory {path}: {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("attachment {filename} could not be retrieved from any candidate address")]
    AttachmentUnresolved { filename: String },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ExportError {
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Write {
            path: path.into(),
            source,
        }
    }
}
