use std::path::PathBuf;

/// Failure talking to the remote mailbox.
#[derive(Debug, thiserror::Error)]
pub enum ExternalServiceError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure reading or writing checkpoint storage.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointIoError {
    #[error("checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint {path} is not a JSON list of ids: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Service(#[from] ExternalServiceError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointIoError),
    #[error("output file {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("output file {path} has columns that do not match {expected}")]
    HeaderMismatch { path: PathBuf, expected: PathBuf },
    #[error("resume confirmation failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

impl ExportError {
    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Output {
            path: path.into(),
            source,
        }
    }
}
