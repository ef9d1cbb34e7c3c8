// src/error.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the snapshot cache, resolver and convergence protocol.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed NEVRA or version string. Resolvers downgrade this to an
    /// empty per-entry result; it never fails a whole batch.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Network or storage failure while retrieving a new snapshot artifact.
    /// The previous snapshot stays live.
    #[error("Download error: {0}")]
    DownloadError(String),

    /// The artifact was fetched but is unparsable or internally inconsistent.
    /// The reload is aborted and the previous snapshot stays live.
    #[error("Corrupt snapshot artifact: {0}")]
    CorruptArtifact(String),

    /// A convergence protocol peer disconnected or timed out.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// No snapshot has been loaded yet; the process is not ready to answer.
    #[error("No snapshot loaded")]
    NotReady,

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::CorruptArtifact(err.to_string())
    }
}
