//! Error types

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Application errors for the scraping, processing, embedding and serving
/// stages.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The configuration file could not be loaded or extracted.
    #[error("could not load configuration")]
    Config(#[source] Box<figment::Error>),
    /// An operation in the `lerobert` crate failed.
    #[error("dictionary error")]
    Dictionary(#[from] lerobert::Error),
    /// A filesystem operation failed.
    #[error("i/o error on {path}", path = .path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A JSON store could not be read or written.
    #[error("invalid JSON in {path}", path = .path.display())]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The embedding inference service misbehaved.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),
    /// A batch worker panicked or was cancelled.
    #[error("batch worker failed")]
    Join(#[source] tokio::task::JoinError),
    /// A persisted example id does not match its positional index; the
    /// cached document is corrupt and must be reprocessed.
    #[error("example id {found} does not match expected {expected} in {document}")]
    ExampleIndexMismatch {
        /// The document id.
        document: String,
        /// The expected running counter value.
        expected: u32,
        /// The persisted id.
        found: u32,
    },
    /// The HTTP server failed to bind or serve.
    #[error("server error")]
    Server(#[source] std::io::Error),
    /// The listen address is invalid.
    #[error("invalid listen address {0:?}")]
    ListenAddress(String),
}
