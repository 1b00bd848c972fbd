//! Benchmark error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::query::QueryId;

/// Boxed source error raised by a backend driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort a benchmark run.
///
/// Only [`Error::UnsupportedQuery`] is recovered, and only by the runner while
/// querying: it becomes a sentinel [`QueryResult`](crate::QueryResult).
#[derive(Debug, Error)]
pub enum Error {
    /// Chunk file or result artifact could not be read or written.
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Chunk file content is not a valid readings document.
    #[error("malformed chunk {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A record parsed but carries a value that cannot become an event.
    #[error("invalid record {position} in {}: {reason}", .path.display())]
    InvalidRecord {
        path: PathBuf,
        position: usize,
        reason: String,
    },

    /// Backend connection could not be established.
    #[error("connection error: {0}")]
    Connect(#[source] BoxError),

    /// Backend rejected the schema definition.
    #[error("schema setup failed: {0}")]
    Schema(#[source] BoxError),

    /// Backend rejected a write during ingestion.
    #[error("ingestion failed: {0}")]
    Ingest(#[source] BoxError),

    /// Backend cannot express the query at all.
    #[error("query {0} is not supported by this backend")]
    UnsupportedQuery(QueryId),

    /// Backend or connection failure while running a query.
    #[error("query {id} failed: {source}")]
    Query {
        id: QueryId,
        #[source]
        source: BoxError,
    },

    /// Invalid configuration or connection descriptor.
    #[error("configuration error: {0}")]
    Config(String),

    /// Result artifact could not be encoded.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a driver error raised while creating the schema.
    pub fn schema(source: impl Into<BoxError>) -> Self {
        Error::Schema(source.into())
    }

    /// Wrap a driver error raised while writing a chunk.
    pub fn ingest(source: impl Into<BoxError>) -> Self {
        Error::Ingest(source.into())
    }

    /// Wrap a driver error raised while connecting.
    pub fn connect(source: impl Into<BoxError>) -> Self {
        Error::Connect(source.into())
    }

    /// Wrap a driver error raised by query `id`.
    pub fn query(id: QueryId, source: impl Into<BoxError>) -> Self {
        Error::Query {
            id,
            source: source.into(),
        }
    }
}

/// Result type for benchmark operations.
pub type Result<T> = std::result::Result<T, Error>;
