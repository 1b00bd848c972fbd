//! Benchmark execution engine for comparing storage backends.
//!
//! A run streams a chunked dataset into one backend through an [`Adapter`],
//! timing each chunk, then executes the fixed catalogue of twenty queries in
//! order and records a backend-agnostic [`BenchmarkResult`].
//!
//! # Components
//!
//! - [`ChunkReader`]: decodes `readings_<n>.json` chunk files in order
//! - [`Adapter`]: schema setup, batched ingestion and query execution for one backend
//! - [`BenchmarkRunner`]: the `Ingesting -> Querying -> Done` state machine
//! - [`recorder`]: writes one JSON artifact per run

pub mod adapter;
pub mod backend;
pub mod dataset;
pub mod error;
pub mod event;
pub mod query;
pub mod recorder;
pub mod result;
pub mod runner;

pub use adapter::{Adapter, QueryReply};
pub use backend::BackendKind;
pub use dataset::{ChunkReader, DatasetConfig, LoadedChunk};
pub use error::{BoxError, Error, Result};
pub use event::{Chunk, Event};
pub use query::{QueryId, QueryRequest, TimeBounds, TimeParams, TimeWindows, QUERY_COUNT};
pub use result::{
    BenchmarkResult, IngestionSample, QueryOutcome, QueryResult, SENTINEL_DURATION_MS,
};
pub use runner::{execute, BenchmarkRunner, Phase};
