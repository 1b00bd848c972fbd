//! The capability set every backend adapter implements.

use async_trait::async_trait;

use crate::backend::BackendKind;
use crate::error::Result;
use crate::event::Chunk;
use crate::query::{QueryRequest, TimeBounds};

/// What an adapter observed while running a query.
///
/// Timing is taken by the runner around [`Adapter::run_query`]; the reply
/// only says how the query ended.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryReply {
    /// The result set was fully consumed.
    Rows(u64),
    /// Query 1 completed. `None` when the dataset is empty.
    TimeBounds(Option<TimeBounds>),
    /// The backend's query language cannot express this query. The adapter
    /// must answer this without contacting the backend.
    Unsupported,
    /// The backend evaluated the request and rejected it as a query-language
    /// error. Connection and server failures are errors, not rejections.
    Rejected(String),
}

/// A live session against one storage engine.
///
/// Callers never branch on backend identity outside adapter construction;
/// everything the runner needs goes through these operations. Calls are made
/// strictly one at a time.
#[async_trait]
pub trait Adapter: Send {
    /// Backend this adapter talks to.
    fn kind(&self) -> BackendKind;

    /// Create the target table or measurement if it does not exist.
    ///
    /// Must be idempotent. A rejected definition is a
    /// [`Error::Schema`](crate::Error::Schema).
    async fn prepare(&mut self) -> Result<()>;

    /// Write every event in `chunk` and flush, so that returning means the
    /// backend acknowledged the data. Failures are
    /// [`Error::Ingest`](crate::Error::Ingest); nothing is retried.
    async fn ingest_batch(&mut self, chunk: &Chunk) -> Result<()>;

    /// Run one catalogue query and consume its full result.
    async fn run_query(&mut self, request: &QueryRequest) -> Result<QueryReply>;

    /// Release the connection. Called exactly once, after the run ends.
    async fn close(&mut self) -> Result<()>;
}

