//! Benchmark runner.
//!
//! A run moves through `Ingesting -> Querying -> Done` and never backwards.
//! Any fatal error moves it to `Failed` and no artifact is produced.

use std::path::Path;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::adapter::{Adapter, QueryReply};
use crate::dataset::{ChunkReader, LoadedChunk};
use crate::error::{Error, Result};
use crate::query::{QueryId, QueryRequest, TimeWindows};
use crate::recorder;
use crate::result::{BenchmarkResult, IngestionSample, QueryOutcome, QueryResult};

/// Runner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ingesting,
    Querying,
    Done,
    Failed,
}

/// Drives one run against one adapter and builds its result.
#[derive(Debug)]
pub struct BenchmarkRunner {
    reader: ChunkReader,
    phase: Phase,
}

impl BenchmarkRunner {
    pub fn new(reader: ChunkReader) -> Self {
        Self {
            reader,
            phase: Phase::Ingesting,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Prepare the schema, ingest every chunk, then run the twenty queries.
    pub async fn run<A: Adapter + ?Sized>(&mut self, adapter: &mut A) -> Result<BenchmarkResult> {
        if self.phase != Phase::Ingesting {
            return Err(Error::Config(format!(
                "runner cannot start from phase {:?}",
                self.phase
            )));
        }

        match self.run_phases(adapter).await {
            Ok(result) => {
                self.phase = Phase::Done;
                Ok(result)
            }
            Err(e) => {
                error!(phase = ?self.phase, error = %e, "Benchmark run failed");
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    async fn run_phases<A: Adapter + ?Sized>(&mut self, adapter: &mut A) -> Result<BenchmarkResult> {
        let mut result = BenchmarkResult::new(adapter.kind());

        info!(backend = %adapter.kind(), "Preparing schema");
        adapter.prepare().await?;

        self.ingest(adapter, &mut result).await?;

        self.phase = Phase::Querying;
        self.query(adapter, &mut result).await?;

        Ok(result)
    }

    async fn ingest<A: Adapter + ?Sized>(
        &mut self,
        adapter: &mut A,
        result: &mut BenchmarkResult,
    ) -> Result<()> {
        let mut index = 0;
        let mut total: u64 = 0;

        loop {
            let LoadedChunk { has_more, chunk } = self.reader.read(index).await?;

            let start = Instant::now();
            adapter.ingest_batch(&chunk).await?;
            let elapsed = start.elapsed();

            total += chunk.len() as u64;
            result.push_ingestion(IngestionSample::new(elapsed, total));
            info!(
                chunk = index,
                records = chunk.len(),
                total,
                elapsed_ms = elapsed.as_millis() as u64,
                "Ingested chunk"
            );

            if !has_more {
                break;
            }
            index += 1;
        }

        info!(chunks = index + 1, records = total, "Ingestion complete");
        Ok(())
    }

    async fn query<A: Adapter + ?Sized>(
        &mut self,
        adapter: &mut A,
        result: &mut BenchmarkResult,
    ) -> Result<()> {
        let mut windows: Option<TimeWindows> = None;

        for id in QueryId::all() {
            let outcome = self.run_query(adapter, id, &mut windows).await?;
            match &outcome {
                QueryOutcome::Measured(elapsed) => info!(
                    query_id = id.get(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Done with query"
                ),
                QueryOutcome::Unsupported => {
                    warn!(query_id = id.get(), "Query not supported by backend")
                }
                QueryOutcome::Failed(reason) => {
                    warn!(query_id = id.get(), reason = %reason, "Query not measured")
                }
            }
            result.push_query(QueryResult::new(id, outcome));
        }

        Ok(())
    }

    async fn run_query<A: Adapter + ?Sized>(
        &self,
        adapter: &mut A,
        id: QueryId,
        windows: &mut Option<TimeWindows>,
    ) -> Result<QueryOutcome> {
        let Some(request) = QueryRequest::resolve(id, windows.as_ref()) else {
            return Ok(QueryOutcome::Failed(
                "time bounds unavailable from query 1".to_string(),
            ));
        };

        info!(query_id = id.get(), description = id.description(), "Running query");
        let start = Instant::now();
        let reply = match adapter.run_query(&request).await {
            Ok(reply) => reply,
            Err(Error::UnsupportedQuery(_)) => QueryReply::Unsupported,
            Err(e) => return Err(e),
        };
        let elapsed = start.elapsed();

        if id == QueryId::TIME_BOUNDS {
            match &reply {
                QueryReply::TimeBounds(Some(bounds)) => {
                    let derived = TimeWindows::from_bounds(*bounds);
                    info!(
                        min = %derived.bounds.min,
                        max = %derived.bounds.max,
                        middle = %derived.middle,
                        "Derived query time windows"
                    );
                    *windows = Some(derived);
                }
                QueryReply::TimeBounds(None) => warn!("Dataset has no time bounds"),
                QueryReply::Rows(_) => {
                    return Err(Error::query(id, "backend did not return time bounds"));
                }
                QueryReply::Unsupported | QueryReply::Rejected(_) => {}
            }
        }

        Ok(match reply {
            QueryReply::Rows(_) | QueryReply::TimeBounds(_) => QueryOutcome::Measured(elapsed),
            QueryReply::Unsupported => QueryOutcome::Unsupported,
            QueryReply::Rejected(reason) => QueryOutcome::Failed(reason),
        })
    }
}

/// Run a full benchmark and record its artifact at `output`.
///
/// The adapter is closed exactly once whether the run succeeds or fails.
/// Nothing is written for a failed run.
pub async fn execute<A: Adapter + ?Sized>(
    reader: ChunkReader,
    adapter: &mut A,
    output: &Path,
) -> Result<BenchmarkResult> {
    let mut runner = BenchmarkRunner::new(reader);
    let outcome = runner.run(adapter).await;

    if let Err(e) = adapter.close().await {
        warn!(backend = %adapter.kind(), error = %e, "Failed to close backend connection");
    }

    let result = outcome?;
    recorder::write(output, &result).await?;
    Ok(result)
}
