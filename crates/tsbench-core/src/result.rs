//! Benchmark result records and their artifact encoding.

use std::time::Duration;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::backend::BackendKind;
use crate::error::{Error, Result};
use crate::query::{QueryId, QUERY_COUNT};

/// Duration written for a query that produced no measurement.
pub const SENTINEL_DURATION_MS: i64 = -1;

/// Time spent ingesting one chunk and the running record total after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSample {
    pub duration_ms: i64,
    /// Cumulative record count, not the chunk size.
    pub n_records: u64,
}

impl IngestionSample {
    pub fn new(duration: Duration, n_records: u64) -> Self {
        Self {
            duration_ms: duration_to_ms(duration),
            n_records,
        }
    }
}

/// How a single query ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Round-trip time including full consumption of the result.
    Measured(Duration),
    /// The backend's query language cannot express the operation.
    Unsupported,
    /// The query was not measured; the reason is kept for logs only.
    Failed(String),
}

impl QueryOutcome {
    /// Artifact encoding: milliseconds, or the sentinel.
    pub fn duration_ms(&self) -> i64 {
        match self {
            QueryOutcome::Measured(elapsed) => duration_to_ms(*elapsed),
            QueryOutcome::Unsupported | QueryOutcome::Failed(_) => SENTINEL_DURATION_MS,
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, QueryOutcome::Measured(_))
    }
}

/// Outcome of one catalogue query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub id: QueryId,
    pub outcome: QueryOutcome,
    pub description: String,
}

impl QueryResult {
    pub fn new(id: QueryId, outcome: QueryOutcome) -> Self {
        Self {
            id,
            outcome,
            description: id.description().to_string(),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.outcome.duration_ms()
    }
}

impl Serialize for QueryResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("QueryResult", 3)?;
        state.serialize_field("queryId", &self.id)?;
        state.serialize_field("durationMs", &self.duration_ms())?;
        state.serialize_field("description", &self.description)?;
        state.end()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRecord {
    query_id: QueryId,
    duration_ms: i64,
    description: String,
}

impl<'de> Deserialize<'de> for QueryResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = QueryRecord::deserialize(deserializer)?;
        // Prior artifacts do not distinguish unsupported from failed.
        let outcome = match u64::try_from(record.duration_ms) {
            Ok(ms) => QueryOutcome::Measured(Duration::from_millis(ms)),
            Err(_) => QueryOutcome::Unsupported,
        };
        Ok(QueryResult {
            id: record.query_id,
            outcome,
            description: record.description,
        })
    }
}

/// Everything measured in one run against one backend.
///
/// Only the runner appends to a result; once handed to the recorder it is
/// read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    db_type: BackendKind,
    ingestion: Vec<IngestionSample>,
    queries: Vec<QueryResult>,
}

impl BenchmarkResult {
    pub(crate) fn new(db_type: BackendKind) -> Self {
        Self {
            db_type,
            ingestion: Vec::new(),
            queries: Vec::with_capacity(usize::from(QUERY_COUNT)),
        }
    }

    pub(crate) fn push_ingestion(&mut self, sample: IngestionSample) {
        self.ingestion.push(sample);
    }

    pub(crate) fn push_query(&mut self, result: QueryResult) {
        self.queries.push(result);
    }

    pub fn db_type(&self) -> BackendKind {
        self.db_type
    }

    pub fn ingestion(&self) -> &[IngestionSample] {
        &self.ingestion
    }

    pub fn queries(&self) -> &[QueryResult] {
        &self.queries
    }

    /// Total records ingested over the run.
    pub fn total_records(&self) -> u64 {
        self.ingestion.last().map_or(0, |sample| sample.n_records)
    }

    /// Result for `id`, if recorded.
    pub fn query(&self, id: QueryId) -> Option<&QueryResult> {
        self.queries.get(id.index()).filter(|result| result.id == id)
    }

    /// Check the invariants of a completed run: exactly twenty queries with
    /// ids `1..=20` in order, and a non-decreasing cumulative record count.
    pub fn validate(&self) -> Result<()> {
        if self.queries.len() != usize::from(QUERY_COUNT) {
            return Err(Error::Config(format!(
                "expected {} query results, found {}",
                QUERY_COUNT,
                self.queries.len()
            )));
        }
        for (expected, result) in QueryId::all().zip(&self.queries) {
            if result.id != expected {
                return Err(Error::Config(format!(
                    "query result {} found where {} was expected",
                    result.id, expected
                )));
            }
            if result.duration_ms() < SENTINEL_DURATION_MS {
                return Err(Error::Config(format!(
                    "query {} has invalid duration {}",
                    result.id,
                    result.duration_ms()
                )));
            }
        }
        if let Some(pair) = self
            .ingestion
            .windows(2)
            .find(|pair| pair[1].n_records < pair[0].n_records)
        {
            return Err(Error::Config(format!(
                "cumulative record count decreased from {} to {}",
                pair[0].n_records, pair[1].n_records
            )));
        }
        Ok(())
    }
}

fn duration_to_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
