//! End-to-end runs of the benchmark runner against scripted adapters.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tsbench_core::{
    execute, Adapter, BackendKind, BenchmarkRunner, Chunk, ChunkReader, DatasetConfig, Error,
    Phase, QueryId, QueryOutcome, QueryReply, QueryRequest, Result, TimeBounds,
};

const T0: i64 = 1_700_000_000;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// Adapter that records every call and answers from a script.
struct StubAdapter {
    bounds: Option<TimeBounds>,
    unsupported: HashSet<u8>,
    raise_unsupported: bool,
    reject: HashSet<u8>,
    rows_for_bounds: bool,
    fail_ingest_at: Option<usize>,
    fail_query: Option<u8>,
    prepared: usize,
    chunk_sizes: Vec<usize>,
    requests: Vec<QueryRequest>,
    closed: usize,
}

impl StubAdapter {
    fn new() -> Self {
        Self {
            bounds: Some(TimeBounds::new(at(T0), at(T0) + Duration::seconds(7200))),
            unsupported: HashSet::new(),
            raise_unsupported: false,
            reject: HashSet::new(),
            rows_for_bounds: false,
            fail_ingest_at: None,
            fail_query: None,
            prepared: 0,
            chunk_sizes: Vec::new(),
            requests: Vec::new(),
            closed: 0,
        }
    }

    fn request(&self, id: u8) -> &QueryRequest {
        self.requests
            .iter()
            .find(|r| r.id.get() == id)
            .expect("query was not issued")
    }
}

#[async_trait]
impl Adapter for StubAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn prepare(&mut self) -> Result<()> {
        self.prepared += 1;
        Ok(())
    }

    async fn ingest_batch(&mut self, chunk: &Chunk) -> Result<()> {
        if self.fail_ingest_at == Some(chunk.index()) {
            return Err(Error::ingest("write rejected"));
        }
        self.chunk_sizes.push(chunk.len());
        Ok(())
    }

    async fn run_query(&mut self, request: &QueryRequest) -> Result<QueryReply> {
        let id = request.id.get();
        if self.fail_query == Some(id) {
            return Err(Error::query(request.id, "connection reset"));
        }
        if self.unsupported.contains(&id) {
            if self.raise_unsupported {
                return Err(Error::UnsupportedQuery(request.id));
            }
            return Ok(QueryReply::Unsupported);
        }
        self.requests.push(request.clone());
        if self.reject.contains(&id) {
            return Ok(QueryReply::Rejected("error calling function".to_string()));
        }
        if request.id == QueryId::TIME_BOUNDS && !self.rows_for_bounds {
            return Ok(QueryReply::TimeBounds(self.bounds));
        }
        Ok(QueryReply::Rows(1))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed += 1;
        Ok(())
    }
}

fn write_dataset(dir: &Path, chunk_sizes: &[usize]) {
    let mut offset = 0;
    for (index, size) in chunk_sizes.iter().enumerate() {
        let records: Vec<String> = (0..*size)
            .map(|i| {
                format!(
                    r#"{{"userId":"user-{}","lastUpdatedTime":{},"connection":{{"ssid":"ssid-{}","rssi":-55.0}}}}"#,
                    i % 2,
                    T0 + (offset + i) as i64 * 60,
                    i % 3
                )
            })
            .collect();
        offset += size;
        std::fs::write(
            dir.join(format!("readings_{}.json", index)),
            format!(r#"{{"response":[{}]}}"#, records.join(",")),
        )
        .unwrap();
    }
}

fn reader_for(dir: &Path) -> ChunkReader {
    ChunkReader::new(DatasetConfig::new(dir))
}

#[tokio::test]
async fn test_cumulative_ingestion_samples() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &[3, 2]);
    let mut adapter = StubAdapter::new();

    let mut runner = BenchmarkRunner::new(reader_for(dir.path()));
    let result = runner.run(&mut adapter).await.unwrap();

    let counts: Vec<u64> = result.ingestion().iter().map(|s| s.n_records).collect();
    assert_eq!(counts, vec![3, 5]);
    assert_eq!(adapter.chunk_sizes, vec![3, 2]);
    assert_eq!(adapter.prepared, 1);
    assert_eq!(runner.phase(), Phase::Done);
    result.validate().unwrap();
}

#[tokio::test]
async fn test_twenty_queries_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &[4]);
    let mut adapter = StubAdapter::new();

    let result = BenchmarkRunner::new(reader_for(dir.path()))
        .run(&mut adapter)
        .await
        .unwrap();

    let ids: Vec<u8> = result.queries().iter().map(|q| q.id.get()).collect();
    assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    let issued: Vec<u8> = adapter.requests.iter().map(|r| r.id.get()).collect();
    assert_eq!(issued, (1..=20).collect::<Vec<_>>());
    assert!(result.queries().iter().all(|q| q.duration_ms() >= 0));
}

#[tokio::test]
async fn test_dependent_queries_reuse_middle_time() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &[2]);
    let mut adapter = StubAdapter::new();

    BenchmarkRunner::new(reader_for(dir.path()))
        .run(&mut adapter)
        .await
        .unwrap();

    let t0 = at(T0);
    let middle = t0 + Duration::seconds(3600);
    assert_eq!(adapter.request(5).params, vec![middle]);
    assert_eq!(adapter.request(6).params, vec![middle]);
    assert_eq!(adapter.request(7).params, vec![t0, t0 + Duration::seconds(7200)]);
    assert_eq!(adapter.request(8).params, vec![middle, middle + Duration::hours(24)]);
    assert_eq!(adapter.request(15).params, vec![t0, middle]);
    assert_eq!(adapter.request(16).params, vec![middle, t0 + Duration::seconds(7200)]);
    assert!(adapter.request(2).params.is_empty());
}

#[tokio::test]
async fn test_unsupported_queries_carry_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &[3]);
    let unsupported: HashSet<u8> = [8, 14, 17, 18, 19, 20].into_iter().collect();

    for raise in [false, true] {
        let mut adapter = StubAdapter::new();
        adapter.unsupported = unsupported.clone();
        adapter.raise_unsupported = raise;

        let result = BenchmarkRunner::new(reader_for(dir.path()))
            .run(&mut adapter)
            .await
            .unwrap();

        assert_eq!(result.queries().len(), 20);
        for query in result.queries() {
            if unsupported.contains(&query.id.get()) {
                assert_eq!(query.outcome, QueryOutcome::Unsupported);
                assert_eq!(query.duration_ms(), -1);
            } else {
                assert!(query.outcome.is_measured(), "query {}", query.id);
                assert!(query.duration_ms() >= 0);
            }
        }
    }
}

#[tokio::test]
async fn test_rejected_queries_continue_run() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &[3]);
    let mut adapter = StubAdapter::new();
    adapter.reject = [14, 20].into_iter().collect();

    let result = BenchmarkRunner::new(reader_for(dir.path()))
        .run(&mut adapter)
        .await
        .unwrap();

    assert_eq!(result.queries().len(), 20);
    for id in [14, 20] {
        let query = result.query(QueryId::new(id).unwrap()).unwrap();
        assert!(matches!(&query.outcome, QueryOutcome::Failed(reason) if reason.contains("error calling")));
        assert_eq!(query.duration_ms(), -1);
    }
    let issued: Vec<u8> = adapter.requests.iter().map(|r| r.id.get()).collect();
    assert_eq!(issued, (1..=20).collect::<Vec<_>>());
    assert!(result.query(QueryId::new(15).unwrap()).unwrap().outcome.is_measured());
    result.validate().unwrap();
}

#[tokio::test]
async fn test_rows_for_time_bounds_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &[2]);
    let out = tempfile::tempdir().unwrap();
    let output = out.path().join("postgres_1.json");
    let mut adapter = StubAdapter::new();
    adapter.rows_for_bounds = true;

    let err = execute(reader_for(dir.path()), &mut adapter, &output)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Query { id, .. } if id == QueryId::TIME_BOUNDS));
    assert_eq!(adapter.requests.len(), 1);
    assert_eq!(adapter.closed, 1);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_empty_bounds_skip_dependent_queries() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &[1]);
    let mut adapter = StubAdapter::new();
    adapter.bounds = None;

    let result = BenchmarkRunner::new(reader_for(dir.path()))
        .run(&mut adapter)
        .await
        .unwrap();

    for query in result.queries() {
        if query.id.needs_time_bounds() {
            assert!(matches!(query.outcome, QueryOutcome::Failed(_)));
            assert_eq!(query.duration_ms(), -1);
        } else {
            assert!(query.outcome.is_measured());
        }
    }
    assert!(adapter.requests.iter().all(|r| !r.id.needs_time_bounds()));
}

#[tokio::test]
async fn test_ingest_failure_aborts_without_artifact() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &[2, 2, 2]);
    let out = tempfile::tempdir().unwrap();
    let output = out.path().join("postgres_1.json");
    let mut adapter = StubAdapter::new();
    adapter.fail_ingest_at = Some(1);

    let err = execute(reader_for(dir.path()), &mut adapter, &output)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Ingest(_)));
    assert_eq!(adapter.closed, 1);
    assert!(adapter.requests.is_empty());
    assert!(!output.exists());
}

#[tokio::test]
async fn test_query_error_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &[2]);
    let out = tempfile::tempdir().unwrap();
    let output = out.path().join("postgres_1.json");
    let mut adapter = StubAdapter::new();
    adapter.fail_query = Some(11);

    let err = execute(reader_for(dir.path()), &mut adapter, &output)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Query { .. }));
    assert_eq!(adapter.closed, 1);
    assert_eq!(adapter.requests.len(), 10);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_missing_dataset_fails_runner() {
    let dir = tempfile::tempdir().unwrap();
    let mut adapter = StubAdapter::new();
    let mut runner = BenchmarkRunner::new(reader_for(dir.path()));

    let err = runner.run(&mut adapter).await.unwrap_err();

    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(runner.phase(), Phase::Failed);
    assert!(runner.run(&mut adapter).await.is_err());
}

#[tokio::test]
async fn test_execute_writes_artifact_and_closes() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &[3, 2]);
    let out = tempfile::tempdir().unwrap();
    let output = tsbench_core::recorder::artifact_path(out.path(), BackendKind::Postgres, 1);
    let mut adapter = StubAdapter::new();
    adapter.unsupported = [8].into_iter().collect();

    let result = execute(reader_for(dir.path()), &mut adapter, &output)
        .await
        .unwrap();

    assert_eq!(adapter.closed, 1);
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["dbType"], "postgres");
    assert_eq!(written["ingestion"][1]["nRecords"], 5);
    assert_eq!(written["queries"].as_array().unwrap().len(), 20);
    assert_eq!(written["queries"][7]["durationMs"], -1);

    let reloaded = tsbench_core::recorder::read(&output).await.unwrap();
    reloaded.validate().unwrap();
    assert_eq!(reloaded.total_records(), result.total_records());
}
