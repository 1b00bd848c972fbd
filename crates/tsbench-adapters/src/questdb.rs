//! QuestDB adapter.
//!
//! Writes go to the HTTP line-protocol endpoint, one request per chunk. Reads
//! go through the pg-wire endpoint. The two halves come from a single
//! `ingest:::query` connection descriptor.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use tsbench_core::{Adapter, BackendKind, Chunk, Error, QueryReply, QueryRequest, Result};

use crate::config::{AdapterConfig, IngestAuth, QuestDbEndpoints};
use crate::encode;
use crate::error::BackendError;
use crate::pgwire::{PgSession, TimestampKind};
use crate::statements::{Statement, StatementTable};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS user_events (
        ssid SYMBOL,
        user_id SYMBOL,
        rssi DOUBLE,
        timestamp TIMESTAMP
    ) TIMESTAMP(timestamp) PARTITION BY DAY WAL
"#;

static STATEMENTS: StatementTable = [
    Statement::Text("SELECT MIN(timestamp), MAX(timestamp) FROM user_events"),
    Statement::Text("SELECT COUNT(*) FROM user_events"),
    Statement::Text("SELECT COUNT(DISTINCT user_id) FROM user_events"),
    Statement::Text("SELECT AVG(rssi) FROM user_events"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp < $1"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp > $1"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN $1 AND $2"),
    Statement::Text(
        "SELECT timestamp, COUNT(*) FROM user_events WHERE timestamp BETWEEN $1 AND $2 SAMPLE BY 1h LIMIT 24",
    ),
    Statement::Text(
        "SELECT user_id, COUNT(*) as count FROM user_events ORDER BY count DESC LIMIT 10",
    ),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE rssi > -50"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE rssi < -80"),
    Statement::Text("SELECT ssid, COUNT(*) as count FROM user_events ORDER BY count DESC LIMIT 10"),
    Statement::Text(
        "SELECT user_id, avg(rssi), min(rssi), max(rssi) FROM user_events ORDER BY avg DESC LIMIT 100",
    ),
    Statement::Text(
        "SELECT -approx_percentile(-rssi, 1.0-0.25) as q1, -approx_percentile(-rssi, 1.0-0.5) as median, -approx_percentile(-rssi, 1.0-0.75) as q3 FROM user_events",
    ),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN $1 AND $2"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN $1 AND $2"),
    Statement::Text(
        "SELECT hour(timestamp) as hour, COUNT(*) as count FROM user_events ORDER BY hour",
    ),
    Statement::Text(
        "SELECT timestamp, variance(rssi) as rssi_variance FROM user_events SAMPLE BY 1d LIMIT 30",
    ),
    Statement::Text(
        "SELECT timestamp, count FROM (SELECT timestamp, COUNT(*) as count FROM user_events SAMPLE BY 1h) ORDER BY count DESC LIMIT 5",
    ),
    Statement::Text(
        "SELECT user_id, max(timestamp) - min(timestamp) as session_duration FROM user_events ORDER BY session_duration DESC LIMIT 10",
    ),
];

pub struct QuestDbAdapter {
    http: Client,
    write_url: String,
    auth: IngestAuth,
    session: PgSession,
}

impl QuestDbAdapter {
    pub async fn connect(config: &AdapterConfig) -> Result<Self> {
        let endpoints = QuestDbEndpoints::parse(&config.connection)?;

        let http = Client::builder().build().map_err(Error::connect)?;
        let session = PgSession::connect(
            &endpoints.query_url,
            config.max_connections,
            &STATEMENTS,
            TimestampKind::Naive,
        )
        .await?;
        info!(
            backend = %BackendKind::Questdb,
            ingest = %endpoints.ingest_url,
            "Connected"
        );

        Ok(Self {
            http,
            write_url: format!("{}/write?precision=s", endpoints.ingest_url),
            auth: endpoints.ingest_auth,
            session,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            IngestAuth::None => request,
            IngestAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            IngestAuth::Bearer(token) => request.bearer_auth(token),
        }
    }
}

#[async_trait]
impl Adapter for QuestDbAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Questdb
    }

    async fn prepare(&mut self) -> Result<()> {
        self.session.execute_ddl(SCHEMA).await
    }

    async fn ingest_batch(&mut self, chunk: &Chunk) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let body = encode::line_protocol(chunk);
        let response = self
            .authorize(self.http.post(&self.write_url))
            .body(body)
            .send()
            .await
            .map_err(Error::ingest)?;

        if !response.status().is_success() {
            return Err(Error::ingest(BackendError::from_response(response).await));
        }
        debug!(rows = chunk.len(), "Line protocol batch accepted");
        Ok(())
    }

    async fn run_query(&mut self, request: &QueryRequest) -> Result<QueryReply> {
        self.session.run(request).await
    }

    async fn close(&mut self) -> Result<()> {
        self.session.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statements::assert_arity;

    #[test]
    fn test_schema_is_idempotent() {
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS user_events"));
    }

    #[test]
    fn test_statement_arity() {
        assert_arity(&STATEMENTS, |n| format!("${}", n));
    }

    #[test]
    fn test_every_query_supported() {
        assert!(STATEMENTS.iter().all(|s| *s != Statement::Unsupported));
    }

    #[test]
    fn test_windows_bound_by_caller() {
        for statement in &STATEMENTS {
            if let Statement::Text(text) = statement {
                assert!(!text.contains("dateadd"), "{}", text);
            }
        }
    }
}
