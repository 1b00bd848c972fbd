//! PostgreSQL and TimescaleDB adapter.
//!
//! Both backends share the wire protocol, the `COPY` ingestion path and the
//! `TIMESTAMPTZ` column. They differ in schema and in which queries the
//! statement table can express.

use async_trait::async_trait;
use sqlx::postgres::PgPoolCopyExt;
use tracing::{debug, info};
use tsbench_core::{Adapter, BackendKind, Chunk, Error, QueryReply, QueryRequest, Result};

use crate::config::AdapterConfig;
use crate::encode;
use crate::pgwire::{PgSession, TimestampKind};
use crate::statements::{Statement, StatementTable};
use crate::timescale;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS user_events (
        id BIGSERIAL,
        user_id VARCHAR(255) NOT NULL,
        timestamp TIMESTAMP WITH TIME ZONE NOT NULL,
        rssi REAL NOT NULL,
        ssid VARCHAR(255) NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_user_events_timestamp ON user_events (timestamp);
"#;

const COPY_STATEMENT: &str =
    "COPY user_events (user_id, timestamp, rssi, ssid) FROM STDIN WITH (FORMAT csv)";

/// Queries 8, 14 and 17-20 are left out for plain PostgreSQL.
static STATEMENTS: StatementTable = [
    Statement::Text("SELECT MIN(timestamp), MAX(timestamp) FROM user_events"),
    Statement::Text("SELECT COUNT(*) FROM user_events"),
    Statement::Text("SELECT COUNT(DISTINCT user_id) FROM user_events"),
    Statement::Text("SELECT AVG(rssi) FROM user_events"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp < $1"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp > $1"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN $1 AND $2"),
    Statement::Unsupported,
    Statement::Text(
        "SELECT user_id, COUNT(*) as count FROM user_events GROUP BY user_id ORDER BY count DESC LIMIT 10",
    ),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE rssi > -50"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE rssi < -80"),
    Statement::Text(
        "SELECT ssid, COUNT(*) as count FROM user_events GROUP BY ssid ORDER BY count DESC LIMIT 10",
    ),
    Statement::Text(
        "SELECT user_id, AVG(rssi), MIN(rssi), MAX(rssi) FROM user_events GROUP BY user_id ORDER BY AVG(rssi) DESC LIMIT 100",
    ),
    Statement::Unsupported,
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN $1 AND $2"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN $1 AND $2"),
    Statement::Unsupported,
    Statement::Unsupported,
    Statement::Unsupported,
    Statement::Unsupported,
];

/// Adapter for PostgreSQL-compatible backends that accept `COPY FROM STDIN`.
pub struct PostgresAdapter {
    kind: BackendKind,
    session: PgSession,
    schema: &'static str,
}

impl PostgresAdapter {
    /// Connect to plain PostgreSQL.
    pub async fn postgres(config: &AdapterConfig) -> Result<Self> {
        Self::connect(BackendKind::Postgres, config, &STATEMENTS, SCHEMA).await
    }

    /// Connect to TimescaleDB.
    pub async fn timescaledb(config: &AdapterConfig) -> Result<Self> {
        Self::connect(
            BackendKind::Timescaledb,
            config,
            &timescale::STATEMENTS,
            timescale::SCHEMA,
        )
        .await
    }

    async fn connect(
        kind: BackendKind,
        config: &AdapterConfig,
        statements: &'static StatementTable,
        schema: &'static str,
    ) -> Result<Self> {
        let session = PgSession::connect(
            &config.connection,
            config.max_connections,
            statements,
            TimestampKind::WithZone,
        )
        .await?;
        info!(backend = %kind, "Connected");

        Ok(Self {
            kind,
            session,
            schema,
        })
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn prepare(&mut self) -> Result<()> {
        self.session.execute_ddl(self.schema).await
    }

    async fn ingest_batch(&mut self, chunk: &Chunk) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let data = encode::copy_csv(chunk);
        let mut copy = self
            .session
            .pool()
            .copy_in_raw(COPY_STATEMENT)
            .await
            .map_err(Error::ingest)?;

        let sent = copy.send(data).await.map(|_| ());
        if let Err(e) = sent {
            let _ = copy.abort(e.to_string()).await;
            return Err(Error::ingest(e));
        }

        let rows = copy.finish().await.map_err(Error::ingest)?;
        debug!(backend = %self.kind, rows, "COPY finished");
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
