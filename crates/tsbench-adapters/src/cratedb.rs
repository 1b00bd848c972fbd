//! CrateDB adapter.
//!
//! CrateDB speaks the PostgreSQL wire protocol but has no `COPY FROM STDIN`,
//! so chunks go in as multi-row `INSERT` statements followed by a table
//! refresh that makes them visible to queries.

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};
use tsbench_core::{Adapter, BackendKind, Chunk, Error, QueryReply, QueryRequest, Result};

use crate::config::AdapterConfig;
use crate::pgwire::{PgSession, TimestampKind};
use crate::statements::{Statement, StatementTable};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS user_events (
        user_id TEXT NOT NULL,
        ts TIMESTAMP WITHOUT TIME ZONE NOT NULL,
        rssi FLOAT NOT NULL,
        ssid TEXT NOT NULL
    ) CLUSTERED BY (ts) INTO 4 SHARDS
"#;

const INSERT_PREFIX: &str = "INSERT INTO user_events (user_id, ts, rssi, ssid) ";

const REFRESH: &str = "REFRESH TABLE user_events";

static STATEMENTS: StatementTable = [
    Statement::Text("SELECT MIN(ts), MAX(ts) FROM user_events"),
    Statement::Text("SELECT COUNT(*) FROM user_events"),
    Statement::Text("SELECT COUNT(DISTINCT user_id) FROM user_events"),
    Statement::Text("SELECT AVG(rssi) FROM user_events"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE ts < $1"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE ts > $1"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE ts BETWEEN $1 AND $2"),
    Statement::Text(
        "SELECT date_trunc('hour', ts) as hour, COUNT(*) FROM user_events WHERE ts BETWEEN $1 AND $2 GROUP BY hour ORDER BY hour",
    ),
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
    Statement::Text(
        "SELECT percentile(rssi, 0.25), percentile(rssi, 0.5), percentile(rssi, 0.75) FROM user_events",
    ),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE ts BETWEEN $1 AND $2"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE ts BETWEEN $1 AND $2"),
    Statement::Text(
        "SELECT extract(hour from ts) as hour, COUNT(*) as count FROM user_events GROUP BY hour ORDER BY hour",
    ),
    Statement::Text(
        "SELECT date_trunc('day', ts) as day, variance(rssi) as rssi_variance FROM user_events GROUP BY day ORDER BY day LIMIT 30",
    ),
    Statement::Text(
        "SELECT date_trunc('hour', ts) as hour, COUNT(*) as count FROM user_events GROUP BY hour ORDER BY count DESC LIMIT 5",
    ),
    Statement::Text(
        "SELECT user_id, MAX(ts) - MIN(ts) as session_duration FROM user_events GROUP BY user_id ORDER BY session_duration DESC LIMIT 10",
    ),
];

pub struct CrateDbAdapter {
    session: PgSession,
    batch_rows: usize,
}

impl CrateDbAdapter {
    pub async fn connect(config: &AdapterConfig) -> Result<Self> {
        let session = PgSession::connect(
            &config.connection,
            config.max_connections,
            &STATEMENTS,
            TimestampKind::Naive,
        )
        .await?;
        info!(backend = %BackendKind::Cratedb, "Connected");

        Ok(Self {
            session,
            batch_rows: config.insert_batch_rows.max(1),
        })
    }
}

#[async_trait]
impl Adapter for CrateDbAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Cratedb
    }

    async fn prepare(&mut self) -> Result<()> {
        self.session.execute_ddl(SCHEMA).await
    }

    async fn ingest_batch(&mut self, chunk: &Chunk) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        for rows in chunk.events().chunks(self.batch_rows) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(INSERT_PREFIX);
            builder.push_values(rows, |mut row, event| {
                row.push_bind(event.user_id.as_str())
                    .push_bind(event.timestamp.naive_utc())
                    .push_bind(event.rssi)
                    .push_bind(event.ssid.as_str());
            });

            builder
                .build()
                .execute(self.session.pool())
                .await
                .map_err(Error::ingest)?;
            debug!(rows = rows.len(), "Inserted batch");
        }

        sqlx::query(REFRESH)
            .execute(self.session.pool())
            .await
            .map_err(Error::ingest)?;
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
