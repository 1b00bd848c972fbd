//! ClickHouse adapter over the HTTP interface.
//!
//! Chunks are inserted as `JSONEachRow` with a running row id starting at 1.
//! Queries bind their time windows as server-side `DateTime64(6, 'UTC')`
//! parameters, so derived windows keep their sub-second part, and read the
//! result as `TabSeparated`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use tracing::{debug, info};
use tsbench_core::{
    Adapter, BackendKind, Chunk, Error, QueryId, QueryReply, QueryRequest, Result, TimeBounds,
};

use crate::config::{http_base_url, AdapterConfig, ClickHouseAuth};
use crate::encode;
use crate::error::BackendError;
use crate::statements::{lookup, Statement, StatementTable};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS user_events (
        id UInt64,
        user_id String,
        timestamp DateTime,
        rssi Float32,
        ssid String
    ) ENGINE = MergeTree()
    ORDER BY timestamp
"#;

/// First row id of a run.
const FIRST_ROW_ID: u64 = 1;

const INSERT: &str =
    "INSERT INTO user_events (id, user_id, timestamp, rssi, ssid) FORMAT JSONEachRow";

static STATEMENTS: StatementTable = [
    Statement::Text(
        "SELECT toUnixTimestamp(MIN(timestamp)), toUnixTimestamp(MAX(timestamp)), COUNT(*) FROM user_events",
    ),
    Statement::Text("SELECT COUNT(*) FROM user_events"),
    Statement::Text("SELECT COUNT(DISTINCT user_id) FROM user_events"),
    Statement::Text("SELECT AVG(rssi) FROM user_events"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp < {p1:DateTime64(6, 'UTC')}"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp > {p1:DateTime64(6, 'UTC')}"),
    Statement::Text(
        "SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN {p1:DateTime64(6, 'UTC')} AND {p2:DateTime64(6, 'UTC')}",
    ),
    Statement::Text(
        "SELECT toStartOfHour(timestamp) as hour, COUNT(*) FROM user_events WHERE timestamp BETWEEN {p1:DateTime64(6, 'UTC')} AND {p2:DateTime64(6, 'UTC')} GROUP BY hour ORDER BY hour",
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
        "SELECT quantile(0.25)(rssi) as q1, quantile(0.5)(rssi) as median, quantile(0.75)(rssi) as q3 FROM user_events",
    ),
    Statement::Text(
        "SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN {p1:DateTime64(6, 'UTC')} AND {p2:DateTime64(6, 'UTC')}",
    ),
    Statement::Text(
        "SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN {p1:DateTime64(6, 'UTC')} AND {p2:DateTime64(6, 'UTC')}",
    ),
    Statement::Text(
        "SELECT toHour(timestamp) as hour, COUNT(*) as count FROM user_events GROUP BY hour ORDER BY hour",
    ),
    Statement::Text(
        "SELECT toStartOfDay(timestamp) as day, varSamp(rssi) as rssi_variance FROM user_events GROUP BY day ORDER BY day LIMIT 30",
    ),
    Statement::Text(
        "SELECT toStartOfHour(timestamp) as hour, COUNT(*) as count FROM user_events GROUP BY hour ORDER BY count DESC LIMIT 5",
    ),
    Statement::Text(
        "SELECT user_id, MAX(timestamp) - MIN(timestamp) as session_duration FROM user_events GROUP BY user_id ORDER BY session_duration DESC LIMIT 10",
    ),
];

pub struct ClickHouseAdapter {
    http: Client,
    base_url: String,
    auth: ClickHouseAuth,
    next_id: u64,
}

impl ClickHouseAdapter {
    pub async fn connect(config: &AdapterConfig) -> Result<Self> {
        let http = Client::builder().build().map_err(Error::connect)?;
        let adapter = Self {
            http,
            base_url: http_base_url(&config.connection),
            auth: config.clickhouse.clone(),
            next_id: FIRST_ROW_ID,
        };

        let response = adapter
            .http
            .get(format!("{}/ping", adapter.base_url))
            .send()
            .await
            .map_err(Error::connect)?;
        if !response.status().is_success() {
            return Err(Error::connect(BackendError::from_response(response).await));
        }

        info!(backend = %BackendKind::Clickhouse, url = %adapter.base_url, "Connected");
        Ok(adapter)
    }

    fn post(&self) -> RequestBuilder {
        self.http
            .post(format!("{}/", self.base_url))
            .header("X-ClickHouse-User", &self.auth.user)
            .header("X-ClickHouse-Key", &self.auth.password)
            .header("X-ClickHouse-Database", &self.auth.database)
    }

    /// Send a request and return the body of a successful response.
    async fn send(request: RequestBuilder) -> std::result::Result<String, BackendError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(BackendError::from_response(response).await);
        }
        Ok(response.text().await?)
    }
}

/// Text form of a `DateTime64(6)` query parameter.
fn param_value(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Parse the `min\tmax\tcount` row returned by query 1.
fn parse_time_bounds(body: &str) -> std::result::Result<Option<TimeBounds>, BackendError> {
    let fields: Vec<&str> = body.trim().split('\t').collect();
    let [min, max, count] = fields.as_slice() else {
        return Err(BackendError::Response(format!(
            "expected three columns, got '{}'",
            body.trim()
        )));
    };

    let parse = |field: &str| {
        field
            .parse::<i64>()
            .map_err(|e| BackendError::Response(format!("bad integer '{}': {}", field, e)))
    };
    if parse(*count)? == 0 {
        return Ok(None);
    }

    let to_time = |secs: i64| {
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| BackendError::Response(format!("timestamp {} out of range", secs)))
    };
    Ok(Some(TimeBounds::new(
        to_time(parse(*min)?)?,
        to_time(parse(*max)?)?,
    )))
}

#[async_trait]
impl Adapter for ClickHouseAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Clickhouse
    }

    async fn prepare(&mut self) -> Result<()> {
        Self::send(self.post().body(SCHEMA))
            .await
            .map_err(Error::schema)?;
        Ok(())
    }

    async fn ingest_batch(&mut self, chunk: &Chunk) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let body = encode::json_each_row(chunk, self.next_id).map_err(Error::ingest)?;
        Self::send(self.post().query(&[("query", INSERT)]).body(body))
            .await
            .map_err(Error::ingest)?;

        self.next_id += chunk.len() as u64;
        debug!(rows = chunk.len(), next_id = self.next_id, "Inserted JSONEachRow batch");
        Ok(())
    }

    async fn run_query(&mut self, request: &QueryRequest) -> Result<QueryReply> {
        let text = match lookup(&STATEMENTS, request.id) {
            Statement::Text(text) => text,
            Statement::Unsupported => return Ok(QueryReply::Unsupported),
        };

        let params: Vec<(String, String)> = request
            .params
            .iter()
            .enumerate()
            .map(|(i, t)| (format!("param_p{}", i + 1), param_value(t)))
            .collect();

        let body = Self::send(
            self.post()
                .query(&params)
                .body(format!("{} FORMAT TabSeparated", text)),
        )
        .await
        .map_err(|e| Error::query(request.id, e))?;

        if request.id == QueryId::TIME_BOUNDS {
            let bounds = parse_time_bounds(&body).map_err(|e| Error::query(request.id, e))?;
            return Ok(QueryReply::TimeBounds(bounds));
        }

        Ok(QueryReply::Rows(body.lines().count() as u64))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
