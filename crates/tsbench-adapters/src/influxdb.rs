//! InfluxDB v2 adapter.
//!
//! Writes go to `/api/v2/write` as line protocol. Queries are Flux scripts
//! posted to `/api/v2/query` and answered as CSV without annotations. A script the
//! server refuses to evaluate is reported as a rejection rather than an error.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tsbench_core::{
    Adapter, BackendKind, Chunk, Error, QueryId, QueryReply, QueryRequest, Result, TimeBounds,
};

use crate::config::{http_base_url, AdapterConfig, InfluxSettings};
use crate::encode;
use crate::error::BackendError;
use crate::statements::{lookup, Statement, StatementTable};

static STATEMENTS: StatementTable = [
    Statement::Text(
        r#"data = from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> keep(columns: ["_time"])
  |> group()
data |> min(column: "_time") |> yield(name: "min")
data |> max(column: "_time") |> yield(name: "max")"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
  |> count()"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
  |> distinct(column: "user_id")
  |> count()"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
  |> mean()"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y, stop: {p1})
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
  |> count()"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: {p1})
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
  |> count()"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: {p1}, stop: {p2})
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
  |> count()"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: {p1}, stop: {p2})
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
  |> aggregateWindow(every: 1h, fn: count)"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group(columns: ["user_id"])
  |> count()
  |> group()
  |> top(n: 10)"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi" and r._value > -50.0)
  |> group()
  |> count()"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi" and r._value < -80.0)
  |> group()
  |> count()"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group(columns: ["ssid"])
  |> count()
  |> group()
  |> top(n: 10)"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group(columns: ["user_id"])
  |> mean()
  |> group()
  |> top(n: 100)"#,
    ),
    Statement::Text(
        r#"data = from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
data |> quantile(q: 0.25, method: "estimate_tdigest") |> yield(name: "q1")
data |> quantile(q: 0.5, method: "estimate_tdigest") |> yield(name: "median")
data |> quantile(q: 0.75, method: "estimate_tdigest") |> yield(name: "q3")"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: {p1}, stop: {p2})
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
  |> count()"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: {p1}, stop: {p2})
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
  |> count()"#,
    ),
    Statement::Text(
        r#"import "date"
from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> map(fn: (r) => ({r with hour: date.hour(t: r._time)}))
  |> group(columns: ["hour"])
  |> count()"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
  |> aggregateWindow(every: 1d, fn: stddev)
  |> limit(n: 30)"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group()
  |> aggregateWindow(every: 1h, fn: count)
  |> top(n: 5)"#,
    ),
    Statement::Text(
        r#"from(bucket: "{bucket}")
  |> range(start: -30y)
  |> filter(fn: (r) => r._measurement == "user_events" and r._field == "rssi")
  |> group(columns: ["user_id"])
  |> map(fn: (r) => ({r with _value: int(v: r._time)}))
  |> spread()
  |> group()
  |> top(n: 10)"#,
    ),
];

/// Substitute the bucket name and time parameters into a Flux template.
fn render(template: &str, bucket: &str, params: &[DateTime<Utc>]) -> String {
    let mut script = template.replace("{bucket}", bucket);
    for (i, param) in params.iter().enumerate() {
        script = script.replace(
            &format!("{{p{}}}", i + 1),
            &param.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        );
    }
    script
}

// -------------------------------------------------------------------------
// CSV responses
// -------------------------------------------------------------------------

/// One table of a Flux CSV response: a header line and its data rows.
#[derive(Debug)]
struct CsvTable<'a> {
    header: Vec<&'a str>,
    rows: Vec<&'a str>,
}

impl<'a> CsvTable<'a> {
    fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|c| *c == name)
    }

    fn is_error(&self) -> bool {
        self.column("error").is_some() && self.column("reference").is_some()
    }
}

/// Split a response into tables. Tables are separated by blank lines.
fn csv_tables(body: &str) -> Vec<CsvTable<'_>> {
    let mut tables = Vec::new();
    let mut current: Option<CsvTable<'_>> = None;

    for line in body.lines() {
        if line.trim().is_empty() {
            tables.extend(current.take());
            continue;
        }
        match current.as_mut() {
            Some(table) => table.rows.push(line),
            None => {
                current = Some(CsvTable {
                    header: line.split(',').collect(),
                    rows: Vec::new(),
                })
            }
        }
    }
    tables.extend(current);
    tables
}

/// In-band error reported by the query engine, if any.
fn flux_error(tables: &[CsvTable<'_>]) -> Option<String> {
    tables.iter().find(|t| t.is_error()).map(|t| {
        t.rows
            .first()
            .map(|row| row.trim_matches(',').to_string())
            .unwrap_or_else(|| "query failed".to_string())
    })
}

/// Earliest `min` and latest `max` `_time` across the response.
fn parse_time_bounds(tables: &[CsvTable<'_>]) -> std::result::Result<Option<TimeBounds>, BackendError> {
    let mut min: Option<DateTime<Utc>> = None;
    let mut max: Option<DateTime<Utc>> = None;

    for table in tables {
        let (Some(result_col), Some(time_col)) = (table.column("result"), table.column("_time"))
        else {
            continue;
        };
        for row in &table.rows {
            let fields: Vec<&str> = row.split(',').collect();
            let (Some(result), Some(raw)) = (fields.get(result_col), fields.get(time_col)) else {
                return Err(BackendError::Response(format!("short CSV row '{}'", row)));
            };
            let time = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| BackendError::Response(format!("bad _time '{}': {}", raw, e)))?
                .with_timezone(&Utc);
            match *result {
                "min" => min = Some(min.map_or(time, |m| m.min(time))),
                "max" => max = Some(max.map_or(time, |m| m.max(time))),
                _ => {}
            }
        }
    }

    Ok(min.zip(max).map(|(min, max)| TimeBounds::new(min, max)))
}

// -------------------------------------------------------------------------
// HTTP API payloads
// -------------------------------------------------------------------------

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    dialect: Dialect,
}

#[derive(Serialize)]
struct Dialect {
    header: bool,
    annotations: [&'static str; 0],
}

#[derive(Deserialize)]
struct BucketList {
    #[serde(default)]
    buckets: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct OrgList {
    #[serde(default)]
    orgs: Vec<Org>,
}

#[derive(Deserialize)]
struct Org {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewBucket<'a> {
    #[serde(rename = "orgID")]
    org_id: &'a str,
    name: &'a str,
    retention_rules: [serde_json::Value; 0],
}

// -------------------------------------------------------------------------
// Status handling
// -------------------------------------------------------------------------

/// What a `/api/v2/query` status means for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryStatus {
    Accepted,
    /// The engine refused the script. The query is recorded and the run goes on.
    Refused,
    Failed,
}

fn query_status(status: StatusCode) -> QueryStatus {
    if status == StatusCode::BAD_REQUEST {
        QueryStatus::Refused
    } else if status.is_success() {
        QueryStatus::Accepted
    } else {
        QueryStatus::Failed
    }
}

/// Outcome of the bucket lookup that starts `prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BucketLookup {
    /// Response lists matching buckets; check whether it is empty.
    Listed,
    Missing,
    Failed,
}

fn bucket_lookup(status: StatusCode) -> BucketLookup {
    if status.is_success() {
        BucketLookup::Listed
    } else if status == StatusCode::NOT_FOUND {
        BucketLookup::Missing
    } else {
        BucketLookup::Failed
    }
}

/// Whether a bucket creation status leaves the bucket in place.
/// 422 means it was created concurrently or already exists.
fn bucket_created(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::UNPROCESSABLE_ENTITY
}

// -------------------------------------------------------------------------
// Adapter
// -------------------------------------------------------------------------

pub struct InfluxDbAdapter {
    http: Client,
    base_url: String,
    settings: InfluxSettings,
}

impl InfluxDbAdapter {
    pub async fn connect(config: &AdapterConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&format!("Token {}", config.influx.token))
            .map_err(|e| Error::Config(format!("invalid InfluxDB token: {}", e)))?;
        headers.insert(AUTHORIZATION, token);

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(Error::connect)?;
        let adapter = Self {
            http,
            base_url: http_base_url(&config.connection),
            settings: config.influx.clone(),
        };

        let response = adapter
            .http
            .get(adapter.url("/ping"))
            .send()
            .await
            .map_err(Error::connect)?;
        if !response.status().is_success() {
            return Err(Error::connect(BackendError::from_response(response).await));
        }

        info!(
            backend = %BackendKind::Influxdb,
            url = %adapter.base_url,
            org = %adapter.settings.org,
            bucket = %adapter.settings.bucket,
            "Connected"
        );
        Ok(adapter)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn ensure_bucket(&self) -> std::result::Result<(), BackendError> {
        let settings = &self.settings;

        let response = self
            .http
            .get(self.url("/api/v2/buckets"))
            .query(&[("org", settings.org.as_str()), ("name", settings.bucket.as_str())])
            .send()
            .await?;
        match bucket_lookup(response.status()) {
            BucketLookup::Listed => {
                let existing: BucketList = response.json().await?;
                if !existing.buckets.is_empty() {
                    debug!(bucket = %settings.bucket, "Bucket already exists");
                    return Ok(());
                }
            }
            BucketLookup::Missing => {}
            BucketLookup::Failed => return Err(BackendError::from_response(response).await),
        }

        let response = self
            .http
            .get(self.url("/api/v2/orgs"))
            .query(&[("org", settings.org.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::from_response(response).await);
        }
        let orgs: OrgList = response.json().await?;
        let org = orgs.orgs.first().ok_or_else(|| {
            BackendError::Response(format!("organization '{}' not found", settings.org))
        })?;

        let response = self
            .http
            .post(self.url("/api/v2/buckets"))
            .json(&NewBucket {
                org_id: &org.id,
                name: &settings.bucket,
                retention_rules: [],
            })
            .send()
            .await?;
        if !bucket_created(response.status()) {
            return Err(BackendError::from_response(response).await);
        }
        info!(bucket = %settings.bucket, status = %response.status(), "Bucket ready");
        Ok(())
    }

    /// Post a Flux script. `Ok(Err(reason))` means the engine refused it.
    async fn query(
        &self,
        script: &str,
    ) -> std::result::Result<std::result::Result<String, String>, BackendError> {
        let response = self
            .http
            .post(self.url("/api/v2/query"))
            .query(&[("org", self.settings.org.as_str())])
            .header(ACCEPT, "application/csv")
            .json(&QueryBody {
                query: script,
                kind: "flux",
                dialect: Dialect {
                    header: true,
                    annotations: [],
                },
            })
            .send()
            .await?;

        match query_status(response.status()) {
            QueryStatus::Accepted => Ok(Ok(response.text().await?)),
            QueryStatus::Refused => {
                let body = response.text().await?;
                Ok(Err(body.trim().to_string()))
            }
            QueryStatus::Failed => Err(BackendError::from_response(response).await),
        }
    }
}

#[async_trait]
impl Adapter for InfluxDbAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Influxdb
    }

    async fn prepare(&mut self) -> Result<()> {
        self.ensure_bucket().await.map_err(Error::schema)
    }

    async fn ingest_batch(&mut self, chunk: &Chunk) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let response = self
            .http
            .post(self.url("/api/v2/write"))
            .query(&[
                ("org", self.settings.org.as_str()),
                ("bucket", self.settings.bucket.as_str()),
                ("precision", "s"),
            ])
            .body(encode::line_protocol(chunk))
            .send()
            .await
            .map_err(Error::ingest)?;

        if !response.status().is_success() {
            return Err(Error::ingest(BackendError::from_response(response).await));
        }
        Ok(())
    }

    async fn run_query(&mut self, request: &QueryRequest) -> Result<QueryReply> {
        let template = match lookup(&STATEMENTS, request.id) {
            Statement::Text(text) => text,
            Statement::Unsupported => return Ok(QueryReply::Unsupported),
        };
        let script = render(template, &self.settings.bucket, &request.params);

        let body = match self
            .query(&script)
            .await
            .map_err(|e| Error::query(request.id, e))?
        {
            Ok(body) => body,
            Err(reason) => {
                warn!(query_id = request.id.get(), reason = %reason, "Flux script rejected");
                return Ok(QueryReply::Rejected(reason));
            }
        };

        let tables = csv_tables(&body);
        if let Some(reason) = flux_error(&tables) {
            warn!(query_id = request.id.get(), reason = %reason, "Flux evaluation failed");
            return Ok(QueryReply::Rejected(reason));
        }

        if request.id == QueryId::TIME_BOUNDS {
            let bounds = parse_time_bounds(&tables).map_err(|e| Error::query(request.id, e))?;
            return Ok(QueryReply::TimeBounds(bounds));
        }

        let rows = tables.iter().map(|t| t.rows.len() as u64).sum();
        Ok(QueryReply::Rows(rows))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
