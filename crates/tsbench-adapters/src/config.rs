//! Adapter configuration.

use tsbench_core::{BackendKind, Error, Result};

/// Default maximum pooled connections for pg-wire backends.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default rows per multi-row `INSERT` statement.
pub const DEFAULT_INSERT_BATCH_ROWS: usize = 1_000;

/// Bind parameters per inserted row (user_id, ts, rssi, ssid).
pub const INSERT_PARAMS_PER_ROW: usize = 4;

/// Largest number of bind parameters one pg-wire statement may carry.
pub const MAX_BIND_PARAMS: usize = u16::MAX as usize;

/// Largest multi-row INSERT that stays within [`MAX_BIND_PARAMS`].
pub const MAX_INSERT_BATCH_ROWS: usize = MAX_BIND_PARAMS / INSERT_PARAMS_PER_ROW;

/// Separator between the ingest and query endpoints of a QuestDB descriptor.
pub const QUESTDB_SEPARATOR: &str = ":::";

/// InfluxDB v2 organisation, bucket and API token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxSettings {
    pub org: String,
    pub bucket: String,
    pub token: String,
}

impl Default for InfluxSettings {
    fn default() -> Self {
        Self {
            org: "myorg".to_string(),
            bucket: "benchmark".to_string(),
            token: "mytoken123".to_string(),
        }
    }
}

/// ClickHouse HTTP credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickHouseAuth {
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for ClickHouseAuth {
    fn default() -> Self {
        Self {
            user: "default".to_string(),
            password: String::new(),
            database: "default".to_string(),
        }
    }
}

/// Everything needed to open one adapter.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Backend to connect to.
    pub kind: BackendKind,
    /// Connection descriptor. Its shape depends on the backend: a
    /// `postgres://` URL for pg-wire backends, an HTTP base URL for ClickHouse
    /// and InfluxDB, `ingest:::query` for QuestDB.
    pub connection: String,
    /// Maximum pooled connections for pg-wire backends.
    pub max_connections: u32,
    /// Rows per statement for backends ingesting with multi-row `INSERT`.
    pub insert_batch_rows: usize,
    pub influx: InfluxSettings,
    pub clickhouse: ClickHouseAuth,
}

impl AdapterConfig {
    pub fn new(kind: BackendKind, connection: impl Into<String>) -> Self {
        Self {
            kind,
            connection: connection.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            insert_batch_rows: DEFAULT_INSERT_BATCH_ROWS,
            influx: InfluxSettings::default(),
            clickhouse: ClickHouseAuth::default(),
        }
    }

    /// Set the pool size for pg-wire backends.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set the rows per multi-row `INSERT`.
    pub fn with_insert_batch_rows(mut self, rows: usize) -> Self {
        self.insert_batch_rows = rows;
        self
    }

    /// Set the InfluxDB organisation, bucket and token.
    pub fn with_influx(mut self, influx: InfluxSettings) -> Self {
        self.influx = influx;
        self
    }

    /// Set the ClickHouse credentials.
    pub fn with_clickhouse_auth(mut self, auth: ClickHouseAuth) -> Self {
        self.clickhouse = auth;
        self
    }

    /// Check the settings that do not need a live backend.
    pub fn validate(&self) -> Result<()> {
        if self.connection.trim().is_empty() {
            return Err(Error::Config("connection descriptor is empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".to_string()));
        }
        if self.insert_batch_rows == 0 {
            return Err(Error::Config("insert_batch_rows must be at least 1".to_string()));
        }
        if self.insert_batch_rows > MAX_INSERT_BATCH_ROWS {
            return Err(Error::Config(format!(
                "insert_batch_rows {} exceeds {} ({} bind parameters per statement)",
                self.insert_batch_rows, MAX_INSERT_BATCH_ROWS, MAX_BIND_PARAMS
            )));
        }
        if self.kind == BackendKind::Questdb {
            QuestDbEndpoints::parse(&self.connection)?;
        }
        Ok(())
    }
}

/// Normalize an HTTP endpoint: add `http://` when no scheme is given and drop
/// trailing slashes.
pub fn http_base_url(descriptor: &str) -> String {
    let trimmed = descriptor.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Credentials for the QuestDB line-protocol endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestAuth {
    None,
    Basic { username: String, password: String },
    Bearer(String),
}

/// The two halves of a QuestDB connection descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestDbEndpoints {
    /// Base URL of the HTTP line-protocol endpoint.
    pub ingest_url: String,
    pub ingest_auth: IngestAuth,
    /// pg-wire URL for queries.
    pub query_url: String,
}

impl QuestDbEndpoints {
    /// Parse `ingest:::query`.
    ///
    /// The ingest half is either a client config string such as
    /// `http::addr=localhost:9000;username=admin;password=quest;` or a plain
    /// HTTP URL.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let parts: Vec<&str> = descriptor.split(QUESTDB_SEPARATOR).collect();
        let [ingest, query] = parts.as_slice() else {
            return Err(Error::Config(
                "invalid connection string format, expected 'ingestUrl:::queryUrl'".to_string(),
            ));
        };
        if query.trim().is_empty() {
            return Err(Error::Config("QuestDB query URL is empty".to_string()));
        }

        let (ingest_url, ingest_auth) = parse_ingest(ingest.trim())?;
        Ok(Self {
            ingest_url,
            ingest_auth,
            query_url: query.trim().to_string(),
        })
    }
}

fn parse_ingest(ingest: &str) -> Result<(String, IngestAuth)> {
    let Some((scheme, params)) = ingest.split_once("::") else {
        return Ok((http_base_url(ingest), IngestAuth::None));
    };
    if scheme != "http" && scheme != "https" {
        return Err(Error::Config(format!(
            "unsupported QuestDB ingest protocol '{}', expected http or https",
            scheme
        )));
    }

    let mut addr = None;
    let mut username = None;
    let mut password = None;
    let mut token = None;
    for pair in params.split(';').filter(|p| !p.trim().is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            Error::Config(format!("malformed QuestDB config entry '{}'", pair))
        })?;
        match key.trim() {
            "addr" => addr = Some(value.trim().to_string()),
            "username" => username = Some(value.to_string()),
            "password" => password = Some(value.to_string()),
            "token" => token = Some(value.to_string()),
            _ => {}
        }
    }

    let addr = addr.ok_or_else(|| Error::Config("QuestDB config is missing 'addr'".to_string()))?;
    let auth = match (username, password, token) {
        (_, _, Some(token)) => IngestAuth::Bearer(token),
        (Some(username), password, None) => IngestAuth::Basic {
            username,
            password: password.unwrap_or_default(),
        },
        _ => IngestAuth::None,
    };

    Ok((format!("{}://{}", scheme, addr.trim_end_matches('/')), auth))
}
