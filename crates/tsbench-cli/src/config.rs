//! Command-line configuration.

use std::path::PathBuf;

use clap::Parser;
use tsbench_adapters::config::{DEFAULT_INSERT_BATCH_ROWS, DEFAULT_MAX_CONNECTIONS};
use tsbench_adapters::{AdapterConfig, ClickHouseAuth, InfluxSettings};
use tsbench_core::dataset::{DEFAULT_CHUNK_PREFIX, DEFAULT_DATA_DIR};
use tsbench_core::{recorder, BackendKind, DatasetConfig};

/// Default directory for derived artifact paths.
pub const DEFAULT_RESULTS_DIR: &str = "results";

/// Default run index for derived artifact paths.
pub const DEFAULT_RUN: u32 = 1;

/// tsbench command line arguments.
#[derive(Debug, Parser)]
#[command(name = "tsbench")]
#[command(about = "Ingestion and query benchmark for time-series storage backends")]
pub struct Args {
    /// Connection descriptor. QuestDB takes `ingest:::query`.
    #[arg(short, long)]
    pub conn: String,

    /// Backend: postgres, timescaledb, questdb, cratedb, clickhouse or influxdb.
    #[arg(short = 't', long = "type")]
    pub db_type: BackendKind,

    /// Output file. Derived from --results-dir and --run when unset.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory holding the chunk files.
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Chunk file name prefix.
    #[arg(long, default_value = DEFAULT_CHUNK_PREFIX)]
    pub chunk_prefix: String,

    /// Directory for derived artifact paths.
    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    pub results_dir: PathBuf,

    /// Run index for derived artifact paths.
    #[arg(long, default_value_t = DEFAULT_RUN)]
    pub run: u32,

    /// Maximum pooled connections for pg-wire backends.
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Rows per multi-row INSERT (CrateDB).
    #[arg(long, default_value_t = DEFAULT_INSERT_BATCH_ROWS)]
    pub insert_batch_rows: usize,

    /// InfluxDB organisation.
    #[arg(long, default_value = "myorg")]
    pub influx_org: String,

    /// InfluxDB bucket.
    #[arg(long, default_value = "benchmark")]
    pub influx_bucket: String,

    /// InfluxDB API token.
    #[arg(long, default_value = "mytoken123")]
    pub influx_token: String,

    /// ClickHouse user.
    #[arg(long, default_value = "default")]
    pub clickhouse_user: String,

    /// ClickHouse password.
    #[arg(long, default_value = "")]
    pub clickhouse_password: String,

    /// ClickHouse database.
    #[arg(long, default_value = "default")]
    pub clickhouse_database: String,
}

/// Everything one benchmark run needs.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub adapter: AdapterConfig,
    pub dataset: DatasetConfig,
    /// Explicit artifact path.
    pub output: Option<PathBuf>,
    pub results_dir: PathBuf,
    pub run: u32,
}

impl BenchConfig {
    /// Where the artifact is written.
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            recorder::artifact_path(&self.results_dir, self.adapter.kind, self.run)
        })
    }
}

impl From<&Args> for BenchConfig {
    fn from(args: &Args) -> Self {
        let adapter = AdapterConfig::new(args.db_type, args.conn.clone())
            .with_max_connections(args.max_connections)
            .with_insert_batch_rows(args.insert_batch_rows)
            .with_influx(InfluxSettings {
                org: args.influx_org.clone(),
                bucket: args.influx_bucket.clone(),
                token: args.influx_token.clone(),
            })
            .with_clickhouse_auth(ClickHouseAuth {
                user: args.clickhouse_user.clone(),
                password: args.clickhouse_password.clone(),
                database: args.clickhouse_database.clone(),
            });

        Self {
            adapter,
            dataset: DatasetConfig::new(&args.data_dir).with_prefix(args.chunk_prefix.clone()),
            output: args.output.clone(),
            results_dir: args.results_dir.clone(),
            run: args.run,
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterConfig::new(BackendKind::Postgres, "postgres://localhost:5432/postgres"),
            dataset: DatasetConfig::default(),
            output: None,
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            run: DEFAULT_RUN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_args() {
        let args = Args::try_parse_from([
            "tsbench",
            "--conn",
            "postgres://localhost/bench",
            "--type",
            "timescaledb",
            "-o",
            "out.json",
        ])
        .unwrap();
        let config = BenchConfig::from(&args);

        assert_eq!(config.adapter.kind, BackendKind::Timescaledb);
        assert_eq!(config.adapter.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.output_path(), PathBuf::from("out.json"));
        assert_eq!(
            config.dataset.chunk_path(2),
            PathBuf::from(DEFAULT_DATA_DIR).join("readings_2.json")
        );
    }

    #[test]
    fn test_derived_output_path() {
        let args = Args::try_parse_from([
            "tsbench",
            "-c",
            "localhost:8123",
            "-t",
            "ClickHouse",
            "--results-dir",
            "out",
            "--run",
            "4",
        ])
        .unwrap();
        let config = BenchConfig::from(&args);

        assert_eq!(config.output_path(), PathBuf::from("out/clickhouse_4.json"));
    }

    #[test]
    fn test_backend_settings() {
        let args = Args::try_parse_from([
            "tsbench",
            "-c",
            "http://localhost:8086",
            "-t",
            "influxdb",
            "--influx-org",
            "acme",
            "--influx-bucket",
            "wifi",
            "--influx-token",
            "secret",
            "--clickhouse-user",
            "bench",
        ])
        .unwrap();
        let config = BenchConfig::from(&args);

        assert_eq!(config.adapter.influx.org, "acme");
        assert_eq!(config.adapter.influx.bucket, "wifi");
        assert_eq!(config.adapter.influx.token, "secret");
        assert_eq!(config.adapter.clickhouse.user, "bench");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = Args::try_parse_from(["tsbench", "-c", "x", "-t", "mongodb"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_required_args() {
        assert!(Args::try_parse_from(["tsbench", "-t", "postgres"]).is_err());
        assert!(Args::try_parse_from(["tsbench", "-c", "x"]).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = BenchConfig::default();
        assert_eq!(config.output_path(), PathBuf::from("results/postgres_1.json"));
        assert_eq!(config.adapter.insert_batch_rows, DEFAULT_INSERT_BATCH_ROWS);
    }
}
