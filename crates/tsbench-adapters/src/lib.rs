//! Storage backend adapters for tsbench.
//!
//! One module per engine, each implementing [`tsbench_core::Adapter`]:
//!
//! - **PostgreSQL** and **TimescaleDB**: pg-wire, `COPY FROM STDIN` ingestion
//! - **CrateDB**: pg-wire, multi-row `INSERT` ingestion
//! - **QuestDB**: HTTP line protocol ingestion, pg-wire queries
//! - **ClickHouse**: HTTP interface, `JSONEachRow` ingestion
//! - **InfluxDB**: v2 HTTP API, line protocol ingestion, Flux queries
//!
//! [`connect`] is the only place that chooses an implementation.

pub mod clickhouse;
pub mod config;
pub mod cratedb;
pub mod encode;
pub mod error;
pub mod influxdb;
pub mod pgwire;
pub mod postgres;
pub mod questdb;
pub mod statements;
pub mod timescale;

use tsbench_core::{Adapter, BackendKind, Result};

pub use clickhouse::ClickHouseAdapter;
pub use config::{AdapterConfig, ClickHouseAuth, InfluxSettings, QuestDbEndpoints};
pub use cratedb::CrateDbAdapter;
pub use error::BackendError;
pub use influxdb::InfluxDbAdapter;
pub use postgres::PostgresAdapter;
pub use questdb::QuestDbAdapter;

/// Table (or measurement) every backend writes to.
pub const TABLE: &str = "user_events";

/// Open an adapter for `config.kind`.
pub async fn connect(config: &AdapterConfig) -> Result<Box<dyn Adapter>> {
    config.validate()?;

    let adapter: Box<dyn Adapter> = match config.kind {
        BackendKind::Postgres => Box::new(PostgresAdapter::postgres(config).await?),
        BackendKind::Timescaledb => Box::new(PostgresAdapter::timescaledb(config).await?),
        BackendKind::Questdb => Box::new(QuestDbAdapter::connect(config).await?),
        BackendKind::Cratedb => Box::new(CrateDbAdapter::connect(config).await?),
        BackendKind::Clickhouse => Box::new(ClickHouseAdapter::connect(config).await?),
        BackendKind::Influxdb => Box::new(InfluxDbAdapter::connect(config).await?),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_bad_questdb_descriptor() {
        let config = AdapterConfig::new(BackendKind::Questdb, "localhost:9000");
        let err = connect(&config).await.err().unwrap();
        assert!(matches!(err, tsbench_core::Error::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_descriptor() {
        for kind in BackendKind::ALL {
            let config = AdapterConfig::new(kind, "  ");
            assert!(connect(&config).await.is_err(), "{}", kind);
        }
    }
}
