//! Backend kinds under benchmark.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The storage engines an adapter exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Relational baseline.
    Postgres,
    /// Relational engine with time-series extensions.
    Timescaledb,
    /// Time-series engine with line-protocol ingestion.
    Questdb,
    /// Distributed SQL.
    Cratedb,
    /// Columnar OLAP.
    Clickhouse,
    /// Tag/field store queried through a functional pipeline language.
    Influxdb,
}

impl BackendKind {
    pub const ALL: [BackendKind; 6] = [
        BackendKind::Postgres,
        BackendKind::Timescaledb,
        BackendKind::Questdb,
        BackendKind::Cratedb,
        BackendKind::Clickhouse,
        BackendKind::Influxdb,
    ];

    /// Tag used on the command line and in result artifacts.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Postgres => "postgres",
            BackendKind::Timescaledb => "timescaledb",
            BackendKind::Questdb => "questdb",
            BackendKind::Cratedb => "cratedb",
            BackendKind::Clickhouse => "clickhouse",
            BackendKind::Influxdb => "influxdb",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| {
                Error::Config(format!(
                    "unsupported database type: {} (expected one of postgres, timescaledb, questdb, cratedb, clickhouse, influxdb)",
                    s
                ))
            })
    }
}
