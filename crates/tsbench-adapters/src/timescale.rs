//! TimescaleDB schema and statements.
//!
//! Connection handling and ingestion are shared with plain PostgreSQL in
//! [`PostgresAdapter`](crate::postgres::PostgresAdapter).

use crate::statements::{Statement, StatementTable};

pub(crate) const SCHEMA: &str = r#"
    CREATE EXTENSION IF NOT EXISTS timescaledb;
    CREATE TABLE IF NOT EXISTS user_events (
        id BIGSERIAL,
        user_id VARCHAR(255) NOT NULL,
        timestamp TIMESTAMP WITH TIME ZONE NOT NULL,
        rssi REAL NOT NULL,
        ssid VARCHAR(255) NOT NULL
    );
    SELECT create_hypertable('user_events', by_range('timestamp', INTERVAL '4 hours'), if_not_exists => TRUE);
"#;

pub(crate) static STATEMENTS: StatementTable = [
    Statement::Text("SELECT MIN(timestamp), MAX(timestamp) FROM user_events"),
    Statement::Text("SELECT COUNT(*) FROM user_events"),
    Statement::Text("SELECT COUNT(DISTINCT user_id) FROM user_events"),
    Statement::Text("SELECT AVG(rssi) FROM user_events"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp < $1"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp > $1"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN $1 AND $2"),
    Statement::Text(
        "SELECT date_trunc('hour', timestamp) as hour, COUNT(*) FROM user_events WHERE timestamp BETWEEN $1 AND $2 GROUP BY hour ORDER BY hour",
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
        "SELECT percentile_cont(0.25) WITHIN GROUP (ORDER BY rssi) as q1, percentile_cont(0.5) WITHIN GROUP (ORDER BY rssi) as median, percentile_cont(0.75) WITHIN GROUP (ORDER BY rssi) as q3 FROM user_events",
    ),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN $1 AND $2"),
    Statement::Text("SELECT COUNT(*) FROM user_events WHERE timestamp BETWEEN $1 AND $2"),
    Statement::Text(
        "SELECT EXTRACT(hour FROM timestamp) as hour, COUNT(*) as count FROM user_events GROUP BY hour ORDER BY hour",
    ),
    Statement::Text(
        "SELECT DATE(timestamp) as day, VARIANCE(rssi) as rssi_variance FROM user_events GROUP BY day ORDER BY day LIMIT 30",
    ),
    Statement::Text(
        "SELECT date_trunc('hour', timestamp) as hour, COUNT(*) as count FROM user_events GROUP BY hour ORDER BY count DESC LIMIT 5",
    ),
    Statement::Text(
        "SELECT user_id, MAX(timestamp) - MIN(timestamp) as session_duration FROM user_events GROUP BY user_id ORDER BY session_duration DESC LIMIT 10",
    ),
];
