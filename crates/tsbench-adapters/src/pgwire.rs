//! Shared session for backends spoken to over the PostgreSQL wire protocol.
//!
//! PostgreSQL, TimescaleDB and CrateDB run everything through this session.
//! QuestDB uses it for queries only.

use chrono::{DateTime, NaiveDateTime, Utc};
use futures::TryStreamExt;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::debug;
use tsbench_core::{Error, QueryId, QueryReply, QueryRequest, Result, TimeBounds};

use crate::statements::{lookup, Statement, StatementTable};

/// How the backend stores the `timestamp` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampKind {
    /// `TIMESTAMP WITH TIME ZONE`
    WithZone,
    /// `TIMESTAMP WITHOUT TIME ZONE`, always holding UTC.
    Naive,
}

/// A pooled pg-wire connection bound to one statement table.
pub struct PgSession {
    pool: PgPool,
    statements: &'static StatementTable,
    timestamps: TimestampKind,
}

impl PgSession {
    /// Open a pool against `url`.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        statements: &'static StatementTable,
        timestamps: TimestampKind,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(Error::connect)?;

        Ok(Self {
            pool,
            statements,
            timestamps,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run one or more DDL statements as a single simple-protocol batch.
    pub async fn execute_ddl(&self, ddl: &str) -> Result<()> {
        sqlx::raw_sql(ddl)
            .execute(&self.pool)
            .await
            .map_err(Error::schema)?;
        Ok(())
    }

    /// Run a catalogue query and drain its rows.
    pub async fn run(&self, request: &QueryRequest) -> Result<QueryReply> {
        let text = match lookup(self.statements, request.id) {
            Statement::Text(text) => text,
            Statement::Unsupported => return Ok(QueryReply::Unsupported),
        };

        if request.id == QueryId::TIME_BOUNDS {
            let bounds = self
                .time_bounds(text)
                .await
                .map_err(|e| Error::query(request.id, e))?;
            return Ok(QueryReply::TimeBounds(bounds));
        }

        debug!(query_id = request.id.get(), statement = text, "Executing statement");
        let mut query = sqlx::query(text);
        for param in &request.params {
            query = match self.timestamps {
                TimestampKind::WithZone => query.bind(*param),
                TimestampKind::Naive => query.bind(param.naive_utc()),
            };
        }

        let mut rows = query.fetch(&self.pool);
        let mut count = 0u64;
        while rows
            .try_next()
            .await
            .map_err(|e| Error::query(request.id, e))?
            .is_some()
        {
            count += 1;
        }

        debug!(query_id = request.id.get(), rows = count, "Drained result set");
        Ok(QueryReply::Rows(count))
    }

    async fn time_bounds(&self, text: &str) -> std::result::Result<Option<TimeBounds>, sqlx::Error> {
        let row = sqlx::query(text).fetch_one(&self.pool).await?;

        let (min, max) = match self.timestamps {
            TimestampKind::WithZone => (
                row.try_get::<Option<DateTime<Utc>>, _>(0)?,
                row.try_get::<Option<DateTime<Utc>>, _>(1)?,
            ),
            TimestampKind::Naive => (
                row.try_get::<Option<NaiveDateTime>, _>(0)?
                    .map(|t| t.and_utc()),
                row.try_get::<Option<NaiveDateTime>, _>(1)?
                    .map(|t| t.and_utc()),
            ),
        };

        Ok(min.zip(max).map(|(min, max)| TimeBounds::new(min, max)))
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
