//! The fixed catalogue of twenty benchmark queries.
//!
//! Every backend expresses the same twenty logical operations in its own
//! dialect. Identifiers are the join key across backends, so their meaning and
//! order never change. Six queries are parameterized by time windows derived
//! once from the result of query 1.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of queries in the catalogue.
pub const QUERY_COUNT: u8 = 20;

const DESCRIPTIONS: [&str; QUERY_COUNT as usize] = [
    "Get time bounds",
    "Count all records",
    "Count distinct users",
    "Average RSSI",
    "Records before middle time",
    "Records after middle time",
    "Records around middle time (±1 hour)",
    "24 hours aggregation from middle time",
    "Top 10 users by activity",
    "Records with strong signal",
    "Records with weak signal",
    "Top SSIDs",
    "RSSI statistics by user",
    "RSSI percentiles",
    "Records in first half",
    "Records in second half",
    "Hourly user activity patterns",
    "Daily RSSI variance",
    "Peak usage hours",
    "User session duration analysis",
];

/// Identifier of a catalogue query, always in `1..=20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct QueryId(u8);

impl QueryId {
    /// Query 1, which produces the dataset's time bounds.
    pub const TIME_BOUNDS: QueryId = QueryId(1);

    /// Create an identifier, rejecting values outside `1..=20`.
    pub fn new(id: u8) -> Result<Self> {
        if (1..=QUERY_COUNT).contains(&id) {
            Ok(Self(id))
        } else {
            Err(Error::Config(format!(
                "query id {} outside 1..={}",
                id, QUERY_COUNT
            )))
        }
    }

    /// All identifiers in execution order.
    pub fn all() -> impl Iterator<Item = QueryId> {
        (1..=QUERY_COUNT).map(QueryId)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position, for indexing per-backend statement tables.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// Human-readable description recorded in the result artifact.
    pub fn description(self) -> &'static str {
        DESCRIPTIONS[self.index()]
    }

    /// Which derived time values this query is parameterized by.
    pub fn time_params(self) -> TimeParams {
        match self.0 {
            5 | 6 => TimeParams::Middle,
            7 => TimeParams::AroundMiddle,
            8 => TimeParams::DayFromMiddle,
            15 => TimeParams::FirstHalf,
            16 => TimeParams::SecondHalf,
            _ => TimeParams::None,
        }
    }

    /// Whether this query can only run once query 1 produced bounds.
    pub fn needs_time_bounds(self) -> bool {
        self.time_params() != TimeParams::None
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for QueryId {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        QueryId::new(id)
    }
}

impl From<QueryId> for u8 {
    fn from(id: QueryId) -> u8 {
        id.0
    }
}

/// Time values bound into a parameterized query, in binding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeParams {
    None,
    /// `[middle]`
    Middle,
    /// `[middle - 1h, middle + 1h]`
    AroundMiddle,
    /// `[middle, middle + 24h]`
    DayFromMiddle,
    /// `[min, middle]`
    FirstHalf,
    /// `[middle, max]`
    SecondHalf,
}

impl TimeParams {
    /// Number of values bound for this shape.
    pub fn arity(self) -> usize {
        match self {
            TimeParams::None => 0,
            TimeParams::Middle => 1,
            _ => 2,
        }
    }

    /// Select the bound values from the derived windows.
    pub fn resolve(self, windows: &TimeWindows) -> Vec<DateTime<Utc>> {
        match self {
            TimeParams::None => Vec::new(),
            TimeParams::Middle => vec![windows.middle],
            TimeParams::AroundMiddle => vec![windows.hour_before, windows.hour_after],
            TimeParams::DayFromMiddle => vec![windows.middle, windows.day_after],
            TimeParams::FirstHalf => vec![windows.bounds.min, windows.middle],
            TimeParams::SecondHalf => vec![windows.middle, windows.bounds.max],
        }
    }
}

/// Minimum and maximum event time in the ingested dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBounds {
    pub min: DateTime<Utc>,
    pub max: DateTime<Utc>,
}

impl TimeBounds {
    pub fn new(min: DateTime<Utc>, max: DateTime<Utc>) -> Self {
        Self { min, max }
    }

    /// `min + (max - min) / 2`, truncated toward `min` at nanosecond precision.
    pub fn middle(&self) -> DateTime<Utc> {
        self.min + (self.max - self.min) / 2
    }
}

/// Time values derived once from query 1 and reused by every dependent query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindows {
    pub bounds: TimeBounds,
    pub middle: DateTime<Utc>,
    pub hour_before: DateTime<Utc>,
    pub hour_after: DateTime<Utc>,
    pub day_after: DateTime<Utc>,
}

impl TimeWindows {
    pub fn from_bounds(bounds: TimeBounds) -> Self {
        let middle = bounds.middle();
        Self {
            bounds,
            middle,
            hour_before: middle - Duration::hours(1),
            hour_after: middle + Duration::hours(1),
            day_after: middle + Duration::hours(24),
        }
    }
}

/// One query invocation handed to an adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub id: QueryId,
    /// Time values to bind, in the order given by [`QueryId::time_params`].
    pub params: Vec<DateTime<Utc>>,
}

impl QueryRequest {
    /// Build the request for `id`, resolving its time parameters.
    ///
    /// Returns `None` when `id` is parameterized and no windows are available.
    pub fn resolve(id: QueryId, windows: Option<&TimeWindows>) -> Option<Self> {
        let shape = id.time_params();
        let params = match (shape, windows) {
            (TimeParams::None, _) => Vec::new(),
            (shape, Some(windows)) => shape.resolve(windows),
            (_, None) => return None,
        };
        Some(Self { id, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_ids_cover_one_to_twenty() {
        let ids: Vec<u8> = QueryId::all().map(QueryId::get).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_out_of_range_ids_rejected() {
        assert!(QueryId::new(0).is_err());
        assert!(QueryId::new(21).is_err());
        assert!(QueryId::new(20).is_ok());
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(QueryId::TIME_BOUNDS.description(), "Get time bounds");
        assert_eq!(
            QueryId::new(20).unwrap().description(),
            "User session duration analysis"
        );
    }

    #[test]
    fn test_dependent_queries() {
        let dependent: Vec<u8> = QueryId::all()
            .filter(|id| id.needs_time_bounds())
            .map(QueryId::get)
            .collect();
        assert_eq!(dependent, vec![5, 6, 7, 8, 15, 16]);
    }

    #[test]
    fn test_middle_is_exact_half() {
        let t0 = at(1_700_000_000);
        let bounds = TimeBounds::new(t0, t0 + Duration::seconds(7200));
        assert_eq!(bounds.middle(), t0 + Duration::seconds(3600));
    }

    #[test]
    fn test_middle_of_odd_span_does_not_drift() {
        let t0 = at(1_700_000_000);
        let bounds = TimeBounds::new(t0, t0 + Duration::seconds(7201));
        let first = bounds.middle();
        for _ in 0..100 {
            assert_eq!(bounds.middle(), first);
        }
        assert_eq!(first, t0 + Duration::milliseconds(3_600_500));
    }

    #[test]
    fn test_windows_around_middle() {
        let t0 = at(1_700_000_000);
        let windows = TimeWindows::from_bounds(TimeBounds::new(t0, t0 + Duration::hours(2)));

        let around = QueryRequest::resolve(QueryId::new(7).unwrap(), Some(&windows)).unwrap();
        assert_eq!(around.params, vec![t0, t0 + Duration::hours(2)]);

        let day = QueryRequest::resolve(QueryId::new(8).unwrap(), Some(&windows)).unwrap();
        assert_eq!(
            day.params,
            vec![t0 + Duration::hours(1), t0 + Duration::hours(25)]
        );

        let first = QueryRequest::resolve(QueryId::new(15).unwrap(), Some(&windows)).unwrap();
        assert_eq!(first.params, vec![t0, t0 + Duration::hours(1)]);

        let second = QueryRequest::resolve(QueryId::new(16).unwrap(), Some(&windows)).unwrap();
        assert_eq!(
            second.params,
            vec![t0 + Duration::hours(1), t0 + Duration::hours(2)]
        );
    }

    #[test]
    fn test_resolve_without_windows() {
        assert!(QueryRequest::resolve(QueryId::new(5).unwrap(), None).is_none());
        let count = QueryRequest::resolve(QueryId::new(2).unwrap(), None).unwrap();
        assert!(count.params.is_empty());
    }

    #[test]
    fn test_arity_matches_resolved_params() {
        let t0 = at(0);
        let windows = TimeWindows::from_bounds(TimeBounds::new(t0, t0 + Duration::days(3)));
        for id in QueryId::all() {
            let shape = id.time_params();
            assert_eq!(shape.resolve(&windows).len(), shape.arity(), "query {}", id);
        }
    }

    #[test]
    fn test_serde_rejects_bad_id() {
        assert!(serde_json::from_str::<QueryId>("0").is_err());
        assert_eq!(serde_json::from_str::<QueryId>("14").unwrap().get(), 14);
    }
}
