//! Ingested events and the chunk file format they are decoded from.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One reading of a user's Wi-Fi connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    /// Signal strength in dBm, usually negative.
    pub rssi: f64,
    pub ssid: String,
}

impl Event {
    /// Event time as Unix seconds.
    pub fn unix_seconds(&self) -> i64 {
        self.timestamp.timestamp()
    }
}

/// An ordered batch of events read from one chunk file.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    index: usize,
    events: Vec<Event>,
}

impl Chunk {
    pub fn new(index: usize, events: Vec<Event>) -> Self {
        Self { index, events }
    }

    /// Zero-based position of the chunk in the dataset.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }
}

impl<'a> IntoIterator for &'a Chunk {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Top-level document of a chunk file.
#[derive(Debug, Deserialize)]
pub(crate) struct ReadingFile {
    pub response: Vec<Reading>,
}

/// Record shape inside a chunk file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Reading {
    pub user_id: String,
    pub last_updated_time: i64,
    pub connection: Connection,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Connection {
    pub ssid: String,
    pub rssi: f64,
}

impl TryFrom<Reading> for Event {
    type Error = String;

    fn try_from(reading: Reading) -> Result<Self, Self::Error> {
        let timestamp = DateTime::from_timestamp(reading.last_updated_time, 0).ok_or_else(|| {
            format!(
                "lastUpdatedTime {} is outside the representable range",
                reading.last_updated_time
            )
        })?;

        Ok(Event {
            user_id: reading.user_id,
            timestamp,
            rssi: reading.connection.rssi,
            ssid: reading.connection.ssid,
        })
    }
}
