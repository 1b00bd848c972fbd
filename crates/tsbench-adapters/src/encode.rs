//! Wire encodings for bulk ingestion.
//!
//! Every encoder takes a whole chunk and produces one request body, so an
//! adapter sends a chunk in a single round trip where its protocol allows it.

use std::fmt::Write as _;

use chrono::SecondsFormat;
use serde::Serialize;
use tsbench_core::{Chunk, Event};

use crate::TABLE;

/// RFC 3339 at second precision with a `Z` suffix.
pub fn rfc3339(event: &Event) -> String {
    event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// -------------------------------------------------------------------------
// COPY ... FROM STDIN WITH (FORMAT csv)
// -------------------------------------------------------------------------

/// Encode a chunk as CSV rows of `user_id,timestamp,rssi,ssid`.
pub fn copy_csv(chunk: &Chunk) -> Vec<u8> {
    let mut out = String::with_capacity(chunk.len() * 64);
    for event in chunk {
        push_csv_field(&mut out, &event.user_id);
        out.push(',');
        out.push_str(&rfc3339(event));
        out.push(',');
        let _ = write!(out, "{}", event.rssi);
        out.push(',');
        push_csv_field(&mut out, &event.ssid);
        out.push('\n');
    }
    out.into_bytes()
}

fn push_csv_field(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}

// -------------------------------------------------------------------------
// Line protocol
// -------------------------------------------------------------------------

/// Encode a chunk as line protocol with second precision timestamps.
///
/// `ssid` and `user_id` become tags and `rssi` the only field. Empty tag
/// values are omitted since the protocol rejects them.
pub fn line_protocol(chunk: &Chunk) -> String {
    let mut out = String::with_capacity(chunk.len() * 64);
    for event in chunk {
        out.push_str(TABLE);
        push_tag(&mut out, "ssid", &event.ssid);
        push_tag(&mut out, "user_id", &event.user_id);
        let _ = writeln!(out, " rssi={:?} {}", event.rssi, event.unix_seconds());
    }
    out
}

fn push_tag(out: &mut String, key: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push(',');
    out.push_str(key);
    out.push('=');
    for c in value.chars() {
        match c {
            ',' | '=' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' => out.push(' '),
            _ => out.push(c),
        }
    }
}

// -------------------------------------------------------------------------
// JSONEachRow
// -------------------------------------------------------------------------

#[derive(Serialize)]
struct JsonRow<'a> {
    id: u64,
    user_id: &'a str,
    /// Unix seconds.
    timestamp: i64,
    rssi: f64,
    ssid: &'a str,
}

/// Encode a chunk as newline-delimited JSON objects with ids starting at
/// `first_id`.
pub fn json_each_row(chunk: &Chunk, first_id: u64) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(chunk.len() * 96);
    for (offset, event) in chunk.iter().enumerate() {
        let row = JsonRow {
            id: first_id + offset as u64,
            user_id: &event.user_id,
            timestamp: event.unix_seconds(),
            rssi: event.rssi,
            ssid: &event.ssid,
        };
        serde_json::to_writer(&mut out, &row)?;
        out.push(b'\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn event(user_id: &str, secs: i64, rssi: f64, ssid: &str) -> Event {
        Event {
            user_id: user_id.to_string(),
            timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
            rssi,
            ssid: ssid.to_string(),
        }
    }

    fn chunk() -> Chunk {
        Chunk::new(
            0,
            vec![
                event("u1", 1_700_000_000, -55.0, "home"),
                event("u\"2", 1_700_000_060, -81.5, "cafe, main st"),
            ],
        )
    }

    #[test]
    fn test_copy_csv() {
        let csv = String::from_utf8(copy_csv(&chunk())).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], r#""u1",2023-11-14T22:13:20Z,-55,"home""#);
        assert_eq!(lines[1], r#""u""2",2023-11-14T22:14:20Z,-81.5,"cafe, main st""#);
    }

    #[test]
    fn test_line_protocol_escapes_tags() {
        let lp = line_protocol(&chunk());
        let lines: Vec<&str> = lp.lines().collect();
        assert_eq!(
            lines[0],
            "user_events,ssid=home,user_id=u1 rssi=-55.0 1700000000"
        );
        assert_eq!(
            lines[1],
            r#"user_events,ssid=cafe\,\ main\ st,user_id=u"2 rssi=-81.5 1700000060"#
        );
    }

    #[test]
    fn test_line_protocol_omits_empty_tags() {
        let lp = line_protocol(&Chunk::new(0, vec![event("u1", 0, -40.0, "")]));
        assert_eq!(lp, "user_events,user_id=u1 rssi=-40.0 0\n");
    }

    #[test]
    fn test_json_each_row_numbers_rows() {
        let body = json_each_row(&chunk(), 10).unwrap();
        let rows: Vec<serde_json::Value> = body
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], 10);
        assert_eq!(rows[1]["id"], 11);
        assert_eq!(rows[1]["timestamp"], 1_700_000_060);
        assert_eq!(rows[1]["ssid"], "cafe, main st");
    }

    #[test]
    fn test_empty_chunk() {
        let empty = Chunk::new(3, Vec::new());
        assert!(copy_csv(&empty).is_empty());
        assert!(line_protocol(&empty).is_empty());
        assert!(json_each_row(&empty, 0).unwrap().is_empty());
    }
}
