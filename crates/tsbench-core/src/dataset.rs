//! Chunked dataset reader.
//!
//! A dataset is a directory holding nothing but chunk files named
//! `<prefix><index>.json`, indexed from zero. Whether more chunks remain is
//! decided by counting the directory's entries on every read, so the
//! directory must not contain anything else.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::event::{Chunk, Event, ReadingFile};

/// Default directory holding the chunk files.
pub const DEFAULT_DATA_DIR: &str = "../data/readings";

/// Default chunk file name prefix.
pub const DEFAULT_CHUNK_PREFIX: &str = "readings_";

/// Where the chunk files live and how they are named.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub dir: PathBuf,
    pub prefix: String,
}

impl DatasetConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_CHUNK_PREFIX.to_string(),
        }
    }

    /// Set the chunk file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Path of the chunk file at `index`.
    pub fn chunk_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}{}.json", self.prefix, index))
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

/// A decoded chunk and whether another one follows it.
#[derive(Debug)]
pub struct LoadedChunk {
    pub has_more: bool,
    pub chunk: Chunk,
}

/// Reads chunk files one at a time, in ascending index order.
#[derive(Debug, Clone)]
pub struct ChunkReader {
    config: DatasetConfig,
}

impl ChunkReader {
    pub fn new(config: DatasetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Read and decode the chunk at `index`.
    ///
    /// `has_more` is `index + 1 < entries in the directory`, evaluated after
    /// the chunk has been decoded.
    pub async fn read(&self, index: usize) -> Result<LoadedChunk> {
        info!(chunk = index, "Loading data chunk");
        let path = self.config.chunk_path(index);

        let bytes = tokio::fs::read(&path).await.map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        let chunk = decode_chunk(&path, index, &bytes)?;

        let entries = count_entries(&self.config.dir).await?;
        let has_more = index + 1 < entries;
        debug!(
            chunk = index,
            records = chunk.len(),
            entries,
            has_more,
            "Decoded data chunk"
        );

        Ok(LoadedChunk { has_more, chunk })
    }

    /// Number of entries currently in the dataset directory.
    pub async fn chunk_count(&self) -> Result<usize> {
        count_entries(&self.config.dir).await
    }
}

fn decode_chunk(path: &Path, index: usize, bytes: &[u8]) -> Result<Chunk> {
    let file: ReadingFile = serde_json::from_slice(bytes).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let events = file
        .response
        .into_iter()
        .enumerate()
        .map(|(position, reading)| {
            Event::try_from(reading).map_err(|reason| Error::InvalidRecord {
                path: path.to_path_buf(),
                position,
                reason,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Chunk::new(index, events))
}

async fn count_entries(dir: &Path) -> Result<usize> {
    let io_error = |source| Error::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_error)?;
    let mut count = 0;
    while entries.next_entry().await.map_err(io_error)?.is_some() {
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_chunk(dir: &Path, index: usize, users: &[&str]) {
        let records: Vec<String> = users
            .iter()
            .enumerate()
            .map(|(i, user)| {
                format!(
                    r#"{{"userId":"{}","lastUpdatedTime":{},"connection":{{"ssid":"net-{}","rssi":-{}.5}}}}"#,
                    user,
                    1_700_000_000 + i,
                    i,
                    40 + i
                )
            })
            .collect();
        let body = format!(r#"{{"response":[{}]}}"#, records.join(","));
        std::fs::write(dir.join(format!("readings_{}.json", index)), body).unwrap();
    }

    #[tokio::test]
    async fn test_has_more_false_only_on_last_chunk() {
        let dir = tempfile::tempdir().unwrap();
        for index in 0..3 {
            write_chunk(dir.path(), index, &["a", "b"]);
        }
        let reader = ChunkReader::new(DatasetConfig::new(dir.path()));

        let flags: Vec<bool> = {
            let mut flags = Vec::new();
            for index in 0..3 {
                flags.push(reader.read(index).await.unwrap().has_more);
            }
            flags
        };
        assert_eq!(flags, vec![true, true, false]);

        // Reading past the last chunk is an I/O error, not another `false`.
        assert!(matches!(reader.read(3).await, Err(Error::Io { .. })));
    }

    #[tokio::test]
    async fn test_decodes_events_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        write_chunk(dir.path(), 0, &["alice", "bob", "carol"]);
        let reader = ChunkReader::new(DatasetConfig::new(dir.path()));

        let loaded = reader.read(0).await.unwrap();
        assert!(!loaded.has_more);
        assert_eq!(loaded.chunk.index(), 0);
        let users: Vec<&str> = loaded.chunk.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(users, vec!["alice", "bob", "carol"]);
        assert_eq!(loaded.chunk.events()[1].rssi, -41.5);
        assert_eq!(loaded.chunk.events()[2].unix_seconds(), 1_700_000_002);
    }

    #[tokio::test]
    async fn test_missing_chunk_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ChunkReader::new(DatasetConfig::new(dir.path()));
        assert!(matches!(reader.read(0).await, Err(Error::Io { .. })));
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readings_0.json"), r#"{"response": [{"userId": 7}]}"#)
            .unwrap();
        let reader = ChunkReader::new(DatasetConfig::new(dir.path()));
        assert!(matches!(reader.read(0).await, Err(Error::Decode { .. })));
    }

    #[tokio::test]
    async fn test_stray_file_delays_termination() {
        let dir = tempfile::tempdir().unwrap();
        write_chunk(dir.path(), 0, &["a"]);
        std::fs::write(dir.path().join("notes.txt"), "stray").unwrap();
        let reader = ChunkReader::new(DatasetConfig::new(dir.path()));

        assert!(reader.read(0).await.unwrap().has_more);
        assert_eq!(reader.chunk_count().await.unwrap(), 2);
    }

    #[test]
    fn test_chunk_path_uses_prefix() {
        let config = DatasetConfig::new("/data").with_prefix("part-");
        assert_eq!(config.chunk_path(4), PathBuf::from("/data/part-4.json"));
    }
}
