//! Result artifact persistence.
//!
//! One JSON document per run. Writing replaces any existing artifact at the
//! same path; nothing is ever appended.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::backend::BackendKind;
use crate::error::{Error, Result};
use crate::result::BenchmarkResult;

/// Conventional artifact location for run `run` of `kind` under `dir`.
pub fn artifact_path(dir: impl AsRef<Path>, kind: BackendKind, run: u32) -> PathBuf {
    dir.as_ref().join(format!("{}_{}.json", kind, run))
}

/// Serialize `result` to `path`, overwriting it if present.
pub async fn write(path: &Path, result: &BenchmarkResult) -> Result<()> {
    let mut body = serde_json::to_vec_pretty(result)?;
    body.push(b'\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    tokio::fs::write(path, &body)
        .await
        .map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

    info!(
        path = %path.display(),
        backend = %result.db_type(),
        bytes = body.len(),
        "Wrote benchmark results"
    );
    Ok(())
}

/// Load a previously written artifact.
pub async fn read(path: &Path) -> Result<BenchmarkResult> {
    let bytes = tokio::fs::read(path).await.map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}
