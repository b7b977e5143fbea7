//! JSON output of harvested records.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::models::ReviewRecord;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize records: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize records as a pretty-printed JSON array.
pub fn to_json(records: &[ReviewRecord]) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Write records to `path`, creating parent directories as needed.
///
/// The file is written to a sibling temp path first and renamed into place,
/// so readers never observe a half-written array.
pub async fn write_records(path: &Path, records: &[ReviewRecord]) -> Result<(), OutputError> {
    let json = to_json(records)?;
    let io_err = |source: std::io::Error| OutputError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, json.as_bytes()).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;

    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
