//! Append-only JSON-lines files.

use chorus_error::{ChorusResult, JsonError, StorageError, StorageErrorKind};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Read every record in a JSON-lines file. A missing file reads as empty.
///
/// A torn final line (crash during append) is skipped with a warning;
/// corruption anywhere else is an error.
pub async fn read_lines<T: DeserializeOwned>(path: &Path) -> ChorusResult<Vec<T>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
            .into());
        }
    };

    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut records = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) if index + 1 == lines.len() && !raw.ends_with('\n') => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping torn trailing record");
            }
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::Corrupt(format!(
                    "{} line {}: {}",
                    path.display(),
                    index + 1,
                    e
                )))
                .into());
            }
        }
    }
    Ok(records)
}

/// Append one record and flush it to disk.
pub async fn append_line<T: Serialize>(path: &Path, record: &T) -> ChorusResult<()> {
    let mut line = serde_json::to_vec(record).map_err(JsonError::from)?;
    line.push(b'\n');

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                parent.display(),
                e
            )))
        })?;
    }

    let write_err = |e: std::io::Error| {
        StorageError::new(StorageErrorKind::FileWrite(format!("{}: {}", path.display(), e)))
    };
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(write_err)?;
    file.write_all(&line).await.map_err(write_err)?;
    file.sync_data().await.map_err(write_err)?;
    Ok(())
}

/// Replace the whole file with `records`.
pub(crate) async fn rewrite_lines<T: Serialize>(path: &Path, records: &[T]) -> ChorusResult<()> {
    let mut data = Vec::new();
    for record in records {
        data.extend(serde_json::to_vec(record).map_err(JsonError::from)?);
        data.push(b'\n');
    }
    crate::document::write_atomic(path, &data).await
}
