//! Whole-file JSON documents with atomic replacement.

use chorus_error::{ChorusResult, JsonError, StorageError, StorageErrorKind};
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A JSON file holding one value of type `T`.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write leaves the previous version intact.
///
/// # Examples
///
/// ```
/// use chorus_storage::JsonDocument;
/// use std::collections::BTreeMap;
///
/// # #[tokio::main]
/// # async fn main() {
/// let dir = std::env::temp_dir().join("chorus-doc-example");
/// let doc: JsonDocument<BTreeMap<String, u32>> = JsonDocument::new(dir.join("counts.json"));
/// let mut counts = doc.load_or_default().await.unwrap();
/// counts.insert("replies".into(), 3);
/// doc.save(&counts).await.unwrap();
/// assert_eq!(doc.load().await.unwrap().unwrap()["replies"], 3);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct JsonDocument<T> {
    path: PathBuf,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Document stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _phantom: PhantomData,
        }
    }

    /// Location of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document, returning `None` if it does not exist yet.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> ChorusResult<Option<T>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
                .into());
            }
        };
        let value = serde_json::from_str(&raw).map_err(|e| {
            StorageError::new(StorageErrorKind::Corrupt(format!(
                "{}: {}",
                self.path.display(),
                e
            )))
        })?;
        tracing::trace!("Loaded document");
        Ok(Some(value))
    }

    /// Read the document or fall back to `T::default()`.
    pub async fn load_or_default(&self) -> ChorusResult<T>
    where
        T: Default,
    {
        Ok(self.load().await?.unwrap_or_default())
    }

    /// Atomically replace the document with `value`.
    #[tracing::instrument(skip(self, value), fields(path = %self.path.display()))]
    pub async fn save(&self, value: &T) -> ChorusResult<()> {
        let json = serde_json::to_vec_pretty(value).map_err(JsonError::from)?;
        write_atomic(&self.path, &json).await
    }
}

/// Write `data` to `path` through a temp file and rename.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> ChorusResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                parent.display(),
                e
            )))
        })?;
    }

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, data).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "{}: {}",
            temp_path.display(),
            e
        )))
    })?;

    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        )))
    })?;
    Ok(())
}
