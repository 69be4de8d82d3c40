// ABOUTME: File-backed state store keeping one JSON document per scope.
// ABOUTME: Commits rewrite the document via a temp file and rename, so each write is atomic.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tokio::sync::Mutex;

use crate::types::{ResourceId, ScopeId};

use super::StateStore;
use super::error::{CorruptSnafu, ReadSnafu, SerializeSnafu, StoreError, WriteSnafu};
use super::lock::{DEFAULT_STALE_AFTER, ScopeLock};
use super::record::{StateRecord, sort_by_sequence};

const FORMAT_VERSION: u32 = 1;

/// On-disk layout of `<dir>/<scope>.json`.
#[derive(Debug, Serialize, Deserialize)]
struct ScopeDocument {
    version: u32,
    scope: ScopeId,
    records: Vec<StateRecord>,
}

#[derive(Debug)]
pub struct FileStateStore {
    dir: PathBuf,
    stale_after: Duration,
    // Serializes read-modify-write cycles within this process.
    write: Mutex<()>,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stale_after: DEFAULT_STALE_AFTER,
            write: Mutex::new(()),
        }
    }

    /// Age after which another process's lock is broken automatically.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the state document for a scope.
    pub fn scope_path(&self, scope: &ScopeId) -> PathBuf {
        self.dir.join(format!("{scope}.json"))
    }

    async fn read_records(&self, scope: &ScopeId) -> Result<Vec<StateRecord>, StoreError> {
        let path = self.scope_path(scope);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context(ReadSnafu { path }),
        };

        let document: ScopeDocument =
            serde_json::from_slice(&bytes).context(CorruptSnafu { path: &path })?;
        tracing::debug!(
            "Loaded {} record(s) for scope {} from {}",
            document.records.len(),
            scope,
            path.display()
        );
        Ok(document.records)
    }

    async fn write_records(
        &self,
        scope: &ScopeId,
        mut records: Vec<StateRecord>,
    ) -> Result<(), StoreError> {
        let path = self.scope_path(scope);

        if records.is_empty() {
            return match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).context(WriteSnafu { path }),
            };
        }

        sort_by_sequence(&mut records);
        let document = ScopeDocument {
            version: FORMAT_VERSION,
            scope: scope.clone(),
            records,
        };
        let bytes = serde_json::to_vec_pretty(&document).context(SerializeSnafu {
            scope: scope.clone(),
        })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .context(WriteSnafu { path: &self.dir })?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .context(WriteSnafu { path: &tmp })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .context(WriteSnafu { path: &path })?;

        tracing::debug!("Saved scope {} to {}", scope, path.display());
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, scope: &ScopeId) -> Result<Vec<StateRecord>, StoreError> {
        let mut records = self.read_records(scope).await?;
        sort_by_sequence(&mut records);
        Ok(records)
    }

    async fn get(
        &self,
        scope: &ScopeId,
        id: &ResourceId,
    ) -> Result<Option<StateRecord>, StoreError> {
        Ok(self
            .read_records(scope)
            .await?
            .into_iter()
            .find(|record| &record.id == id))
    }

    async fn put(&self, scope: &ScopeId, record: StateRecord) -> Result<(), StoreError> {
        let _guard = self.write.lock().await;
        let mut records = self.read_records(scope).await?;
        records.retain(|existing| existing.id != record.id);
        records.push(record);
        self.write_records(scope, records).await
    }

    async fn remove(
        &self,
        scope: &ScopeId,
        id: &ResourceId,
    ) -> Result<Option<StateRecord>, StoreError> {
        let _guard = self.write.lock().await;
        let mut records = self.read_records(scope).await?;
        let Some(index) = records.iter().position(|record| &record.id == id) else {
            return Ok(None);
        };
        let removed = records.remove(index);
        self.write_records(scope, records).await?;
        Ok(Some(removed))
    }

    async fn list_scopes(&self) -> Result<Vec<ScopeId>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context(ReadSnafu { path: &self.dir }),
        };

        let mut scopes = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .context(ReadSnafu { path: &self.dir })?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match ScopeId::new(stem) {
                Ok(scope) => scopes.push(scope),
                Err(e) => tracing::debug!("Skipping {}: {}", path.display(), e),
            }
        }
        scopes.sort();
        Ok(scopes)
    }

    async fn lock(&self, scope: &ScopeId, force: bool) -> Result<ScopeLock, StoreError> {
        ScopeLock::acquire_file(&self.dir, scope, self.stale_after, force).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_path_uses_scope_name() {
        let store = FileStateStore::new("/tmp/kiln-state");
        let scope = ScopeId::new("shop-prod").unwrap();
        assert_eq!(
            store.scope_path(&scope),
            PathBuf::from("/tmp/kiln-state/shop-prod.json")
        );
    }

    #[test]
    fn default_stale_after_is_one_hour() {
        let store = FileStateStore::new("/tmp/kiln-state");
        assert_eq!(store.stale_after, Duration::from_secs(3600));
    }
}
