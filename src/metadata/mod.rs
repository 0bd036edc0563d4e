use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, StorageBackend, TableDefinition};
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::{self, ReadOutcome};

mod entry;

pub use entry::Resource;

const RESOURCES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("resources");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create metadata directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open metadata store at {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: redb::Error,
    },
    #[error("metadata store operation failed")]
    Backend(#[from] redb::Error),
    #[error("failed to encode resource '{name}'")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode resource '{name}'")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub writes: u64,
}

/// Durable resource metadata, keyed by resource name.
///
/// The handle is cheap to share behind an `Arc`. Individual reads and writes are transactional,
/// but `get` followed by `save` is not: two callers updating the same name concurrently can
/// lose an update, and the last save wins. That is acceptable for visit counts; a field that
/// needs exact accounting must not be maintained this way.
///
/// Calls block on local disk I/O. Async callers should move them onto a blocking thread.
pub struct MetadataStore {
    db: Database,
    path: PathBuf,
    writes: AtomicU64,
}

impl MetadataStore {
    /// Opens the store at `path`, creating the file and its parent directory if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let db = Database::create(&path).map_err(|err| StoreError::Open {
            path: path.clone(),
            source: err.into(),
        })?;
        Self::from_database(db, path)
    }

    /// Opens a store on a caller-supplied redb backend. `label` stands in for the file path
    /// in logs and errors.
    pub fn with_backend(
        backend: impl StorageBackend,
        label: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let path = label.into();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(|err| StoreError::Open {
                path: path.clone(),
                source: err.into(),
            })?;
        Self::from_database(db, path)
    }

    /// A store that lives only as long as the handle.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_backend(InMemoryBackend::new(), ":memory:")
    }

    fn from_database(db: Database, path: PathBuf) -> Result<Self, StoreError> {
        ensure_table(&db).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "metadata store opened");
        Ok(Self {
            db,
            path,
            writes: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    /// Looks up a stored record, distinguishing "absent" from "unreadable".
    pub fn try_get(&self, name: &str) -> Result<Option<Resource>, StoreError> {
        let Some(bytes) = self.read_raw(name)? else {
            return Ok(None);
        };
        let mut resource: Resource =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                name: name.to_string(),
                source,
            })?;
        resource.set_name(name);
        Ok(Some(resource))
    }

    /// Returns the stored record, or a fresh one carrying only `name` when nothing usable is
    /// stored. Read and decode failures are logged and treated like a missing record.
    pub fn get(&self, name: &str) -> Resource {
        match self.try_get(name) {
            Ok(Some(resource)) => {
                metrics::record_metadata_read(ReadOutcome::Hit);
                resource
            }
            Ok(None) => {
                metrics::record_metadata_read(ReadOutcome::Miss);
                Resource::new(name)
            }
            Err(err) => {
                metrics::record_metadata_read(ReadOutcome::Error);
                warn!(
                    resource = name,
                    error = %format!("{:#}", anyhow::Error::from(err)),
                    "resource metadata unreadable; starting fresh"
                );
                Resource::new(name)
            }
        }
    }

    /// Overwrites the full record under its name.
    pub fn try_save(&self, resource: &Resource) -> Result<(), StoreError> {
        let value = serde_json::to_vec(resource).map_err(|source| StoreError::Encode {
            name: resource.name().to_string(),
            source,
        })?;
        self.write_raw(resource.name(), &value)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Best-effort save: a failure is logged and otherwise ignored so metadata problems never
    /// fail the request being served.
    pub fn save(&self, resource: &Resource) {
        match self.try_save(resource) {
            Ok(()) => metrics::record_metadata_write(true),
            Err(err) => {
                metrics::record_metadata_write(false);
                warn!(
                    resource = resource.name(),
                    error = %format!("{:#}", anyhow::Error::from(err)),
                    "failed to save resource metadata"
                );
            }
        }
    }

    pub fn increment_visits(&self, resource: &mut Resource) {
        resource.visits = resource.visits.saturating_add(1);
        self.save(resource);
    }

    /// Records a new background-download status; repeating the current status writes nothing.
    pub fn update_download(&self, resource: &mut Resource, status: &str) {
        if resource.download_status == status {
            return;
        }
        resource.download_status = status.to_string();
        self.save(resource);
    }

    fn read_raw(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(RESOURCES).map_err(redb::Error::from)?;
        let value = table
            .get(name.as_bytes())
            .map_err(redb::Error::from)?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn write_raw(&self, name: &str, value: &[u8]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut table = txn.open_table(RESOURCES).map_err(redb::Error::from)?;
            table
                .insert(name.as_bytes(), value)
                .map_err(redb::Error::from)?;
        }
        txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }
}

impl fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataStore")
            .field("path", &self.path)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

fn ensure_table(db: &Database) -> Result<(), redb::Error> {
    let txn = db.begin_write()?;
    txn.open_table(RESOURCES)?;
    txn.commit()?;
    Ok(())
}
