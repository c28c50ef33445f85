//! Durable document store.
//!
//! Directory layout:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK           # Advisory lock for single-process access
//! └─ oplog.cbor     # Append-only log of record versions
//! ```
//!
//! Each log entry is a big-endian `u32` length followed by one CBOR-encoded
//! record. Inserts and updates log the record's complete new version, so
//! replaying the log in order rebuilds every collection. A torn final entry
//! (from a crash mid-append) is dropped on open.

use crate::backend::DocumentStore;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::memory::InMemoryStore;
use crate::options::{FindOptions, IndexSpec, Projection, UpdateResult};
use crate::stats::StoreStats;
use crate::update::Update;
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use spnet_value::{from_cbor, to_cbor, Document, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "oplog.cbor";
const HEADER_LEN: usize = 4;

#[derive(Debug, Serialize, Deserialize)]
enum LogRecord {
    Put { collection: String, document: Document },
    Delete { collection: String, id: Value },
    Index { collection: String, spec: IndexSpec },
}

/// A file-backed document store.
///
/// Records are served from memory. A write reaches memory only after its
/// log entry was appended; a failed append leaves both untouched.
///
/// # Durability
///
/// With [`StoreConfig::sync_on_write`] set (the default) the log is
/// fsynced after every write.
///
/// # Example
///
/// ```no_run
/// use spnet_store::{DocumentStore, FileStore, Filter};
/// use spnet_value::doc;
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("spnet_data")).unwrap();
/// let id = store.insert("paper", doc! { "title" => "X" }).unwrap();
/// drop(store);
///
/// let store = FileStore::open(Path::new("spnet_data")).unwrap();
/// assert!(store.find_one("paper", &Filter::by_id(id), None).unwrap().is_some());
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    memory: InMemoryStore,
    log: Mutex<File>,
    config: StoreConfig,
    _lock_file: File,
}

impl FileStore {
    /// Opens (or creates) a store directory with default configuration.
    ///
    /// # Errors
    ///
    /// See [`FileStore::open_with_config`].
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens a store directory and replays its operation log.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (`Locked`)
    /// - The log is corrupted before its final entry (`Corrupted`)
    /// - I/O errors occur
    pub fn open_with_config(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        if !path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("store directory does not exist: {}", path.display()),
                )));
            }
        }
        if !path.is_dir() {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        let mut log = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOG_FILE))?;

        let memory = InMemoryStore::new();
        let mut bytes = Vec::new();
        log.read_to_end(&mut bytes)?;
        let (valid, replayed) = replay(&bytes, &memory)?;
        if valid < bytes.len() {
            warn!(
                path = %path.display(),
                dropped = bytes.len() - valid,
                "truncating torn entry at end of operation log"
            );
            log.set_len(valid as u64)?;
        }
        log.seek(SeekFrom::End(0))?;
        debug!(path = %path.display(), replayed, "opened file store");

        Ok(Self {
            path: path.to_path_buf(),
            memory,
            log: Mutex::new(log),
            config,
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the operation log path.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Operation counters.
    #[must_use]
    pub fn stats(&self) -> &StoreStats {
        self.memory.stats()
    }

    /// Appends one entry. On failure the log is cut back to where the
    /// entry started.
    fn append(&self, log: &mut File, record: &LogRecord) -> StoreResult<()> {
        let body = to_cbor(record)?;
        let len = u32::try_from(body.len()).map_err(|_| {
            StoreError::Corrupted(format!("log entry of {} bytes is too large", body.len()))
        })?;
        let mut entry = Vec::with_capacity(HEADER_LEN + body.len());
        entry.extend_from_slice(&len.to_be_bytes());
        entry.extend_from_slice(&body);

        let start = log.seek(SeekFrom::End(0))?;
        if let Err(err) = write_entry(log, &entry, self.config.sync_on_write) {
            warn!(error = %err, offset = start, "operation log append failed");
            log.set_len(start)?;
            log.seek(SeekFrom::Start(start))?;
            return Err(err.into());
        }
        self.memory.stats().record_logged(entry.len() as u64);
        Ok(())
    }
}

fn write_entry(log: &mut File, entry: &[u8], sync: bool) -> io::Result<()> {
    log.write_all(entry)?;
    if sync {
        log.sync_data()
    } else {
        log.flush()
    }
}

/// Applies every complete entry of `bytes`. Returns the length of the
/// valid prefix and the number of entries applied.
fn replay(bytes: &[u8], memory: &InMemoryStore) -> StoreResult<(usize, usize)> {
    let mut offset = 0;
    let mut applied = 0;
    while bytes.len() - offset >= HEADER_LEN {
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&bytes[offset..offset + HEADER_LEN]);
        let start = offset + HEADER_LEN;
        let end = start + u32::from_be_bytes(header) as usize;
        if end > bytes.len() {
            break;
        }
        let record: LogRecord = match from_cbor(&bytes[start..end]) {
            Ok(record) => record,
            Err(err) if end == bytes.len() => {
                warn!(error = %err, "undecodable final log entry");
                break;
            }
            Err(err) => {
                return Err(StoreError::Corrupted(format!(
                    "log entry at offset {offset}: {err}"
                )))
            }
        };
        match record {
            LogRecord::Put {
                collection,
                document,
            } => memory.restore(&collection, document)?,
            LogRecord::Delete { collection, id } => memory.restore_delete(&collection, &id),
            LogRecord::Index { collection, spec } => memory.ensure_index(&collection, &spec)?,
        }
        applied += 1;
        offset = end;
    }
    Ok((offset, applied))
}

impl DocumentStore for FileStore {
    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> StoreResult<Option<Document>> {
        self.memory.find_one(collection, filter, projection)
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        self.memory.find(collection, filter, options)
    }

    fn insert(&self, collection: &str, document: Document) -> StoreResult<Value> {
        let mut log = self.log.lock();
        let stored = self.memory.insert_document(collection, document, |stored| {
            self.append(
                &mut log,
                &LogRecord::Put {
                    collection: collection.to_string(),
                    document: stored.clone(),
                },
            )
        })?;
        Ok(stored.id().cloned().unwrap_or(Value::Null))
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult> {
        let mut log = self.log.lock();
        self.memory.update_document(collection, filter, update, |document| {
            self.append(
                &mut log,
                &LogRecord::Put {
                    collection: collection.to_string(),
                    document: document.clone(),
                },
            )
        })
    }

    fn delete_one(&self, collection: &str, filter: &Filter) -> StoreResult<bool> {
        let mut log = self.log.lock();
        let removed = self.memory.delete_document(collection, filter, |id| {
            self.append(
                &mut log,
                &LogRecord::Delete {
                    collection: collection.to_string(),
                    id: id.clone(),
                },
            )
        })?;
        Ok(removed.is_some())
    }

    fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.memory.count(collection, filter)
    }

    fn ensure_index(&self, collection: &str, spec: &IndexSpec) -> StoreResult<()> {
        let mut log = self.log.lock();
        self.memory.index_collection(collection, spec, || {
            self.append(
                &mut log,
                &LogRecord::Index {
                    collection: collection.to_string(),
                    spec: spec.clone(),
                },
            )
        })
    }
}
