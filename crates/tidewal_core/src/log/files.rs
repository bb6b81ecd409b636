//! Log segment inventory.
//!
//! On disk a log is a directory of segment files:
//!
//! ```text
//! <log_dir>/
//! ├─ LOCK          # Advisory lock for single-process access
//! ├─ txlog.0       # Segment version 0
//! ├─ txlog.1       # Segment version 1
//! └─ ...
//! ```
//!
//! New segments are written to a temporary file and renamed into place, so
//! a segment file always starts with a complete header.

use crate::config::LogConfig;
use crate::error::{CoreError, CoreResult};
use crate::log::cursor::PhysicalTransactionCursor;
use crate::log::{
    LogEntry, LogEntryReader, LogPosition, LogReader, SegmentHeader, SharedStore,
    TransactionCursor, SEGMENT_HEADER_SIZE,
};
use crate::types::{LogVersion, TransactionId};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tidewal_store::{ByteStore, FileStore, MemoryStore, TEMP_SUFFIX};

const LOCK_FILE: &str = "LOCK";

#[derive(Debug)]
struct LogDir {
    path: PathBuf,
    /// Held for exclusive access.
    _lock_file: File,
}

/// The segments of a transaction log, kept open by version.
///
/// # Example
///
/// ```rust
/// use tidewal_core::{LogFiles, LogWriter, TransactionId};
///
/// let files = LogFiles::in_memory();
/// let mut writer = LogWriter::new(&files).unwrap();
/// let (tx_id, _) = writer.append_transaction(&[], &[]).unwrap();
/// assert_eq!(tx_id, TransactionId::new(2));
/// ```
pub struct LogFiles {
    dir: Option<LogDir>,
    config: LogConfig,
    segments: RwLock<BTreeMap<LogVersion, SharedStore>>,
}

impl LogFiles {
    /// Opens the log in `path`, locking the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `LogLocked`)
    /// - A segment file has an invalid header
    /// - I/O errors occur
    pub fn open(path: &Path, config: LogConfig) -> CoreResult<Self> {
        if !path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "log directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::LogLocked);
        }

        let mut segments = BTreeMap::new();
        for dir_entry in fs::read_dir(path)? {
            let file_path = dir_entry?.path();
            let Some(name) = file_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.ends_with(TEMP_SUFFIX) && name.starts_with(config.segment_prefix.as_str()) {
                // Segment creation that never reached its rename.
                tracing::debug!(file = %file_path.display(), "removing leftover segment temp file");
                fs::remove_file(&file_path)?;
                continue;
            }

            let Some(version) = parse_segment_name(&config.segment_prefix, name) else {
                continue;
            };

            let store = FileStore::open(&file_path)?;
            let header = read_header(&store)?;
            if header.log_version != version {
                return Err(CoreError::invalid_format(format!(
                    "segment file {} claims version {}",
                    file_path.display(),
                    header.log_version
                )));
            }

            let store: Box<dyn ByteStore> = Box::new(store);
            segments.insert(version, Arc::new(Mutex::new(store)));
        }

        tracing::debug!(
            path = %path.display(),
            segments = segments.len(),
            "opened log directory"
        );

        Ok(Self {
            dir: Some(LogDir {
                path: path.to_path_buf(),
                _lock_file: lock_file,
            }),
            config,
            segments: RwLock::new(segments),
        })
    }

    /// Creates an empty log held in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            config: LogConfig::default(),
            segments: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the log directory, or `None` for an in-memory log.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(|dir| dir.path.as_path())
    }

    /// Returns the configuration the log was opened with.
    #[must_use]
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Returns the path of a segment file, or `None` for an in-memory log.
    #[must_use]
    pub fn segment_path(&self, version: LogVersion) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| {
            dir.path
                .join(format!("{}.{}", self.config.segment_prefix, version.as_u64()))
        })
    }

    /// Creates segment `version`, which must be newer than every existing
    /// segment.
    ///
    /// `last_committed_tx` and `last_checksum` describe the last transaction
    /// written before the segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is not the newest or on I/O failure.
    pub fn create_segment(
        &self,
        version: LogVersion,
        last_committed_tx: TransactionId,
        last_checksum: u64,
    ) -> CoreResult<SharedStore> {
        self.check_new_version(version)?;
        let header = SegmentHeader::new(version, last_committed_tx, last_checksum);

        let store: Box<dyn ByteStore> = match &self.dir {
            Some(dir) => {
                let Some(final_path) = self.segment_path(version) else {
                    return Err(CoreError::invalid_operation("segment path unavailable"));
                };
                let store = FileStore::create(&final_path, &header.encode())?;
                sync_directory(&dir.path)?;
                Box::new(store)
            }
            None => Box::new(MemoryStore::with_data(header.encode().to_vec())),
        };

        Ok(self.register(version, store))
    }

    /// Creates segment `version` on a caller-supplied, empty store.
    ///
    /// Used to run a log over a store with special behavior, such as one
    /// that simulates crashes.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is not the newest, the store is not
    /// empty, or the header cannot be written.
    pub fn create_segment_with_store(
        &self,
        version: LogVersion,
        last_committed_tx: TransactionId,
        last_checksum: u64,
        mut store: Box<dyn ByteStore>,
    ) -> CoreResult<SharedStore> {
        self.check_new_version(version)?;
        if store.size()? != 0 {
            return Err(CoreError::invalid_operation(
                "segment store must be empty before creation",
            ));
        }

        let header = SegmentHeader::new(version, last_committed_tx, last_checksum);
        store.append(&header.encode())?;
        store.sync()?;
        Ok(self.register(version, store))
    }

    fn check_new_version(&self, version: LogVersion) -> CoreResult<()> {
        if let Some(highest) = self.highest_version() {
            if version <= highest {
                return Err(CoreError::invalid_operation(format!(
                    "segment {version} is not newer than existing segment {highest}"
                )));
            }
        }
        Ok(())
    }

    fn register(&self, version: LogVersion, store: Box<dyn ByteStore>) -> SharedStore {
        let shared = Arc::new(Mutex::new(store));
        self.segments.write().insert(version, Arc::clone(&shared));
        tracing::debug!(%version, "created log segment");
        shared
    }

    /// Returns all segment versions in ascending order.
    #[must_use]
    pub fn versions(&self) -> Vec<LogVersion> {
        self.segments.read().keys().copied().collect()
    }

    /// Returns the lowest segment version.
    #[must_use]
    pub fn lowest_version(&self) -> Option<LogVersion> {
        self.segments.read().keys().next().copied()
    }

    /// Returns the highest segment version.
    #[must_use]
    pub fn highest_version(&self) -> Option<LogVersion> {
        self.segments.read().keys().next_back().copied()
    }

    /// Returns `true` if segment `version` exists.
    #[must_use]
    pub fn has_version(&self, version: LogVersion) -> bool {
        self.segments.read().contains_key(&version)
    }

    /// Returns the store of segment `version`.
    #[must_use]
    pub fn segment(&self, version: LogVersion) -> Option<SharedStore> {
        self.segments.read().get(&version).cloned()
    }

    /// Returns the size in bytes of segment `version`.
    pub fn segment_size(&self, version: LogVersion) -> CoreResult<Option<u64>> {
        match self.segment(version) {
            Some(store) => Ok(Some(store.lock().size()?)),
            None => Ok(None),
        }
    }

    /// Reads the header of segment `version`.
    pub fn segment_header(&self, version: LogVersion) -> CoreResult<Option<SegmentHeader>> {
        match self.segment(version) {
            Some(store) => Ok(Some(read_header(&**store.lock())?)),
            None => Ok(None),
        }
    }

    /// Returns the position of the first entry of segment `version`.
    #[must_use]
    pub fn start_of_segment(&self, version: LogVersion) -> LogPosition {
        LogPosition::new(version, SEGMENT_HEADER_SIZE)
    }

    /// Opens a raw entry reader at `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment doesn't exist or the position lies in
    /// its header or past its end.
    pub fn entries(&self, position: LogPosition) -> CoreResult<LogEntryReader> {
        let store = self.segment(position.version()).ok_or_else(|| {
            CoreError::invalid_operation(format!(
                "log segment {} does not exist",
                position.version()
            ))
        })?;
        if position.byte_offset() < SEGMENT_HEADER_SIZE {
            return Err(CoreError::invalid_operation(format!(
                "position {position} lies inside the segment header"
            )));
        }
        LogEntryReader::new(store, position)
    }

    /// Appends raw bytes to segment `version`, returning their offset.
    ///
    /// Syncs when `sync_on_write` is set.
    pub fn append_raw(&self, version: LogVersion, bytes: &[u8]) -> CoreResult<u64> {
        let store = self.segment(version).ok_or_else(|| {
            CoreError::invalid_operation(format!("log segment {version} does not exist"))
        })?;
        let mut store = store.lock();
        let offset = store.append(bytes)?;
        store.flush()?;
        if self.config.sync_on_write {
            store.sync()?;
        }
        Ok(offset)
    }

    /// Discards everything after `position`.
    ///
    /// Later segments are deleted first, then the segment holding `position`
    /// is cut and synced. A crash in between leaves a log that is truncated
    /// again by the next recovery.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment doesn't exist or on I/O failure.
    pub fn truncate_after(&self, position: LogPosition) -> CoreResult<()> {
        let version = position.version();
        let store = self.segment(version).ok_or_else(|| {
            CoreError::invalid_operation(format!("log segment {version} does not exist"))
        })?;

        let later: Vec<LogVersion> = self
            .segments
            .read()
            .range(version.next()..)
            .map(|(v, _)| *v)
            .collect();
        for later_version in later.iter().rev() {
            self.segments.write().remove(later_version);
            if let Some(path) = self.segment_path(*later_version) {
                if path.exists() {
                    fs::remove_file(&path)?;
                }
            }
            tracing::info!(version = %later_version, "deleted log segment after truncation point");
        }
        if let (Some(dir), false) = (&self.dir, later.is_empty()) {
            sync_directory(&dir.path)?;
        }

        let mut store = store.lock();
        if store.size()? > position.byte_offset() {
            store.truncate(position.byte_offset())?;
        }
        Ok(())
    }

    /// Returns `true` if a transaction starts at or after `position`.
    ///
    /// Unreadable entries count as a transaction.
    pub fn has_transactions_after(&self, position: LogPosition) -> CoreResult<bool> {
        let versions: Vec<LogVersion> = self
            .segments
            .read()
            .range(position.version()..)
            .map(|(v, _)| *v)
            .collect();

        for version in versions {
            let start = if version == position.version() {
                position
            } else {
                self.start_of_segment(version)
            };
            let mut reader = self.entries(start)?;
            for item in reader.by_ref() {
                match item {
                    Ok((_, LogEntry::CheckPoint { .. })) => {}
                    Ok(_) => return Ok(true),
                    Err(err) if err.is_corruption() => return Ok(true),
                    Err(err) => return Err(err),
                }
            }
            if reader.has_unread_bytes() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl LogReader for LogFiles {
    fn current_version(&self) -> CoreResult<Option<LogVersion>> {
        Ok(self.highest_version())
    }

    fn lowest_version(&self) -> CoreResult<Option<LogVersion>> {
        Ok(LogFiles::lowest_version(self))
    }

    fn segment_end(&self, version: LogVersion) -> CoreResult<Option<u64>> {
        self.segment_size(version)
    }

    fn has_transactions_after(&self, position: LogPosition) -> CoreResult<bool> {
        LogFiles::has_transactions_after(self, position)
    }

    fn open(&self, position: LogPosition) -> CoreResult<Box<dyn TransactionCursor + '_>> {
        Ok(Box::new(PhysicalTransactionCursor::new(self, position)?))
    }

    fn truncate_after(&self, position: LogPosition) -> CoreResult<()> {
        LogFiles::truncate_after(self, position)
    }
}

fn parse_segment_name(prefix: &str, name: &str) -> Option<LogVersion> {
    let digits = name.strip_prefix(prefix)?.strip_prefix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(LogVersion::new)
}

fn read_header(store: &dyn ByteStore) -> CoreResult<SegmentHeader> {
    let size = store.size()?;
    if size < SEGMENT_HEADER_SIZE {
        return Err(CoreError::invalid_format(format!(
            "segment too short for header: {size} bytes"
        )));
    }
    let bytes = store.read_at(0, SEGMENT_HEADER_SIZE as usize)?;
    SegmentHeader::decode(&bytes)
}

/// Syncs a directory so file creations, renames and deletions are durable.
#[cfg(unix)]
pub(crate) fn sync_directory(path: &Path) -> CoreResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_directory(_path: &Path) -> CoreResult<()> {
    // NTFS journals metadata; directory handles can't be fsynced.
    Ok(())
}
