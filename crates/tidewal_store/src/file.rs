//! File-backed byte store.

use crate::error::{StoreError, StoreResult};
use crate::store::ByteStore;
use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Suffix of the temporary file a store is staged in by [`FileStore::create`].
pub const TEMP_SUFFIX: &str = ".tmp";

/// A byte store backed by one log segment file.
///
/// The file only ever grows by [`append`](ByteStore::append) through this
/// store. Every append checks that the file still ends where the store last
/// left it, so a file changed behind the store's back is reported instead
/// of silently handing out wrong offsets.
///
/// # Durability
///
/// - [`create`](Self::create) stages the initial bytes in a temp file, syncs
///   and renames it, so the file never exists with partial initial contents.
///   The caller syncs the parent directory.
/// - `sync()` calls `File::sync_all()`.
/// - `truncate()` syncs before returning. It only ever discards an
///   unreadable log tail, and a crash must not bring that tail back.
///
/// # Example
///
/// ```no_run
/// use tidewal_store::{ByteStore, FileStore};
/// use std::path::Path;
///
/// let mut store = FileStore::create(Path::new("txlog.0"), b"header").unwrap();
/// let offset = store.append(b"entry").unwrap();
/// assert_eq!(offset, 6);
/// store.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    file: File,
    /// Length of the file as written through this store.
    len: u64,
}

impl FileStore {
    /// Opens an existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist or can't be opened for
    /// reading and writing.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner { file, len }),
        })
    }

    /// Creates a new file at `path` holding `initial`.
    ///
    /// The bytes are written to [`temp_path`](Self::temp_path) first, synced
    /// and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` already exists or on I/O failure. A temp
    /// file left by a failed call is overwritten by the next one.
    pub fn create(path: &Path, initial: &[u8]) -> StoreResult<Self> {
        if path.exists() {
            return Err(StoreError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        let temp = Self::temp_path(path);
        let mut file = File::create(&temp)?;
        file.write_all(initial)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, path)?;

        Self::open(path)
    }

    /// Returns the staging path [`create`](Self::create) uses for `path`.
    #[must_use]
    pub fn temp_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteStore for FileStore {
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let size = inner.len;
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StoreError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        inner.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        inner.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StoreResult<u64> {
        let inner = self.inner.get_mut();
        let offset = inner.len;
        if data.is_empty() {
            return Ok(offset);
        }

        let actual = inner.file.seek(SeekFrom::End(0))?;
        if actual != offset {
            return Err(StoreError::LengthChanged {
                expected: offset,
                actual,
            });
        }
        inner.file.write_all(data)?;
        inner.len += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.inner.get_mut().file.flush()?;
        Ok(())
    }

    fn size(&self) -> StoreResult<u64> {
        Ok(self.inner.lock().len)
    }

    fn sync(&mut self) -> StoreResult<()> {
        self.inner.get_mut().file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StoreResult<()> {
        let inner = self.inner.get_mut();
        if new_size > inner.len {
            return Err(StoreError::TruncateBeyondEnd {
                requested: new_size,
                size: inner.len,
            });
        }

        inner.file.set_len(new_size)?;
        inner.file.sync_all()?;
        inner.len = new_size;
        Ok(())
    }
}
