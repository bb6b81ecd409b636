//! Crash simulation for log segments.
//!
//! [`CrashableStore`] wraps another byte store and stops accepting writes
//! once a byte budget is used up, keeping the part of the write that fit.
//! This leaves exactly the torn tail a power cut leaves.
//!
//! ## Usage
//!
//! ```rust
//! use tidewal_core::{LogFiles, LogVersion, LogWriter, TransactionId};
//! use tidewal_store::MemoryStore;
//! use tidewal_testkit::crash::CrashableStore;
//!
//! let files = LogFiles::in_memory();
//! let store = CrashableStore::new(Box::new(MemoryStore::new()));
//! let control = store.control();
//! files
//!     .create_segment_with_store(LogVersion::INITIAL, TransactionId::BASE, 0, Box::new(store))
//!     .unwrap();
//!
//! let mut writer = LogWriter::new(&files).unwrap();
//! writer.append_transaction(&[], &[]).unwrap();
//! control.crash_after_more(10);
//! assert!(writer.append_transaction(&[], &[]).is_err());
//! assert!(control.has_crashed());
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tidewal_store::{ByteStore, StoreError, StoreResult};

/// Crash settings shared between a [`CrashableStore`] and the test driving
/// it.
#[derive(Debug)]
pub struct CrashControl {
    crash_after_bytes: AtomicU64,
    bytes_written: AtomicU64,
    crashed: AtomicBool,
    fail_on_sync: AtomicBool,
}

impl CrashControl {
    fn new() -> Self {
        Self {
            crash_after_bytes: AtomicU64::new(u64::MAX),
            bytes_written: AtomicU64::new(0),
            crashed: AtomicBool::new(false),
            fail_on_sync: AtomicBool::new(false),
        }
    }

    /// Crashes once `bytes` bytes in total have been written.
    pub fn crash_after(&self, bytes: u64) {
        self.crash_after_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Crashes after `bytes` more bytes are written.
    pub fn crash_after_more(&self, bytes: u64) {
        let written = self.bytes_written.load(Ordering::SeqCst);
        self.crash_after(written.saturating_add(bytes));
    }

    /// Sets whether flush and sync should fail.
    pub fn set_fail_on_sync(&self, fail: bool) {
        self.fail_on_sync.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of bytes that reached the inner store.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::SeqCst)
    }

    /// Returns whether the store has crashed.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Brings the store back up, as after a restart.
    pub fn restart(&self) {
        self.crash_after_bytes.store(u64::MAX, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
        self.fail_on_sync.store(false, Ordering::SeqCst);
    }

    fn crash(&self, message: &str) -> StoreError {
        self.crashed.store(true, Ordering::SeqCst);
        StoreError::Io(io::Error::new(io::ErrorKind::Other, message.to_string()))
    }
}

/// A byte store wrapper that can simulate crashes.
///
/// Once crashed, every write fails until [`CrashControl::restart`]. Reads
/// and truncation always go through, so recovery can run on what was left.
pub struct CrashableStore {
    inner: Box<dyn ByteStore>,
    control: Arc<CrashControl>,
}

impl CrashableStore {
    /// Wraps `inner`. Bytes already in it don't count against the budget.
    pub fn new(inner: Box<dyn ByteStore>) -> Self {
        Self {
            inner,
            control: Arc::new(CrashControl::new()),
        }
    }

    /// Returns the handle that sets crash points on this store.
    pub fn control(&self) -> Arc<CrashControl> {
        Arc::clone(&self.control)
    }
}

impl ByteStore for CrashableStore {
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StoreResult<u64> {
        let control = &self.control;
        if control.has_crashed() {
            return Err(control.crash("store is down after simulated crash"));
        }

        let written = control.bytes_written.load(Ordering::SeqCst);
        let threshold = control.crash_after_bytes.load(Ordering::SeqCst);
        let len = data.len() as u64;

        // Check if this write will cross the crash threshold
        if written.saturating_add(len) > threshold {
            let partial = threshold.saturating_sub(written) as usize;
            if partial > 0 {
                self.inner.append(&data[..partial])?;
                control.bytes_written.fetch_add(partial as u64, Ordering::SeqCst);
            }
            return Err(control.crash("simulated crash during write"));
        }

        let offset = self.inner.append(data)?;
        control.bytes_written.fetch_add(len, Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&mut self) -> StoreResult<()> {
        if self.control.fail_on_sync.load(Ordering::SeqCst) {
            return Err(self.control.crash("simulated crash during flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StoreResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StoreResult<()> {
        if self.control.fail_on_sync.load(Ordering::SeqCst) {
            return Err(self.control.crash("simulated crash during sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StoreResult<()> {
        self.inner.truncate(new_size)
    }
}
