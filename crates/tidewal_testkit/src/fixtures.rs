//! Log fixtures.
//!
//! [`TestLog`] owns a [`LogFiles`] in memory or in a temp directory and
//! offers shortcuts for filling it with transactions, checkpoints and torn
//! writes.

use std::ops::Deref;
use std::path::Path;
use tempfile::TempDir;
use tidewal_core::{
    CheckpointSource, Command, CoreError, CoreResult, LatestCheckpointFinder, LogConfig,
    LogFiles, LogPosition, LogWriter, TransactionId,
};

/// Deterministic command payload for the `index`-th transaction of a fixture.
pub fn command_for(index: usize) -> Command {
    Command::new(format!("op-{index}").into_bytes())
}

/// A transaction log for tests, cleaned up on drop.
pub struct TestLog {
    files: LogFiles,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestLog {
    /// Creates an empty in-memory log.
    pub fn memory() -> Self {
        Self {
            files: LogFiles::in_memory(),
            temp_dir: None,
        }
    }

    /// Creates an empty log in a fresh temporary directory.
    pub fn on_disk() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let files = LogFiles::open(temp_dir.path(), LogConfig::default())
            .expect("Failed to open log directory");
        Self {
            files,
            temp_dir: Some(temp_dir),
        }
    }

    /// Creates an in-memory log holding `count` transactions after `base`.
    pub fn with_transactions(base: TransactionId, count: usize) -> Self {
        let log = Self::memory();
        log.start_after(base);
        log.append_transactions(count);
        log
    }

    /// Returns the log directory, if the log is on disk.
    pub fn dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Returns the underlying log files.
    pub fn files(&self) -> &LogFiles {
        &self.files
    }

    /// Reopens the log directory, as a restarted process would.
    ///
    /// The current handle is dropped first so its lock is released.
    pub fn reopen(self) -> Self {
        let Self { files, temp_dir } = self;
        drop(files);
        let temp_dir = temp_dir.expect("Only on-disk logs can be reopened");
        let files = LogFiles::open(temp_dir.path(), LogConfig::default())
            .expect("Failed to reopen log directory");
        Self {
            files,
            temp_dir: Some(temp_dir),
        }
    }

    /// Starts an empty log so its first transaction is `base + 1`.
    pub fn start_after(&self, base: TransactionId) {
        LogWriter::with_base(&self.files, base).expect("Failed to start log");
    }

    /// Returns a writer continuing the log.
    pub fn writer(&self) -> LogWriter<'_> {
        LogWriter::new(&self.files).expect("Failed to open log writer")
    }

    /// Appends `count` single-command transactions, returning the position
    /// after each one.
    pub fn append_transactions(&self, count: usize) -> Vec<LogPosition> {
        let mut writer = self.writer();
        (0..count)
            .map(|index| {
                writer
                    .append_transaction(&[], &[command_for(index)])
                    .expect("Failed to append transaction")
                    .1
            })
            .collect()
    }

    /// Appends a checkpoint pointing at `target`.
    pub fn checkpoint(&self, target: LogPosition) -> LogPosition {
        self.writer()
            .append_checkpoint(target)
            .expect("Failed to append checkpoint")
    }

    /// Starts a new segment, returning its version's start position.
    pub fn rotate(&self) -> LogPosition {
        let version = self.writer().rotate().expect("Failed to rotate log");
        self.files.start_of_segment(version)
    }

    /// Appends raw bytes to the newest segment, as a torn write would leave
    /// them.
    pub fn tear(&self, bytes: &[u8]) {
        let version = self
            .files
            .highest_version()
            .expect("Cannot tear an empty log");
        self.files
            .append_raw(version, bytes)
            .expect("Failed to append raw bytes");
    }

    /// Returns a checkpoint finder over this log.
    pub fn checkpoints(&self) -> LatestCheckpointFinder<'_> {
        LatestCheckpointFinder::new(&self.files)
    }
}

impl Deref for TestLog {
    type Target = LogFiles;

    fn deref(&self) -> &Self::Target {
        &self.files
    }
}

/// A checkpoint source answering with a fixed result.
#[derive(Debug, Clone)]
pub struct FixedCheckpoint {
    result: Result<Option<LogPosition>, String>,
}

impl FixedCheckpoint {
    /// No checkpoint was ever written.
    pub fn none() -> Self {
        Self { result: Ok(None) }
    }

    /// The latest checkpoint points at `position`.
    pub fn at(position: LogPosition) -> Self {
        Self {
            result: Ok(Some(position)),
        }
    }

    /// The checkpoint record cannot be read.
    pub fn unreadable(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
        }
    }
}

impl CheckpointSource for FixedCheckpoint {
    fn latest_checkpoint(&self) -> CoreResult<Option<LogPosition>> {
        self.result.clone().map_err(CoreError::invalid_format)
    }
}
