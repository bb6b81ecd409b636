//! Log and recovery configuration.

/// Default number of transactions applied to the storage engine per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default number of recovered transactions between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// What recovery does with a corrupt or torn log tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPolicy {
    /// Cut the log at the end of the last recovered transaction once
    /// bookkeeping and the engine force have succeeded.
    Truncate,
    /// Leave the log untouched, so the tail is skipped again by the next
    /// recovery. Used for read-only inspection.
    Keep,
}

/// Configuration for opening a log directory.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync a segment after every appended transaction.
    pub sync_on_write: bool,

    /// File name prefix of segment files (`<prefix>.<version>`).
    pub segment_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            segment_prefix: "txlog".to_string(),
        }
    }
}

impl LogConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync after every appended transaction.
    #[must_use]
    pub fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the segment file name prefix.
    #[must_use]
    pub fn segment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.segment_prefix = prefix.into();
        self
    }
}

/// Configuration for a recovery pass.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryConfig {
    /// Number of queued transactions that triggers a batch apply.
    pub batch_size: usize,

    /// Handling of a corrupt log tail.
    pub tail_policy: TailPolicy,

    /// Number of recovered transactions between progress log lines.
    pub progress_interval: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            tail_policy: TailPolicy::Truncate,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl RecoveryConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size. Values below 1 are raised to 1.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = if size == 0 { 1 } else { size };
        self
    }

    /// Sets the tail policy.
    #[must_use]
    pub const fn tail_policy(mut self, policy: TailPolicy) -> Self {
        self.tail_policy = policy;
        self
    }

    /// Sets the progress interval. Zero disables progress lines.
    #[must_use]
    pub const fn progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }
}
