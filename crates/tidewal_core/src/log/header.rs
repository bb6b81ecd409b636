//! Log segment header.
//!
//! ```text
//! | magic (4) | format (2) | reserved (2) | log version (8) | last tx (8) | last checksum (8) |
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{LogVersion, TransactionId};

/// Magic bytes opening every log segment.
pub const SEGMENT_MAGIC: [u8; 4] = *b"TWLS";

/// Current segment format version.
pub const SEGMENT_FORMAT_VERSION: u16 = 1;

/// Size of the segment header. The first entry of a segment starts here.
pub const SEGMENT_HEADER_SIZE: u64 = 32;

/// Header written at the start of every log segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Version of the segment.
    pub log_version: LogVersion,
    /// Last transaction committed before this segment was created.
    pub last_committed_tx: TransactionId,
    /// Start-entry checksum of that transaction, or zero.
    pub last_checksum: u64,
}

impl SegmentHeader {
    /// Creates a header.
    #[must_use]
    pub const fn new(
        log_version: LogVersion,
        last_committed_tx: TransactionId,
        last_checksum: u64,
    ) -> Self {
        Self {
            log_version,
            last_committed_tx,
            last_checksum,
        }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; SEGMENT_HEADER_SIZE as usize] {
        let mut buf = [0u8; SEGMENT_HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(&SEGMENT_MAGIC);
        buf[4..6].copy_from_slice(&SEGMENT_FORMAT_VERSION.to_le_bytes());
        buf[8..16].copy_from_slice(&self.log_version.as_u64().to_le_bytes());
        buf[16..24].copy_from_slice(&self.last_committed_tx.as_u64().to_le_bytes());
        buf[24..32].copy_from_slice(&self.last_checksum.to_le_bytes());
        buf
    }

    /// Decodes a header.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] on short input, wrong magic or an
    /// unsupported format version.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < SEGMENT_HEADER_SIZE as usize {
            return Err(CoreError::invalid_format(format!(
                "segment header too short: {} bytes",
                data.len()
            )));
        }
        if data[0..4] != SEGMENT_MAGIC {
            return Err(CoreError::invalid_format("invalid segment magic"));
        }
        let format = u16::from_le_bytes([data[4], data[5]]);
        if format > SEGMENT_FORMAT_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported segment format version {format}"
            )));
        }

        Ok(Self {
            log_version: LogVersion::new(read_u64(&data[8..16])),
            last_committed_tx: TransactionId::new(read_u64(&data[16..24])),
            last_checksum: read_u64(&data[24..32]),
        })
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
