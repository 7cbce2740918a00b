//! State machine types for the YMODEM receiver.

use std::fmt;

use crate::crc::Crc16;
use crate::metadata::FileTracker;
use crate::protocol::{BUF_SIZE, BlockKind};

/// Receiver state. A fatal error leaves the machine through the
/// cancellation sequence instead of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Reset per-file state and ask the sender to start.
    StartFile,
    /// Waiting for a header byte.
    AwaitHeader,
    /// Header seen, reading sequence number and complement.
    AwaitSequence(BlockKind),
    /// Sequence accepted, reading the payload chunk by chunk.
    AwaitPayload(BlockKind),
    /// Payload read, checking the trailer against the running CRC.
    AwaitCrc(Crc16),
    /// CRC matched, block is acknowledged and committed.
    Committed,
    /// EOT received for the current file.
    EndOfFile,
    /// Block attempt failed: drain, NAK, count.
    Retrying(Rejection),
    /// Batch terminator acknowledged.
    Completed,
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverState::StartFile => write!(f, "START_FILE"),
            ReceiverState::AwaitHeader => write!(f, "AWAIT_HEADER"),
            ReceiverState::AwaitSequence(k) => write!(f, "AWAIT_SEQ({})", k),
            ReceiverState::AwaitPayload(k) => write!(f, "AWAIT_PAYLOAD({})", k),
            ReceiverState::AwaitCrc(_) => write!(f, "AWAIT_CRC"),
            ReceiverState::Committed => write!(f, "COMMITTED"),
            ReceiverState::EndOfFile => write!(f, "END_OF_FILE"),
            ReceiverState::Retrying(_) => write!(f, "RETRYING"),
            ReceiverState::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Why a block attempt was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidHeader(u8),
    SequenceTimeout,
    BadSequence { seq: u8, complement: u8 },
    ShortPayload { chunk: usize },
    CrcTimeout,
    CrcMismatch { computed: u16, received: u16 },
}

impl Rejection {
    /// Integrity failures, as opposed to framing failures.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Rejection::CrcTimeout | Rejection::CrcMismatch { .. })
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InvalidHeader(b) => write!(f, "invalid header {:02X}", b),
            Rejection::SequenceTimeout => write!(f, "timeout reading sequence number"),
            Rejection::BadSequence { seq, complement } => {
                write!(f, "invalid sequence number {:02X}/{:02X}", seq, complement)
            }
            Rejection::ShortPayload { chunk } => write!(f, "payload chunk {} timed out", chunk),
            Rejection::CrcTimeout => write!(f, "timeout reading crc16"),
            Rejection::CrcMismatch { computed, received } => {
                write!(f, "crc16: {:04x} != {:04x}", received, computed)
            }
        }
    }
}

/// Which retry ceiling was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// No header byte arrived.
    Header,
    /// Header arrived but the block was unusable.
    Block,
}

impl fmt::Display for RetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryKind::Header => write!(f, "header"),
            RetryKind::Block => write!(f, "block"),
        }
    }
}

/// Counter with a fixed ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCounter {
    count: u32,
    limit: u32,
}

impl RetryCounter {
    pub fn new(limit: u32) -> Self {
        Self { count: 0, limit }
    }

    /// Count one failure. Returns true once the ceiling is reached.
    pub fn bump(&mut self) -> bool {
        self.count += 1;
        self.count >= self.limit
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// The most recently committed block, kept so a header timeout can undo it
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastBlock {
    /// The sequence-0 metadata block.
    Metadata,
    /// A data block that persisted this many bytes.
    Data(u32),
}

/// Mutable state of one receive session.
#[derive(Debug)]
pub struct SessionContext {
    /// Expected sequence number of the next data block.
    pub seq: u8,
    /// Still waiting for the metadata block of the current file.
    pub first_block: bool,
    pub tracker: FileTracker,
    pub last_block: Option<LastBlock>,
    pub header_retries: RetryCounter,
    pub block_retries: RetryCounter,
    pub files_received: usize,
    pub bytes_received: u64,
    /// Scratch buffer, reused for every payload chunk.
    pub buf: [u8; BUF_SIZE],
}

impl SessionContext {
    pub fn new(header_retry_limit: u32, block_retry_limit: u32) -> Self {
        Self {
            seq: 0,
            first_block: true,
            tracker: FileTracker::default(),
            last_block: None,
            header_retries: RetryCounter::new(header_retry_limit),
            block_retries: RetryCounter::new(block_retry_limit),
            files_received: 0,
            bytes_received: 0,
            buf: [0; BUF_SIZE],
        }
    }

    /// Reset per-file state ahead of the next metadata block.
    pub fn begin_file(&mut self) {
        self.seq = 0;
        self.first_block = true;
        self.tracker = FileTracker::default();
        self.last_block = None;
        self.reset_retries();
    }

    pub fn reset_retries(&mut self) {
        self.header_retries.reset();
        self.block_retries.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_counter_ceiling() {
        let mut c = RetryCounter::new(3);
        assert!(!c.bump());
        assert!(!c.bump());
        assert!(c.bump());
        assert_eq!(c.count(), 3);
        c.reset();
        assert_eq!(c.count(), 0);
        assert!(!c.bump());
    }

    #[test]
    fn test_rejection_classes() {
        assert!(Rejection::CrcTimeout.is_integrity());
        assert!(
            Rejection::CrcMismatch {
                computed: 1,
                received: 2
            }
            .is_integrity()
        );
        assert!(!Rejection::InvalidHeader(0x55).is_integrity());
        assert_eq!(
            Rejection::InvalidHeader(0x55).to_string(),
            "invalid header 55"
        );
    }

    #[test]
    fn test_begin_file_resets_per_file_state() {
        let mut ctx = SessionContext::new(25, 5);
        ctx.seq = 9;
        ctx.first_block = false;
        ctx.last_block = Some(LastBlock::Data(128));
        ctx.block_retries.bump();
        ctx.files_received = 2;

        ctx.begin_file();
        assert_eq!(ctx.seq, 0);
        assert!(ctx.first_block);
        assert_eq!(ctx.last_block, None);
        assert_eq!(ctx.block_retries.count(), 0);
        assert_eq!(ctx.files_received, 2);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(
            ReceiverState::AwaitSequence(BlockKind::Long).to_string(),
            "AWAIT_SEQ(STX)"
        );
        assert_eq!(ReceiverState::Completed.to_string(), "COMPLETED");
    }
}
