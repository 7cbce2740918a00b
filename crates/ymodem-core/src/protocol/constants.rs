//! Wire constants of the YMODEM protocol.
//!
//! These values are fixed by the protocol and must match the sender
//! byte for byte.

// ============================================================================
// Control bytes
// ============================================================================

/// Request / start byte ('C'). Asks the sender for CRC16 mode.
pub const REQ: u8 = 0x43;

/// Start of a 128-byte block.
pub const SOH: u8 = 0x01;

/// Start of a 1024-byte block.
pub const STX: u8 = 0x02;

/// End of transmission (end of the current file).
pub const EOT: u8 = 0x04;

/// Acknowledge.
pub const ACK: u8 = 0x06;

/// Negative acknowledge.
pub const NAK: u8 = 0x15;

/// Cancel.
pub const CAN: u8 = 0x18;

/// CP/M end-of-file padding used by senders to fill the last block.
pub const CPMEOF: u8 = 0x1A;

// ============================================================================
// Sizes
// ============================================================================

/// Scratch buffer size. Every payload read happens in chunks of this size.
pub const BUF_SIZE: usize = 128;

/// Payload length of a SOH block.
pub const SOH_SIZE: usize = 128;

/// Payload length of a STX block.
pub const STX_SIZE: usize = 1024;

/// Capacity of the file name field including the forced terminator.
pub const FILE_NAME_CAPACITY: usize = 12;
