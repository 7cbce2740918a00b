//! Block header classification and sequence number checks.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use super::constants::*;

/// Kind of a block, as announced by its header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// SOH, 128-byte payload.
    Short,
    /// STX, 1024-byte payload.
    Long,
    /// EOT marker, no payload.
    EndOfTransmission,
    /// Anything else. A framing error, not a timeout.
    Unknown(u8),
}

impl BlockKind {
    /// Classify a header byte.
    pub fn from_header_byte(byte: u8) -> Self {
        match byte {
            SOH => BlockKind::Short,
            STX => BlockKind::Long,
            EOT => BlockKind::EndOfTransmission,
            other => BlockKind::Unknown(other),
        }
    }

    /// Header byte that introduces this kind on the wire.
    pub fn header_byte(&self) -> u8 {
        match self {
            BlockKind::Short => SOH,
            BlockKind::Long => STX,
            BlockKind::EndOfTransmission => EOT,
            BlockKind::Unknown(b) => *b,
        }
    }

    /// Payload length implied by the header, zero for non-data kinds.
    pub fn payload_len(&self) -> usize {
        match self {
            BlockKind::Short => SOH_SIZE,
            BlockKind::Long => STX_SIZE,
            _ => 0,
        }
    }

    /// Number of `BUF_SIZE` chunks the payload is read in.
    pub fn chunk_count(&self) -> usize {
        self.payload_len() / BUF_SIZE
    }

    pub fn is_data(&self) -> bool {
        matches!(self, BlockKind::Short | BlockKind::Long)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Short => write!(f, "SOH"),
            BlockKind::Long => write!(f, "STX"),
            BlockKind::EndOfTransmission => write!(f, "EOT"),
            BlockKind::Unknown(b) => write!(f, "0x{:02X}", b),
        }
    }
}

/// Sequence number check.
///
/// A block is rejected only when the sequence byte differs from the
/// expected counter *and* the complement byte differs from the negated
/// counter. The negation is signed, so the complement alone can only
/// vouch for block 0, and never when it is the valid complement of the
/// sequence byte actually received. A repeat of the previous block is
/// always rejected.
pub fn sequence_accepted(expected: u8, seq: u8, complement: u8) -> bool {
    if seq == expected {
        return true;
    }
    i16::from(complement) == -i16::from(expected) && complement != !seq
}

/// Decode the big-endian CRC trailer.
pub fn crc_from_trailer(trailer: [u8; 2]) -> u16 {
    BigEndian::read_u16(&trailer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_classification() {
        assert_eq!(BlockKind::from_header_byte(0x01), BlockKind::Short);
        assert_eq!(BlockKind::from_header_byte(0x02), BlockKind::Long);
        assert_eq!(
            BlockKind::from_header_byte(0x04),
            BlockKind::EndOfTransmission
        );
        assert_eq!(BlockKind::from_header_byte(0x15), BlockKind::Unknown(0x15));
        assert_eq!(BlockKind::Unknown(0x7F).header_byte(), 0x7F);
    }

    #[test]
    fn test_payload_sizes() {
        assert_eq!(BlockKind::Short.payload_len(), 128);
        assert_eq!(BlockKind::Long.payload_len(), 1024);
        assert_eq!(BlockKind::Short.chunk_count(), 1);
        assert_eq!(BlockKind::Long.chunk_count(), 8);
        assert_eq!(BlockKind::EndOfTransmission.chunk_count(), 0);
        assert!(!BlockKind::Unknown(0).is_data());
    }

    #[test]
    fn test_sequence_exact_match() {
        assert!(sequence_accepted(7, 7, !7));
        assert!(sequence_accepted(0, 0, 0xFF));
        assert!(sequence_accepted(255, 255, 0));
    }

    #[test]
    fn test_sequence_complement_alone_only_vouches_for_zero() {
        // seq byte garbled on the metadata block
        assert!(sequence_accepted(0, 0x99, 0));
        assert!(!sequence_accepted(3, 0x99, 3u8.wrapping_neg()));
        assert!(!sequence_accepted(1, 0x99, 0xFF));
    }

    #[test]
    fn test_sequence_rejects_repeat_of_previous_block() {
        for expected in [1u8, 2, 100, 255] {
            let prev = expected.wrapping_sub(1);
            assert!(!sequence_accepted(expected, prev, !prev), "expected {}", expected);
        }
        // wrap from 255 to 0: block 255 repeated while 0 is expected
        assert!(!sequence_accepted(0, 255, !255u8));
    }

    #[test]
    fn test_sequence_rejected_when_both_fail() {
        assert!(!sequence_accepted(1, 5, !5));
        assert!(!sequence_accepted(2, 1, !1));
    }

    #[test]
    fn test_crc_trailer_is_big_endian() {
        assert_eq!(crc_from_trailer([0x31, 0xC3]), 0x31C3);
        assert_eq!(crc_from_trailer([0x00, 0x01]), 1);
    }
}
