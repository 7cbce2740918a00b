//! CRC16 (XMODEM / CCITT variant) used to validate block payloads.
//!
//! The running value starts at zero for every block and is fed one
//! 128-byte chunk at a time as the payload arrives.
//!
//! ```rust
//! use ymodem_core::crc::{Crc16, crc16};
//!
//! let mut crc = Crc16::new();
//! crc.update(b"1234");
//! crc.update(b"56789");
//! assert_eq!(crc.value(), crc16(0, b"123456789"));
//! ```

/// Fold `bytes` into a running CRC.
///
/// Byte-swap, xor in the byte, then the CCITT nibble mix. Bit-identical
/// to the table-driven XMODEM CRC senders compute.
pub fn crc16(mut crc: u16, bytes: &[u8]) -> u16 {
    for &b in bytes {
        crc = crc.rotate_left(8);
        crc ^= b as u16;
        crc ^= (crc & 0xff) >> 4;
        crc ^= crc << 12;
        crc ^= (crc & 0xff) << 5;
    }
    crc
}

/// Incremental CRC16 calculator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc16 {
    state: u16,
}

impl Crc16 {
    #[inline]
    pub const fn new() -> Self {
        Self { state: 0 }
    }

    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        self.state = crc16(self.state, bytes);
    }

    #[inline]
    pub fn value(&self) -> u16 {
        self.state
    }

    /// Compare against a received trailer value.
    #[inline]
    pub fn matches(&self, received: u16) -> bool {
        self.state == received
    }
}
