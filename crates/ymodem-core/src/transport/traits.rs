//! Byte transport abstraction.
//!
//! Defines the `ByteTransport` trait the receiver drives, so the same
//! state machine runs over a serial line, a pipe, or a scripted mock.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Transport disconnected")]
    Disconnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Single-byte transport with bounded waits.
///
/// `receive` returns `Ok(None)` when nothing arrived within the timeout.
/// Any `Err` is fatal for the session.
pub trait ByteTransport {
    /// Send one byte. Delivery is not confirmed.
    fn transmit(&mut self, byte: u8) -> Result<(), TransportError>;

    /// Wait up to `timeout_ms` for one byte.
    fn receive(&mut self, timeout_ms: u32) -> Result<Option<u8>, TransportError>;

    /// Fill `buf`, giving each byte `timeout_ms`. Returns how many bytes
    /// arrived before the first timeout.
    fn receive_exact(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        for (i, slot) in buf.iter_mut().enumerate() {
            match self.receive(timeout_ms)? {
                Some(b) => *slot = b,
                None => return Ok(i),
            }
        }
        Ok(buf.len())
    }

    /// Drop everything that keeps arriving until the line stays quiet for
    /// `window_ms`. Returns the number of bytes dropped.
    fn discard(&mut self, window_ms: u32) -> Result<usize, TransportError> {
        let mut dropped = 0;
        while self.receive(window_ms)?.is_some() {
            dropped += 1;
        }
        Ok(dropped)
    }
}
