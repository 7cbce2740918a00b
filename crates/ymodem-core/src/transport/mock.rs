//! Scripted transport for testing.

use std::collections::VecDeque;

use super::traits::{ByteTransport, TransportError};
use crate::crc::crc16;
use crate::protocol::{BlockKind, CPMEOF, EOT, SOH_SIZE};

/// One scripted step on the receive side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incoming {
    Byte(u8),
    /// The next read times out.
    Timeout,
    /// The next read fails fatally.
    Fail,
}

/// Mock transport replaying a fixed script of incoming bytes.
///
/// Reads past the end of the script time out. Every transmitted byte is
/// recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    incoming: VecDeque<Incoming>,
    written: Vec<u8>,
    reads: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.incoming.extend(bytes.iter().map(|&b| Incoming::Byte(b)));
        self
    }

    pub fn queue_timeout(&mut self) -> &mut Self {
        self.incoming.push_back(Incoming::Timeout);
        self
    }

    pub fn queue_error(&mut self) -> &mut Self {
        self.incoming.push_back(Incoming::Fail);
        self
    }

    /// Queue the sequence-0 metadata block of a file.
    pub fn queue_file_header(&mut self, name: &str, size: usize) -> &mut Self {
        let mut payload = Vec::with_capacity(SOH_SIZE);
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        payload.extend_from_slice(size.to_string().as_bytes());
        payload.push(0);
        let block = frame_block(BlockKind::Short, 0, &payload, 0);
        self.queue_bytes(&block)
    }

    /// Queue the empty-name block that ends the batch.
    pub fn queue_batch_end(&mut self) -> &mut Self {
        let block = frame_block(BlockKind::Short, 0, &[], 0);
        self.queue_bytes(&block)
    }

    /// Queue one data block, padded with CPMEOF.
    pub fn queue_data_block(&mut self, kind: BlockKind, seq: u8, data: &[u8]) -> &mut Self {
        let block = frame_block(kind, seq, data, CPMEOF);
        self.queue_bytes(&block)
    }

    /// Queue the double EOT that closes a file.
    pub fn queue_eot(&mut self) -> &mut Self {
        self.queue_bytes(&[EOT, EOT])
    }

    /// Queue a complete lossless file transfer using `kind` blocks.
    pub fn queue_file(&mut self, name: &str, data: &[u8], kind: BlockKind) -> &mut Self {
        self.queue_file_header(name, data.len());
        for (i, chunk) in data.chunks(kind.payload_len()).enumerate() {
            self.queue_data_block(kind, (i + 1) as u8, chunk);
        }
        self.queue_eot()
    }

    /// Bytes transmitted by the receiver so far.
    pub fn writes(&self) -> &[u8] {
        &self.written
    }

    /// Scripted steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.incoming.len()
    }

    /// Number of receive calls made.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl ByteTransport for MockTransport {
    fn transmit(&mut self, byte: u8) -> Result<(), TransportError> {
        self.written.push(byte);
        Ok(())
    }

    fn receive(&mut self, _timeout_ms: u32) -> Result<Option<u8>, TransportError> {
        self.reads += 1;
        match self.incoming.pop_front() {
            Some(Incoming::Byte(b)) => Ok(Some(b)),
            Some(Incoming::Timeout) | None => Ok(None),
            Some(Incoming::Fail) => Err(TransportError::ReadFailed("Mock failure".into())),
        }
    }
}

/// Frame a block the way a sender would: header, sequence, complement,
/// payload padded to the block size, big-endian CRC.
pub fn frame_block(kind: BlockKind, seq: u8, payload: &[u8], pad: u8) -> Vec<u8> {
    let len = kind.payload_len();
    let mut body = vec![pad; len];
    let n = payload.len().min(len);
    body[..n].copy_from_slice(&payload[..n]);

    let crc = crc16(0, &body);
    let mut block = Vec::with_capacity(len + 5);
    block.push(kind.header_byte());
    block.push(seq);
    block.push(!seq);
    block.extend_from_slice(&body);
    block.extend_from_slice(&crc.to_be_bytes());
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_script_order() {
        let mut mock = MockTransport::new();
        mock.queue_bytes(&[1, 2]).queue_timeout().queue_bytes(&[3]);

        assert_eq!(mock.receive(10).unwrap(), Some(1));
        assert_eq!(mock.receive(10).unwrap(), Some(2));
        assert_eq!(mock.receive(10).unwrap(), None);
        assert_eq!(mock.receive(10).unwrap(), Some(3));
        // exhausted script times out
        assert_eq!(mock.receive(10).unwrap(), None);
        assert_eq!(mock.reads(), 5);
    }

    #[test]
    fn test_mock_error() {
        let mut mock = MockTransport::new();
        mock.queue_error();
        assert!(mock.receive(10).is_err());
    }

    #[test]
    fn test_mock_write_capture() {
        let mut mock = MockTransport::new();
        mock.transmit(0x43).unwrap();
        mock.transmit(0x06).unwrap();
        assert_eq!(mock.writes(), &[0x43, 0x06]);
    }

    #[test]
    fn test_receive_exact_stops_at_timeout() {
        let mut mock = MockTransport::new();
        mock.queue_bytes(&[9, 8]).queue_timeout().queue_bytes(&[7]);

        let mut buf = [0u8; 4];
        assert_eq!(mock.receive_exact(&mut buf, 10).unwrap(), 2);
        assert_eq!(&buf[..2], &[9, 8]);
        assert_eq!(mock.remaining(), 1);
    }

    #[test]
    fn test_discard_drains_until_quiet() {
        let mut mock = MockTransport::new();
        mock.queue_bytes(&[0; 130]).queue_timeout().queue_bytes(&[1]);
        assert_eq!(mock.discard(300).unwrap(), 130);
        assert_eq!(mock.receive(10).unwrap(), Some(1));
    }

    #[test]
    fn test_frame_block_layout() {
        let block = frame_block(BlockKind::Long, 3, b"abc", CPMEOF);
        assert_eq!(block.len(), 3 + 1024 + 2);
        assert_eq!(&block[..3], &[0x02, 3, 0xFC]);
        assert_eq!(&block[3..6], b"abc");
        assert_eq!(block[6], CPMEOF);

        let crc = crc16(0, &block[3..1027]);
        assert_eq!(&block[1027..], &crc.to_be_bytes());
    }
}
