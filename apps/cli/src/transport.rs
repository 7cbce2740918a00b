//! Concrete byte transports for the receiver.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::debug;
use ymodem_core::{ByteTransport, TransportError};

// ============================================================================
// Serial port
// ============================================================================

/// Serial line via the serialport crate.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    timeout_ms: u32,
}

impl SerialTransport {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(1000))
            .open()?;
        Ok(Self {
            port,
            timeout_ms: 1000,
        })
    }
}

impl ByteTransport for SerialTransport {
    fn transmit(&mut self, byte: u8) -> Result<(), TransportError> {
        self.port
            .write_all(&[byte])
            .and_then(|_| self.port.flush())
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    fn receive(&mut self, timeout_ms: u32) -> Result<Option<u8>, TransportError> {
        let timeout_ms = timeout_ms.max(1);
        if timeout_ms != self.timeout_ms {
            self.port
                .set_timeout(Duration::from_millis(timeout_ms as u64))
                .map_err(|e| TransportError::ReadFailed(e.to_string()))?;
            self.timeout_ms = timeout_ms;
        }

        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => Ok(Some(buf[0])),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Stream (pipes, stdio)
// ============================================================================

/// Any blocking reader/writer pair. A background thread feeds the reader
/// into a channel so reads can time out.
pub struct StreamTransport<W: Write> {
    rx: Receiver<io::Result<Vec<u8>>>,
    pending: VecDeque<u8>,
    writer: W,
}

impl<W: Write> StreamTransport<W> {
    pub fn spawn<R: Read + Send + 'static>(mut reader: R, writer: W) -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let mut buf = [0u8; 256];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!("Input stream closed");
                        break;
                    }
                    Ok(n) => {
                        if tx.send(Ok(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        });

        Self {
            rx,
            pending: VecDeque::new(),
            writer,
        }
    }
}

impl<W: Write> ByteTransport for StreamTransport<W> {
    fn transmit(&mut self, byte: u8) -> Result<(), TransportError> {
        self.writer
            .write_all(&[byte])
            .and_then(|_| self.writer.flush())
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    fn receive(&mut self, timeout_ms: u32) -> Result<Option<u8>, TransportError> {
        if let Some(b) = self.pending.pop_front() {
            return Ok(Some(b));
        }
        match self.rx.recv_timeout(Duration::from_millis(timeout_ms as u64)) {
            Ok(Ok(bytes)) => {
                self.pending.extend(bytes);
                Ok(self.pending.pop_front())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Disconnected),
        }
    }
}
