//! ymodem-core: YMODEM receiver for byte-oriented transports.
//!
//! The receiver owns no I/O of its own. It drives whatever implements
//! [`ByteTransport`] (send one byte, receive one byte with a timeout) and
//! hands file data to a [`FileSink`]. That keeps it usable on a serial
//! line, a pipe, or a scripted mock.
//!
//! # Architecture
//!
//! - **Protocol**: control bytes, block sizes, header classification
//! - **CRC**: CRC16 (XMODEM / CCITT) of block payloads
//! - **Metadata**: file name and size from the first block, write offsets
//! - **State**: retry/cancel state machine and its handlers
//! - **Transport / Storage**: the injected primitives, plus mocks
//! - **Events**: observer side channel for logging
//! - **Session**: drives one batch transfer to completion
//!
//! # Example
//!
//! ```no_run
//! use ymodem_core::{MemorySink, MockTransport, ReceiverConfig, YmodemReceiver};
//!
//! let mut transport = MockTransport::new();
//! let mut sink = MemorySink::new();
//! let receiver = YmodemReceiver::new(ReceiverConfig::default());
//! let summary = receiver.receive(&mut transport, &mut sink).expect("transfer failed");
//! println!("{} files", summary.files_received);
//! ```

pub mod config;
pub mod crc;
pub mod events;
pub mod metadata;
pub mod protocol;
pub mod session;
pub mod state;
pub mod storage;
pub mod transport;

// Re-exports for convenience
pub use config::{ConfigError, ReceiverConfig, Timeouts};
pub use events::{LogLevel, NullObserver, ReceiveEvent, ReceiveObserver, TracingObserver};
pub use metadata::{FileInfo, FileName, FileTracker};
pub use protocol::BlockKind;
pub use session::{ReceiveError, ReceiveSummary, YmodemReceiver};
pub use state::{ReceiverState, RetryKind};
pub use storage::{FileSink, MemorySink, SaveCall, StorageError};
pub use transport::{ByteTransport, MockTransport, TransportError};
