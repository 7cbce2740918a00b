//! YMODEM receive session - drives the state machine to completion.

use std::sync::Arc;

use thiserror::Error;
use tracing::{instrument, trace};

use crate::config::ReceiverConfig;
use crate::events::{LogLevel, ReceiveEvent, ReceiveObserver, TracingObserver};
use crate::protocol::CAN;
use crate::state::handlers::{HandlerContext, handle_state};
use crate::state::machine::{ReceiverState, RetryKind, SessionContext};
use crate::storage::{FileSink, StorageError};
use crate::transport::{ByteTransport, TransportError};

#[derive(Error, Debug)]
pub enum ReceiveError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Too many {kind} retries ({attempts})")]
    RetriesExhausted { kind: RetryKind, attempts: u32 },
}

/// Outcome of a successful session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiveSummary {
    /// Files closed with EOT.
    pub files_received: usize,
    /// Bytes committed across all files.
    pub bytes_received: u64,
}

/// YMODEM receiver. Holds configuration and the observer; every call to
/// [`receive`](Self::receive) is an independent session.
pub struct YmodemReceiver<O: ReceiveObserver> {
    config: ReceiverConfig,
    observer: Arc<O>,
}

impl YmodemReceiver<TracingObserver> {
    /// Create a receiver that logs through tracing.
    pub fn new(config: ReceiverConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }
}

impl<O: ReceiveObserver> YmodemReceiver<O> {
    /// Create a receiver with a custom observer.
    pub fn with_observer(config: ReceiverConfig, observer: Arc<O>) -> Self {
        Self { config, observer }
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Receive a batch of files until the sender's empty-name block.
    ///
    /// Blocks the calling thread for the whole transfer. On failure the
    /// peer has already been sent the cancel sequence.
    #[instrument(skip_all)]
    pub fn receive<T: ByteTransport, S: FileSink>(
        &self,
        transport: &mut T,
        sink: &mut S,
    ) -> Result<ReceiveSummary, ReceiveError> {
        let mut session = SessionContext::new(
            self.config.header_retry_limit,
            self.config.block_retry_limit,
        );
        let mut ctx = HandlerContext {
            transport,
            sink,
            observer: self.observer.as_ref(),
            config: &self.config,
            session: &mut session,
        };

        let mut state = ReceiverState::StartFile;
        let result = loop {
            trace!(state = %state, "step");
            match handle_state(state, &mut ctx) {
                Ok(ReceiverState::Completed) => break Ok(()),
                Ok(next) => state = next,
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = result {
            self.cancel(&mut *ctx.transport, &e);
            return Err(e);
        }

        Ok(ReceiveSummary {
            files_received: session.files_received,
            bytes_received: session.bytes_received,
        })
    }

    /// Send cancel twice and give the peer one read to answer.
    fn cancel<T: ByteTransport>(&self, transport: &mut T, reason: &ReceiveError) {
        self.observer.on_event(&ReceiveEvent::Log {
            level: LogLevel::Error,
            message: format!("cancel transfer: {}", reason),
        });
        self.observer.on_event(&ReceiveEvent::Cancelled {
            reason: reason.to_string(),
        });

        let _ = transport.transmit(CAN);
        let _ = transport.transmit(CAN);
        let _ = transport.receive(self.config.timeouts.cancel_ms);
    }
}
