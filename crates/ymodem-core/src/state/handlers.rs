//! State handlers - one function per receiver state.

use crate::config::ReceiverConfig;
use crate::crc::Crc16;
use crate::events::{LogLevel, ReceiveEvent, ReceiveObserver, hex_dump};
use crate::metadata::{FileInfo, FileTracker};
use crate::protocol::*;
use crate::session::ReceiveError;
use crate::state::machine::{LastBlock, ReceiverState, Rejection, RetryKind, SessionContext};
use crate::storage::FileSink;
use crate::transport::ByteTransport;

/// Handler context containing all resources of a session.
pub struct HandlerContext<'a, T: ByteTransport, S: FileSink, O: ReceiveObserver> {
    pub transport: &'a mut T,
    pub sink: &'a mut S,
    pub observer: &'a O,
    pub config: &'a ReceiverConfig,
    pub session: &'a mut SessionContext,
}

impl<'a, T: ByteTransport, S: FileSink, O: ReceiveObserver> HandlerContext<'a, T, S, O> {
    fn emit(&self, event: ReceiveEvent) {
        self.observer.on_event(&event);
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(ReceiveEvent::Log {
            level,
            message: message.into(),
        });
    }

    fn send(&mut self, byte: u8) -> Result<(), ReceiveError> {
        self.transport.transmit(byte)?;
        Ok(())
    }

    /// Write the part of the scratch buffer that belongs to the file.
    fn persist_chunk(&mut self) -> Result<(), ReceiveError> {
        let tracker = &mut self.session.tracker;
        let n = tracker.writable(BUF_SIZE);
        if n == 0 {
            return Ok(());
        }
        let offset = tracker.offset();
        tracker.advance(n)?;
        self.sink
            .save(tracker.name(), offset, Some(&self.session.buf[..n]))?;
        Ok(())
    }

    /// Truncate bytes written by a block that did not verify.
    fn discard_in_flight(&mut self) -> Result<(), ReceiveError> {
        let tracker = &mut self.session.tracker;
        if tracker.in_flight() == 0 {
            return Ok(());
        }
        let from = tracker.offset();
        self.sink.save(tracker.name(), tracker.committed(), None)?;
        tracker.rollback();
        let to = self.session.tracker.offset();
        self.log(
            LogLevel::Debug,
            format!("{:02X}: rewind offset {} -> {}", self.session.seq, from, to),
        );
        Ok(())
    }

    /// Undo the last committed block once, expecting the sender to
    /// repeat it.
    fn rewind_last_block(&mut self) {
        let session = &mut *self.session;
        match session.last_block.take() {
            Some(LastBlock::Data(len)) => {
                session.seq = session.seq.wrapping_sub(1);
                session.tracker.rewind(len);
                session.bytes_received -= len as u64;
                let (seq, offset) = (session.seq, session.tracker.offset());
                self.log(
                    LogLevel::Debug,
                    format!("{:02X}: rewind to offset {}", seq, offset),
                );
            }
            Some(LastBlock::Metadata) => {
                session.seq = 0;
                session.first_block = true;
                self.log(LogLevel::Debug, "00: awaiting file header again");
            }
            None => {}
        }
    }
}

/// Run the handler for `state` and return the next state.
///
/// An `Err` is fatal: the caller sends the cancellation sequence.
pub fn handle_state<T: ByteTransport, S: FileSink, O: ReceiveObserver>(
    state: ReceiverState,
    ctx: &mut HandlerContext<'_, T, S, O>,
) -> Result<ReceiverState, ReceiveError> {
    match state {
        ReceiverState::StartFile => handle_start_file(ctx),
        ReceiverState::AwaitHeader => handle_header(ctx),
        ReceiverState::AwaitSequence(kind) => handle_sequence(ctx, kind),
        ReceiverState::AwaitPayload(kind) => handle_payload(ctx, kind),
        ReceiverState::AwaitCrc(crc) => handle_crc(ctx, crc),
        ReceiverState::Committed => handle_committed(ctx),
        ReceiverState::EndOfFile => handle_end_of_file(ctx),
        ReceiverState::Retrying(rejection) => handle_retry(ctx, rejection),
        ReceiverState::Completed => Ok(ReceiverState::Completed),
    }
}

// ============================================================================
// Individual Handlers
// ============================================================================

fn handle_start_file<T: ByteTransport, S: FileSink, O: ReceiveObserver>(
    ctx: &mut HandlerContext<'_, T, S, O>,
) -> Result<ReceiverState, ReceiveError> {
    ctx.session.begin_file();
    ctx.send(REQ)?;
    Ok(ReceiverState::AwaitHeader)
}

fn handle_header<T: ByteTransport, S: FileSink, O: ReceiveObserver>(
    ctx: &mut HandlerContext<'_, T, S, O>,
) -> Result<ReceiverState, ReceiveError> {
    let seq = ctx.session.seq;
    let Some(byte) = ctx.transport.receive(ctx.config.timeouts.header_ms)? else {
        if ctx.session.first_block {
            // sender may not be running yet
            ctx.send(REQ)?;
        } else {
            ctx.rewind_last_block();
            ctx.send(NAK)?;
        }
        if ctx.session.header_retries.bump() {
            return Err(ReceiveError::RetriesExhausted {
                kind: RetryKind::Header,
                attempts: ctx.session.header_retries.count(),
            });
        }
        return Ok(ReceiverState::AwaitHeader);
    };

    let kind = BlockKind::from_header_byte(byte);
    if kind.is_data() {
        return Ok(ReceiverState::AwaitSequence(kind));
    }
    if kind == BlockKind::EndOfTransmission {
        ctx.log(LogLevel::Debug, format!("{:02X}: EOT", seq));
        return Ok(ReceiverState::EndOfFile);
    }
    Ok(ReceiverState::Retrying(Rejection::InvalidHeader(byte)))
}

fn handle_sequence<T: ByteTransport, S: FileSink, O: ReceiveObserver>(
    ctx: &mut HandlerContext<'_, T, S, O>,
    kind: BlockKind,
) -> Result<ReceiverState, ReceiveError> {
    let mut buf = [0u8; 2];
    let n = ctx
        .transport
        .receive_exact(&mut buf, ctx.config.timeouts.sequence_ms)?;
    if n != buf.len() {
        return Ok(ReceiverState::Retrying(Rejection::SequenceTimeout));
    }

    let expected = ctx.session.seq;
    let [seq, complement] = buf;
    ctx.log(
        LogLevel::Debug,
        format!("{:02X}: {} {:02X} {:02X}", expected, kind, seq, complement),
    );
    if !sequence_accepted(expected, seq, complement) {
        return Ok(ReceiverState::Retrying(Rejection::BadSequence {
            seq,
            complement,
        }));
    }
    Ok(ReceiverState::AwaitPayload(kind))
}

fn handle_payload<T: ByteTransport, S: FileSink, O: ReceiveObserver>(
    ctx: &mut HandlerContext<'_, T, S, O>,
    kind: BlockKind,
) -> Result<ReceiverState, ReceiveError> {
    let mut crc = Crc16::new();

    for chunk in 0..kind.chunk_count() {
        let n = ctx
            .transport
            .receive_exact(&mut ctx.session.buf, ctx.config.timeouts.payload_ms)?;
        if n != BUF_SIZE {
            return Ok(ReceiverState::Retrying(Rejection::ShortPayload { chunk }));
        }
        crc.update(&ctx.session.buf);

        if ctx.observer.verbose_enabled() {
            ctx.log(LogLevel::Verbose, hex_dump(&ctx.session.buf));
        }

        if ctx.session.first_block {
            // metadata lives in the first chunk, the rest is padding
            if chunk == 0 {
                let info = FileInfo::parse(&ctx.session.buf);
                ctx.log(
                    LogLevel::Debug,
                    format!("file info: '{}' {} bytes", info.name, info.size),
                );
                ctx.session.tracker = FileTracker::start(info);
            }
        } else {
            ctx.persist_chunk()?;
        }
    }

    Ok(ReceiverState::AwaitCrc(crc))
}

fn handle_crc<T: ByteTransport, S: FileSink, O: ReceiveObserver>(
    ctx: &mut HandlerContext<'_, T, S, O>,
    crc: Crc16,
) -> Result<ReceiverState, ReceiveError> {
    let mut trailer = [0u8; 2];
    let n = ctx
        .transport
        .receive_exact(&mut trailer, ctx.config.timeouts.crc_ms)?;
    if n != trailer.len() {
        return Ok(ReceiverState::Retrying(Rejection::CrcTimeout));
    }

    let received = crc_from_trailer(trailer);
    if !crc.matches(received) {
        return Ok(ReceiverState::Retrying(Rejection::CrcMismatch {
            computed: crc.value(),
            received,
        }));
    }
    ctx.log(
        LogLevel::Debug,
        format!("{:02X}: crc16: {:04x} == {:04x}", ctx.session.seq, received, crc.value()),
    );
    Ok(ReceiverState::Committed)
}

fn handle_committed<T: ByteTransport, S: FileSink, O: ReceiveObserver>(
    ctx: &mut HandlerContext<'_, T, S, O>,
) -> Result<ReceiverState, ReceiveError> {
    ctx.send(ACK)?;
    ctx.session.reset_retries();

    if ctx.session.first_block {
        let info = *ctx.session.tracker.info();
        if info.is_batch_end() {
            let files = ctx.session.files_received;
            ctx.log(
                LogLevel::Info,
                format!("total {} file{} received", files, if files == 1 { "" } else { "s" }),
            );
            ctx.emit(ReceiveEvent::Complete { files });
            return Ok(ReceiverState::Completed);
        }

        ctx.log(
            LogLevel::Info,
            format!("receiving file '{}', {} bytes", info.name, info.size),
        );
        ctx.emit(ReceiveEvent::FileStarted {
            name: info.name.to_string_lossy(),
            size: info.size,
        });
        ctx.sink.save(&info.name, 0, None)?;
        ctx.send(REQ)?;
        ctx.session.first_block = false;
        ctx.session.last_block = Some(LastBlock::Metadata);
    } else {
        let from = ctx.session.tracker.committed();
        let len = ctx.session.tracker.commit();
        ctx.session.bytes_received += len as u64;
        ctx.session.last_block = Some(LastBlock::Data(len));

        let tracker = ctx.session.tracker;
        ctx.log(
            LogLevel::Debug,
            format!(
                "receiving file '{}', offset {} -> {}",
                tracker.name(),
                from,
                tracker.committed()
            ),
        );
        ctx.emit(ReceiveEvent::Progress {
            name: tracker.name().to_string_lossy(),
            committed: tracker.committed(),
            total: tracker.size(),
        });
    }

    ctx.session.seq = ctx.session.seq.wrapping_add(1);
    Ok(ReceiverState::AwaitHeader)
}

fn handle_end_of_file<T: ByteTransport, S: FileSink, O: ReceiveObserver>(
    ctx: &mut HandlerContext<'_, T, S, O>,
) -> Result<ReceiverState, ReceiveError> {
    ctx.send(NAK)?;
    match ctx.transport.receive(ctx.config.timeouts.eot_ms)? {
        Some(EOT) => {}
        Some(b) => ctx.log(
            LogLevel::Warn,
            format!("EOT expected but received {:02X}", b),
        ),
        None => ctx.log(LogLevel::Warn, "EOT expected but timed out"),
    }
    ctx.send(ACK)?;

    ctx.session.files_received += 1;
    let tracker = ctx.session.tracker;
    ctx.emit(ReceiveEvent::FileCompleted {
        name: tracker.name().to_string_lossy(),
        bytes: tracker.committed(),
    });
    Ok(ReceiverState::StartFile)
}

fn handle_retry<T: ByteTransport, S: FileSink, O: ReceiveObserver>(
    ctx: &mut HandlerContext<'_, T, S, O>,
    rejection: Rejection,
) -> Result<ReceiverState, ReceiveError> {
    let seq = ctx.session.seq;
    let level = if rejection.is_integrity() {
        LogLevel::Warn
    } else {
        LogLevel::Debug
    };
    ctx.log(level, format!("{:02X}: {}", seq, rejection));
    ctx.emit(ReceiveEvent::BlockRejected {
        seq,
        reason: rejection.to_string(),
    });

    // A failed metadata block is parsed again on the next attempt, data
    // blocks drop whatever they wrote.
    if !ctx.session.first_block {
        ctx.discard_in_flight()?;
    }

    let dropped = ctx.transport.discard(ctx.config.timeouts.drain_ms)?;
    ctx.log(LogLevel::Debug, format!("{:02X}: discard {} bytes", seq, dropped));
    ctx.send(NAK)?;

    if ctx.session.block_retries.bump() {
        return Err(ReceiveError::RetriesExhausted {
            kind: RetryKind::Block,
            attempts: ctx.session.block_retries.count(),
        });
    }
    Ok(ReceiverState::AwaitHeader)
}
