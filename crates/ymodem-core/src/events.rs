//! Event system for the logging side channel.
//!
//! The receiver never prints. Everything it has to say goes through a
//! `ReceiveObserver`; none of it influences the protocol.

use std::fmt;
use std::fmt::Write as _;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Verbose,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Verbose => write!(f, "VERBOSE"),
        }
    }
}

/// Events emitted by a receive session.
#[derive(Debug, Clone)]
pub enum ReceiveEvent {
    /// Free-form diagnostic.
    Log { level: LogLevel, message: String },
    /// Metadata block accepted, a new file begins.
    FileStarted { name: String, size: u32 },
    /// A data block was committed.
    Progress {
        name: String,
        committed: u32,
        total: u32,
    },
    /// EOT acknowledged for the current file.
    FileCompleted { name: String, bytes: u32 },
    /// A block attempt failed and will be retried.
    BlockRejected { seq: u8, reason: String },
    /// Session aborted, cancel sent to the peer.
    Cancelled { reason: String },
    /// Batch terminator received.
    Complete { files: usize },
}

/// Observer trait for receiving session events.
pub trait ReceiveObserver {
    /// Called when an event occurs.
    fn on_event(&self, event: &ReceiveEvent);

    /// Whether verbose payload dumps should be produced at all.
    fn verbose_enabled(&self) -> bool {
        false
    }
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl ReceiveObserver for NullObserver {
    fn on_event(&self, _event: &ReceiveEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl ReceiveObserver for TracingObserver {
    fn on_event(&self, event: &ReceiveEvent) {
        match event {
            ReceiveEvent::Log { level, message } => match level {
                LogLevel::Verbose => tracing::trace!("{}", message),
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            ReceiveEvent::FileStarted { name, size } => {
                tracing::info!(name = %name, size = size, "Receiving file");
            }
            ReceiveEvent::Progress {
                name,
                committed,
                total,
            } => {
                let pct = if *total > 0 {
                    (*committed as u64 * 100) / *total as u64
                } else {
                    0
                };
                tracing::debug!(name = %name, committed = committed, progress = %format!("{}%", pct), "Progress");
            }
            ReceiveEvent::FileCompleted { name, bytes } => {
                tracing::info!(name = %name, bytes = bytes, "File received");
            }
            ReceiveEvent::BlockRejected { seq, reason } => {
                tracing::debug!(seq = %format!("{:02X}", seq), reason = %reason, "Block rejected");
            }
            ReceiveEvent::Cancelled { reason } => {
                tracing::error!(reason = %reason, "Transfer cancelled");
            }
            ReceiveEvent::Complete { files } => {
                tracing::info!(files = files, "Batch complete");
            }
        }
    }

    fn verbose_enabled(&self) -> bool {
        tracing::enabled!(tracing::Level::TRACE)
    }
}

/// Format `buf` as a hex dump, 16 bytes per row with a `%04X:` prefix.
pub fn hex_dump(buf: &[u8]) -> String {
    let mut out = String::with_capacity(buf.len() * 3 + buf.len() / 16 * 7);
    for (row, chunk) in buf.chunks(16).enumerate() {
        if row > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:04X}:", row * 16);
        for b in chunk {
            let _ = write!(out, " {:02X}", b);
        }
    }
    out
}
