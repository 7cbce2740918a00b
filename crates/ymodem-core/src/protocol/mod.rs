//! Protocol module - YMODEM wire definitions.

pub mod block;
pub mod constants;

pub use block::{BlockKind, crc_from_trailer, sequence_accepted};
pub use constants::*;
