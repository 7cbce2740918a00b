//! Transport layer module.

pub mod mock;
pub mod traits;

pub use mock::{Incoming, MockTransport, frame_block};
pub use traits::{ByteTransport, TransportError};
