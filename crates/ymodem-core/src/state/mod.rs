//! State machine module.

pub mod handlers;
pub mod machine;

pub use handlers::HandlerContext;
pub use machine::{
    LastBlock, ReceiverState, Rejection, RetryCounter, RetryKind, SessionContext,
};
