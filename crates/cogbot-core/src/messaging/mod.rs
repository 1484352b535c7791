//! Cross-messenger abstractions consumed by the core.

pub mod bus;
pub mod port;
pub mod types;
