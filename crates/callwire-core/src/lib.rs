//! callwire-core: Shared protocol library for the callwire signaling relay.
//!
//! Provides the JSON wire message types exchanged over the WebSocket
//! transport and the common error type.

pub mod error;
pub mod messages;

// Re-export commonly used items at crate root.
pub use error::{CallwireError, CallwireResult};
pub use messages::{ClientEvent, RegisterPayload, Role, ServerEvent, SignalPayload};
