//! tuglight: WebSocket session client for the tuglight LED controller
//!
//! Supervises exactly one device connection per [`Session`]: it encodes
//! commands with the configured wire variant, decodes every inbound frame
//! into a [`StatusMessage`](tuglight_core::StatusMessage) event, and drops the
//! connection when the heartbeat monitor declares liveness lost.
//!
//! ## Modules
//!
//! - [`session`] - Session lifecycle, events, and the control handle
//! - [`heartbeat`] - Missed-heartbeat counting and liveness
//! - [`transport`] - Transport traits and the WebSocket transport

pub mod heartbeat;
pub mod session;
pub mod transport;

#[cfg(test)]
mod integration_tests;

pub use heartbeat::{HeartbeatMonitor, LIVENESS_LOST_REASON, Liveness};
pub use session::{
    DISCONNECT_CLOSED, DISCONNECT_ERROR, DISCONNECT_PEER_CLOSED, Session, SessionConfig,
    SessionError, SessionEvent, SessionHandle, SessionState, SessionStatus, StatusCallback,
};
pub use transport::{Connector, Transport, TransportError, WsConnector};

pub use tuglight_core;
