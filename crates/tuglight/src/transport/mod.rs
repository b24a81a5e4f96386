//! Transport seam between the session and the wire
//!
//! The session only ever talks to a [`Transport`], so tests can drive it with
//! an in-memory pair instead of a socket.
//!
//! The `#[async_trait]` macro is required because the session stores the live
//! connection as `Box<dyn Transport>`, which native async fn in traits cannot
//! provide.

use async_trait::async_trait;

use tuglight_core::{Endpoint, Frame};

mod ws;

#[cfg(test)]
pub(crate) mod mock;

pub use ws::{WsConnector, WsTransport};

/// Errors raised by a transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    /// The WebSocket failed after it was established
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A write did not complete in time; the peer is likely gone
    #[error("write timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A write was attempted after close
    #[error("transport closed")]
    Closed,
}

/// Establishes a transport to one endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, TransportError>;
}

/// An established, ordered, message-oriented connection
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Next inbound frame, or `None` once the peer has closed
    ///
    /// Must be cancel-safe: the session polls it inside `tokio::select!`.
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;

    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_object_safe() {
        fn _assert_object_safe(_: Box<dyn Transport>) {}
    }

    #[test]
    fn test_connector_is_object_safe() {
        fn _assert_object_safe(_: Box<dyn Connector>) {}
    }

    #[test]
    fn test_connect_error_display() {
        let err = TransportError::Connect {
            endpoint: "ws://127.0.0.1:81".to_string(),
            reason: "refused".to_string(),
        };
        assert_eq!(err.to_string(), "connect to ws://127.0.0.1:81 failed: refused");
    }
}
