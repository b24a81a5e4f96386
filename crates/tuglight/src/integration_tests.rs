//! Integration tests for tuglight
//!
//! These tests run a session over a real WebSocket against a small device
//! simulator bound to an ephemeral loopback port.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use tuglight_core::{Codec, Command, Endpoint, Frame, Rgb, Scheme, StatusMessage, WireVariant};

use crate::heartbeat::LIVENESS_LOST_REASON;
use crate::session::{
    DISCONNECT_CLOSED, DISCONNECT_ERROR, DISCONNECT_PEER_CLOSED, Session, SessionConfig,
    SessionEvent, SessionState,
};
use crate::transport::WsConnector;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How the simulated device behaves after the handshake
#[derive(Clone, Copy)]
enum Device {
    /// Answers queries and acknowledges heartbeats
    Responsive,
    /// Reads everything, answers nothing
    Silent,
    /// Closes the socket right after the handshake
    HangUp,
}

/// Bind a device simulator and return its endpoint plus every command it decoded
async fn spawn_device(
    variant: WireVariant,
    behavior: Device,
) -> (Endpoint, mpsc::UnboundedReceiver<Command>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        if let Device::HangUp = behavior {
            let _ = ws.close(None).await;
            return;
        }

        let codec = Codec::new(variant);
        let keep_alive = match variant {
            WireVariant::Binary => "<",
            WireVariant::Textual => "a",
        };

        while let Some(Ok(message)) = ws.next().await {
            let frame = match message {
                Message::Text(text) => Frame::Text(text.as_str().to_owned()),
                Message::Binary(bytes) => Frame::Binary(bytes.to_vec()),
                Message::Close(_) => break,
                _ => continue,
            };
            let Some(command) = codec.decode_command(&frame) else {
                continue;
            };

            let reply = match (&command, behavior) {
                (_, Device::Silent) => None,
                (Command::QueryHeap, _) => Some("h1024"),
                (Command::Ping, _) => Some("p"),
                (Command::Heartbeat, _) => Some(keep_alive),
                _ => None,
            };
            let _ = commands_tx.send(command);
            if let Some(reply) = reply {
                if ws.send(Message::text(reply)).await.is_err() {
                    break;
                }
            }
        }
    });

    (Endpoint::new(Scheme::Ws, "127.0.0.1", port), commands_rx)
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(TEST_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event stream ended early")
}

#[tokio::test]
async fn test_heap_query_over_websocket() {
    let (endpoint, _commands) = spawn_device(WireVariant::Textual, Device::Responsive).await;
    let mut session = Session::new(endpoint, SessionConfig::new(WireVariant::Textual));
    let mut events = session.subscribe();
    let handle = session.open(WsConnector);

    assert_eq!(next_event(&mut events).await, SessionEvent::Connected);
    handle.send(Command::QueryHeap).await.unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusReceived(StatusMessage::HeapSize("1024".to_string()))
    );

    handle.close().await;
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Disconnected(DISCONNECT_CLOSED.to_string())
    );
}

#[tokio::test]
async fn test_binary_color_reaches_device() {
    let (endpoint, mut commands) = spawn_device(WireVariant::Binary, Device::Responsive).await;
    let mut session = Session::new(endpoint, SessionConfig::new(WireVariant::Binary));
    let mut events = session.subscribe();
    let handle = session.open(WsConnector);
    assert_eq!(next_event(&mut events).await, SessionEvent::Connected);

    let color = Rgb::from_hex("FFAA11").unwrap();
    handle.send(Command::SetSingleColor(color)).await.unwrap();
    handle
        .send(Command::SetGradient {
            left: Rgb::new(0, 0, 0),
            right: Rgb::new(255, 255, 255),
        })
        .await
        .unwrap();

    let received = timeout(TEST_TIMEOUT, commands.recv()).await.unwrap();
    assert_eq!(received, Some(Command::SetSingleColor(Rgb::new(255, 170, 17))));
    let received = timeout(TEST_TIMEOUT, commands.recv()).await.unwrap();
    assert_eq!(
        received,
        Some(Command::SetGradient {
            left: Rgb::new(0, 0, 0),
            right: Rgb::new(255, 255, 255),
        })
    );
    handle.close().await;
}

#[tokio::test]
async fn test_answered_heartbeats_keep_session_open() {
    let (endpoint, mut commands) = spawn_device(WireVariant::Binary, Device::Responsive).await;
    let config =
        SessionConfig::new(WireVariant::Binary).with_heartbeat_interval(Duration::from_millis(50));
    let mut session = Session::new(endpoint, config);
    let mut events = session.subscribe();
    let handle = session.open(WsConnector);
    assert_eq!(next_event(&mut events).await, SessionEvent::Connected);

    // Well past three intervals
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(handle.state(), SessionState::Open);

    let mut heartbeats = 0;
    while let Ok(command) = commands.try_recv() {
        if command == Command::Heartbeat {
            heartbeats += 1;
        }
    }
    assert!(heartbeats >= 3, "expected several heartbeats, got {heartbeats}");

    let mut acks = 0;
    while let Ok(event) = events.try_recv() {
        assert_eq!(event, SessionEvent::StatusReceived(StatusMessage::KeepAliveAck));
        acks += 1;
    }
    assert!(acks >= 3);

    handle.close().await;
    assert_eq!(handle.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_silent_device_loses_liveness() {
    let (endpoint, _commands) = spawn_device(WireVariant::Textual, Device::Silent).await;
    let config =
        SessionConfig::new(WireVariant::Textual).with_heartbeat_interval(Duration::from_millis(50));
    let mut session = Session::new(endpoint, config);
    let mut events = session.subscribe();
    let handle = session.open(WsConnector);

    assert_eq!(next_event(&mut events).await, SessionEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Disconnected(LIVENESS_LOST_REASON.to_string())
    );
    handle.closed().await;
}

#[tokio::test]
async fn test_device_hang_up_closes_session() {
    let (endpoint, _commands) = spawn_device(WireVariant::Textual, Device::HangUp).await;
    let mut session = Session::new(endpoint, SessionConfig::new(WireVariant::Textual));
    let mut events = session.subscribe();
    let _handle = session.open(WsConnector);

    assert_eq!(next_event(&mut events).await, SessionEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Disconnected(DISCONNECT_PEER_CLOSED.to_string())
    );
}

#[tokio::test]
async fn test_connect_refused_reports_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let endpoint = Endpoint::new(Scheme::Ws, "127.0.0.1", port);
    let mut session = Session::new(endpoint, SessionConfig::new(WireVariant::Binary));
    let mut events = session.subscribe();
    let handle = session.open(WsConnector);

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Disconnected(DISCONNECT_ERROR.to_string())
    );
    assert_eq!(handle.state(), SessionState::Closed);
}
