//! Device session: lifecycle owner of the one connection to a controller
//!
//! A [`Session`] is configured and subscribed to, then [`Session::open`] hands
//! it to a single driver task and returns a [`SessionHandle`]. The driver is
//! the only reader and writer of the transport. Inbound frames, heartbeat ticks,
//! and handle requests are multiplexed with `tokio::select!` and each one is
//! handled to completion before the next, so subscribers observe events in
//! exactly the order the transport produced them.
//!
//! Lifecycle: `Connecting -> Open -> Closing -> Closed`. There is no automatic
//! reconnection; open a new session (possibly with a new endpoint) instead.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use tuglight_core::{Codec, Command, Endpoint, StatusMessage, WireVariant};

use crate::heartbeat::{
    HEARTBEAT_INTERVAL, HeartbeatAction, HeartbeatMonitor, LIVENESS_LOST_REASON, Liveness,
    MAX_MISSED_HEARTBEATS,
};
use crate::transport::{Connector, Transport, TransportError};

/// Disconnect reason for transport failures, including a failed connect
pub const DISCONNECT_ERROR: &str = "error";

/// Disconnect reason for an explicit [`SessionHandle::close`]
pub const DISCONNECT_CLOSED: &str = "closed";

/// Disconnect reason when the device closes the socket
pub const DISCONNECT_PEER_CLOSED: &str = "connection closed";

/// Session settings chosen by the integrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Wire convention of the target firmware; never defaulted
    pub wire: WireVariant,
    pub heartbeat_interval: Duration,
    pub max_missed: u32,
    /// Replaces the variant's default heartbeat sentinel
    pub heartbeat_token: Option<String>,
}

impl SessionConfig {
    pub fn new(wire: WireVariant) -> Self {
        SessionConfig {
            wire,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            max_missed: MAX_MISSED_HEARTBEATS,
            heartbeat_token: None,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_max_missed(mut self, max_missed: u32) -> Self {
        self.max_missed = max_missed;
        self
    }

    pub fn with_heartbeat_token(mut self, token: impl Into<String>) -> Self {
        self.heartbeat_token = Some(token.into());
        self
    }

    pub fn codec(&self) -> Codec {
        let codec = Codec::new(self.wire);
        match &self.heartbeat_token {
            Some(token) => codec.with_heartbeat_token(token.clone()),
            None => codec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Snapshot of session health, published on every change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub liveness: Liveness,
    pub missed_heartbeats: u32,
}

/// Events delivered to subscribers, in transport order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    Connected,
    Disconnected(String),
    StatusReceived(StatusMessage),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A command was issued while the session was not open
    #[error("session is not connected")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Callback invoked once per decoded status message
pub type StatusCallback = Box<dyn FnMut(&StatusMessage) + Send>;

enum Request {
    Send {
        command: Command,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Close {
        done: oneshot::Sender<()>,
    },
}

/// A session that has not been opened yet
pub struct Session {
    endpoint: Endpoint,
    config: SessionConfig,
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
    callbacks: Vec<StatusCallback>,
}

impl Session {
    pub fn new(endpoint: Endpoint, config: SessionConfig) -> Self {
        Session {
            endpoint,
            config,
            subscribers: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    /// Register a subscriber
    ///
    /// The receiver yields every event once, in arrival order, and ends after
    /// the final `Disconnected`. Delivery never blocks the session, so the
    /// subscriber may call [`SessionHandle::close`] while consuming events.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Register a callback for status messages
    ///
    /// Runs on the driver task, before the matching `StatusReceived` event is
    /// queued to subscribers. It must not block; to close the session from a
    /// callback, spawn [`SessionHandle::close`].
    pub fn on_status<F>(&mut self, callback: F)
    where
        F: FnMut(&StatusMessage) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Start connecting and return immediately
    ///
    /// Must be called from within a tokio runtime. The outcome is reported to
    /// subscribers as `Connected` or `Disconnected("error")`.
    pub fn open<C>(self, connector: C) -> SessionHandle
    where
        C: Connector + 'static,
    {
        let initial = SessionStatus {
            state: SessionState::Connecting,
            liveness: Liveness::Alive,
            missed_heartbeats: 0,
        };
        let (status_tx, status_rx) = watch::channel(initial);
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            endpoint: self.endpoint.clone(),
            codec: self.config.codec(),
            heartbeat_interval: self.config.heartbeat_interval,
            monitor: HeartbeatMonitor::new(self.config.max_missed),
            state: SessionState::Connecting,
            subscribers: self.subscribers,
            callbacks: self.callbacks,
            status: status_tx,
            requests: requests_rx,
        };
        tokio::spawn(driver.run(connector));

        SessionHandle {
            endpoint: self.endpoint,
            requests: requests_tx,
            status: status_rx,
        }
    }
}

/// Cloneable control surface of an opened session
#[derive(Clone)]
pub struct SessionHandle {
    endpoint: Endpoint,
    requests: mpsc::UnboundedSender<Request>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> SessionState {
        self.status().state
    }

    pub fn liveness(&self) -> Liveness {
        self.status().liveness
    }

    /// Encode and write a command
    ///
    /// Fire-and-forget: success means the frames were written, not that the
    /// device acted on them. Fails with [`SessionError::NotConnected`] unless
    /// the session is open; such a command never reaches the transport.
    pub async fn send(&self, command: Command) -> Result<(), SessionError> {
        if self.state() != SessionState::Open {
            return Err(SessionError::NotConnected);
        }

        let (reply, result) = oneshot::channel();
        self.requests
            .send(Request::Send { command, reply })
            .map_err(|_| SessionError::NotConnected)?;
        result.await.unwrap_or(Err(SessionError::NotConnected))
    }

    /// Close the session; a no-op once it is closing or closed
    ///
    /// Returns after the heartbeat timer has been dropped and the transport
    /// closed.
    pub async fn close(&self) {
        let (done, closed) = oneshot::channel();
        if self.requests.send(Request::Close { done }).is_err() {
            return;
        }
        let _ = closed.await;
    }

    /// Wait for the connect attempt to finish; true if the session is open
    pub async fn connected(&self) -> bool {
        let mut status = self.status.clone();
        status
            .wait_for(|status| status.state != SessionState::Connecting)
            .await
            .is_ok_and(|status| status.state == SessionState::Open)
    }

    /// Wait until the session reaches `Closed`
    pub async fn closed(&self) {
        let mut status = self.status.clone();
        let _ = status
            .wait_for(|status| status.state == SessionState::Closed)
            .await;
    }
}

/// Owns everything mutable about one session
struct Driver {
    endpoint: Endpoint,
    codec: Codec,
    heartbeat_interval: Duration,
    monitor: HeartbeatMonitor,
    state: SessionState,
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
    callbacks: Vec<StatusCallback>,
    status: watch::Sender<SessionStatus>,
    requests: mpsc::UnboundedReceiver<Request>,
}

impl Driver {
    async fn run<C: Connector>(mut self, connector: C) {
        if let Some(transport) = self.connect(&connector).await {
            self.serve(transport).await;
        }
    }

    /// Connecting phase; commands are refused until the transport is up
    async fn connect<C: Connector>(&mut self, connector: &C) -> Option<Box<dyn Transport>> {
        let endpoint = self.endpoint.clone();
        info!(endpoint = %endpoint, wire = %self.codec.variant(), "connecting");

        let connect = connector.connect(&endpoint);
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok(transport) => Some(transport),
                        Err(e) => {
                            warn!(endpoint = %endpoint, error = %e, "connection failed");
                            self.set_state(SessionState::Closing);
                            self.finish(DISCONNECT_ERROR);
                            None
                        }
                    };
                }

                request = self.requests.recv() => match request {
                    Some(Request::Send { command, reply }) => {
                        debug!(command = command.name(), "command refused while connecting");
                        let _ = reply.send(Err(SessionError::NotConnected));
                    }
                    Some(Request::Close { done }) => {
                        self.set_state(SessionState::Closing);
                        self.finish(DISCONNECT_CLOSED);
                        let _ = done.send(());
                        return None;
                    }
                    None => {
                        self.set_state(SessionState::Closing);
                        self.finish(DISCONNECT_CLOSED);
                        return None;
                    }
                },
            }
        }
    }

    /// Open phase; runs until the transport fails, liveness is lost, or close
    async fn serve(mut self, mut transport: Box<dyn Transport>) {
        self.monitor.start();
        let mut heartbeat = time::interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.set_state(SessionState::Open);
        info!(endpoint = %self.endpoint, "session open");
        self.emit(SessionEvent::Connected);

        let mut close_ack = None;
        let reason = loop {
            tokio::select! {
                inbound = transport.recv() => match inbound {
                    Some(Ok(frame)) => {
                        self.monitor.observe_traffic();
                        let message = self.codec.decode(frame.as_bytes());
                        debug!(bytes = frame.len(), message = ?message, "status received");
                        self.publish();
                        for callback in &mut self.callbacks {
                            callback(&message);
                        }
                        self.emit(SessionEvent::StatusReceived(message));
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "transport error");
                        break DISCONNECT_ERROR;
                    }
                    None => {
                        info!("device closed the connection");
                        break DISCONNECT_PEER_CLOSED;
                    }
                },

                _ = heartbeat.tick() => match self.monitor.tick() {
                    HeartbeatAction::SendHeartbeat => {
                        debug!(missed = self.monitor.missed(), "sending heartbeat");
                        self.publish();
                        let sent = write(&self.codec, transport.as_mut(), &Command::Heartbeat, self.heartbeat_interval).await;
                        if let Err(e) = sent {
                            warn!(error = %e, "heartbeat send failed");
                            break DISCONNECT_ERROR;
                        }
                    }
                    HeartbeatAction::LivenessLost => {
                        warn!(missed = self.monitor.missed(), "closing connection: {}", LIVENESS_LOST_REASON);
                        break LIVENESS_LOST_REASON;
                    }
                    HeartbeatAction::Idle => {}
                },

                request = self.requests.recv() => match request {
                    Some(Request::Send { command, reply }) => {
                        match write(&self.codec, transport.as_mut(), &command, self.heartbeat_interval).await {
                            Ok(()) => {
                                let _ = reply.send(Ok(()));
                            }
                            Err(e) => {
                                warn!(command = command.name(), error = %e, "command send failed");
                                let _ = reply.send(Err(SessionError::Transport(e)));
                                break DISCONNECT_ERROR;
                            }
                        }
                    }
                    Some(Request::Close { done }) => {
                        close_ack = Some(done);
                        break DISCONNECT_CLOSED;
                    }
                    None => break DISCONNECT_CLOSED,
                },
            }
        };

        self.set_state(SessionState::Closing);
        self.monitor.stop();
        drop(heartbeat);
        if time::timeout(self.heartbeat_interval, transport.close()).await.is_err() {
            warn!("transport close timed out");
        }
        self.finish(reason);

        if let Some(done) = close_ack {
            let _ = done.send(());
        }
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(SessionStatus {
            state: self.state,
            liveness: self.monitor.liveness(),
            missed_heartbeats: self.monitor.missed(),
        });
    }

    /// Final transition; emits the one `Disconnected` event
    fn finish(&mut self, reason: &str) {
        self.set_state(SessionState::Closed);
        info!(endpoint = %self.endpoint, reason, "session closed");
        self.emit(SessionEvent::Disconnected(reason.to_string()));
        self.subscribers.clear();
        self.callbacks.clear();
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

/// Write every frame of `command`; a write stalled past `deadline` fails
///
/// A dead peer can leave the socket unwritable without ever erroring, and the
/// driver must keep serving ticks and close requests.
async fn write(
    codec: &Codec,
    transport: &mut dyn Transport,
    command: &Command,
    deadline: Duration,
) -> Result<(), TransportError> {
    for frame in codec.encode(command) {
        debug!(command = command.name(), bytes = frame.len(), "sending frame");
        time::timeout(deadline, transport.send(frame))
            .await
            .map_err(|_| TransportError::Timeout(deadline))??;
    }
    Ok(())
}
