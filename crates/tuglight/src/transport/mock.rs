//! In-memory transport for driving a session in tests
//!
//! [`mock_pair`] returns a connector for the session and a [`MockPeer`] that
//! plays the device: it injects inbound frames and inspects what was sent.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use tuglight_core::{Endpoint, Frame};

use super::{Connector, Transport, TransportError};

pub(crate) struct MockConnector {
    transport: Mutex<Option<MockTransport>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    refuse: bool,
}

impl MockConnector {
    /// Hold the connect step until the returned sender fires
    pub(crate) fn gated(self) -> (Self, oneshot::Sender<()>) {
        let (release, gate) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(gate);
        (self, release)
    }

    /// Make every write on the connected transport hang forever
    pub(crate) fn stalled_writes(self) -> Self {
        if let Some(transport) = self.transport.lock().unwrap().as_mut() {
            transport.stall_writes = true;
        }
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, TransportError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if self.refuse {
            return Err(TransportError::Connect {
                endpoint: endpoint.url(),
                reason: "connection refused".to_string(),
            });
        }

        let transport = self.transport.lock().unwrap().take();
        match transport {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(TransportError::Closed),
        }
    }
}

pub(crate) struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
    outbound: mpsc::UnboundedSender<Frame>,
    closed: Arc<AtomicBool>,
    stall_writes: bool,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if self.stall_writes {
            std::future::pending::<()>().await;
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.outbound.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// The device side of a mock connection
pub(crate) struct MockPeer {
    inbound: Option<mpsc::UnboundedSender<Result<Frame, TransportError>>>,
    outbound: mpsc::UnboundedReceiver<Frame>,
    closed: Arc<AtomicBool>,
}

impl MockPeer {
    /// Deliver a text frame to the session
    pub(crate) fn push(&self, text: &str) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.send(Ok(Frame::text(text)));
        }
    }

    /// Fail the connection with a transport error
    pub(crate) fn fail(&self) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.send(Err(TransportError::Closed));
        }
    }

    /// Close the connection from the device side
    pub(crate) fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Every frame the session has written so far
    pub(crate) fn sent(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub(crate) fn mock_pair() -> (MockConnector, MockPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));

    let transport = MockTransport {
        inbound: inbound_rx,
        outbound: outbound_tx,
        closed: closed.clone(),
        stall_writes: false,
    };
    let connector = MockConnector {
        transport: Mutex::new(Some(transport)),
        gate: Mutex::new(None),
        refuse: false,
    };
    let peer = MockPeer {
        inbound: Some(inbound_tx),
        outbound: outbound_rx,
        closed,
    };
    (connector, peer)
}

/// A connector whose connect step always fails
pub(crate) fn refusing_connector() -> MockConnector {
    MockConnector {
        transport: Mutex::new(None),
        gate: Mutex::new(None),
        refuse: true,
    }
}
