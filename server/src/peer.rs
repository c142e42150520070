//! Outbound delivery to connected players
//!
//! The engine never writes to a socket directly. Every joined player is
//! bound to a bounded in-memory queue whose receiving half is drained by
//! the transport's writer task. Delivery waits for queue space for at most
//! [`DELIVERY_TIMEOUT`], so a stalled player degrades into dropped messages
//! instead of a stuck match.

use crate::error::{ArenaError, Result};
use futures::future::join_all;
use log::{debug, warn};
use shared::{PlayerSlot, ServerMessage};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::timeout;

pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(1);
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    Normal,
    UnsupportedData,
}

impl CloseCode {
    /// WebSocket close status code
    pub fn as_u16(self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::UnsupportedData => 1003,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: CloseCode,
    pub reason: String,
}

impl CloseFrame {
    pub fn new(code: CloseCode, reason: &str) -> Self {
        Self {
            code,
            reason: reason.to_string(),
        }
    }
}

/// Items the transport writer task pulls off a player's queue
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    Close(CloseFrame),
}

pub type PeerReceiver = mpsc::Receiver<Outbound>;

/// Sending half of a player's outbound queue
#[derive(Debug, Clone)]
pub struct PeerSender {
    tx: mpsc::Sender<Outbound>,
}

/// Creates a connected sender/receiver pair for one player connection
pub fn channel() -> (PeerSender, PeerReceiver) {
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
    (PeerSender { tx }, rx)
}

impl PeerSender {
    /// Queues a message, waiting at most [`DELIVERY_TIMEOUT`] for room
    pub async fn send(&self, message: ServerMessage) -> std::result::Result<(), String> {
        match timeout(DELIVERY_TIMEOUT, self.tx.send(Outbound::Message(message))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err("connection closed".to_string()),
            Err(_) => Err(format!("timed out after {:?}", DELIVERY_TIMEOUT)),
        }
    }

    /// Queues a message without waiting. Safe to call while holding a match lock.
    pub fn try_send(&self, message: ServerMessage) -> std::result::Result<(), String> {
        self.tx
            .try_send(Outbound::Message(message))
            .map_err(|e| match e {
                TrySendError::Full(_) => "outbound queue full".to_string(),
                TrySendError::Closed(_) => "connection closed".to_string(),
            })
    }

    /// Asks the transport to close the connection.
    ///
    /// Never blocks. If the queue is full the close frame is lost, but the
    /// connection still ends once the last sender is dropped.
    pub fn close(&self, frame: CloseFrame) {
        if let Err(e) = self.tx.try_send(Outbound::Close(frame)) {
            debug!("close frame not queued: {}", e);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A player's queue together with the slot it belongs to
#[derive(Debug, Clone)]
pub struct Recipient {
    pub slot: PlayerSlot,
    pub peer: PeerSender,
}

impl Recipient {
    pub async fn deliver(&self, message: ServerMessage) -> Result<()> {
        self.peer
            .send(message)
            .await
            .map_err(|reason| ArenaError::DeliveryFailure {
                slot: self.slot,
                reason,
            })
    }
}

/// Delivers one message to every recipient concurrently.
///
/// Returns once each delivery has completed, failed, or timed out. Failures
/// are logged and never propagated, so one broken player cannot affect the
/// other.
pub async fn broadcast(recipients: &[Recipient], message: &ServerMessage) {
    let deliveries = recipients
        .iter()
        .map(|recipient| recipient.deliver(message.clone()));

    for result in join_all(deliveries).await {
        if let Err(e) = result {
            warn!("broadcast error: {}", e);
        }
    }
}
