//! Connection state and the notifications published to subscribers

use log::debug;
use rcon_shared::Packet;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    LoggedIn,
}

impl ConnectionState {
    pub fn is_logged_in(self) -> bool {
        self == Self::LoggedIn
    }
}

#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    PacketSent(Packet),
    PacketReceived(Packet),
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    SocketException {
        message: String,
    },
    ConnectionFailure {
        reason: String,
    },
}

/// Ordered fan-out of events to every live subscriber. Subscribers whose
/// receiver was dropped are pruned on the next publish.
#[derive(Debug, Default)]
pub struct Subscribers {
    senders: Vec<mpsc::UnboundedSender<ConnectionEvent>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sender: mpsc::UnboundedSender<ConnectionEvent>) {
        self.senders.push(sender);
    }

    pub fn publish(&mut self, event: ConnectionEvent) {
        let before = self.senders.len();
        self.senders.retain(|sender| sender.send(event.clone()).is_ok());
        if self.senders.len() < before {
            debug!("Dropped {} closed subscriber(s)", before - self.senders.len());
        }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
