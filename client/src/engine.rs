//! The per-connection protocol state machine
//!
//! [`ProtocolEngine`] owns everything the correlation invariants span: the
//! sequencer's pending table and queue, the handler registry, the in-flight
//! deferred actions and the liveness timestamps. It is synchronous and takes
//! the current time as an argument; the async connection actor is its only
//! owner and feeds it packets, commands and ticks one at a time.
//!
//! Packets the engine wants on the wire collect in an outbox that the owner
//! drains after every call.

use log::{debug, info, warn};
use rcon_shared::{Origin, Packet, PacketKind, OK};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::action::NetworkAction;
use crate::config::ConnectionConfig;
use crate::coordinator::{ActionId, Coordinator, DeferredAction};
use crate::events::{ConnectionEvent, ConnectionState, Subscribers};
use crate::liveness::LivenessMonitor;
use crate::router::Router;
use crate::sequencer::{Sequencer, Submission};
use crate::variant::{ActionTranslator, ProtocolVariant};

pub struct ProtocolEngine {
    state: ConnectionState,
    variant: ProtocolVariant,
    request_timeout: Duration,
    action_timeout: Duration,
    sequencer: Sequencer,
    router: Router,
    coordinator: Coordinator,
    liveness: LivenessMonitor,
    subscribers: Subscribers,
    outbound: Vec<Packet>,
}

impl ProtocolEngine {
    pub fn new(config: &ConnectionConfig, router: Router) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            variant: config.variant,
            request_timeout: config.request_timeout,
            action_timeout: config.action_timeout,
            sequencer: Sequencer::new(),
            router,
            coordinator: Coordinator::new(),
            liveness: LivenessMonitor::new(config.stale_after),
            subscribers: Subscribers::new(),
            outbound: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, sender: mpsc::UnboundedSender<ConnectionEvent>) {
        self.subscribers.add(sender);
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn set_state(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }
        info!("Connection state {:?} -> {:?}", from, to);
        self.state = to;
        self.subscribers.publish(ConnectionEvent::StateChanged { from, to });
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    /// Packets waiting to be written, in wire order
    pub fn drain_outbound(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outbound)
    }

    fn emit(&mut self, packet: Packet, now: Instant) {
        debug!("-> {}", packet);
        self.liveness.packet_sent(now);
        self.subscribers.publish(ConnectionEvent::PacketSent(packet.clone()));
        self.outbound.push(packet);
    }

    /// Sends one packet, subject to flow control when it is a client
    /// request. Returns the packet as numbered, whether it went on the wire
    /// now or was queued.
    pub fn send(&mut self, packet: Packet, now: Instant) -> Packet {
        match self.sequencer.submit(packet, now) {
            Submission::Transmit(packet) => {
                self.emit(packet.clone(), now);
                packet
            }
            Submission::Queued(packet) => packet,
        }
    }

    /// Translates and sends an action without tracking it
    pub fn action(&mut self, action: &NetworkAction, now: Instant) -> Vec<Packet> {
        self.variant
            .translate(action)
            .into_iter()
            .map(|packet| self.send(packet, now))
            .collect()
    }

    /// Translates, sends and tracks an action. `sent` fires before this
    /// returns; everything else fires as responses arrive or time passes.
    pub fn action_deferred(&mut self, mut deferred: DeferredAction, now: Instant) -> ActionId {
        if deferred.packets.is_empty() {
            deferred.packets = self.variant.translate(deferred.action());
        }

        let requests: Vec<Packet> = deferred
            .packets
            .clone()
            .into_iter()
            .map(|packet| self.send(packet, now))
            .collect();

        self.coordinator
            .begin(deferred, requests, now, self.action_timeout)
    }

    /// Processes one packet read from the transport
    pub fn receive(&mut self, packet: Packet, now: Instant) {
        debug!("<- {}", packet);
        self.liveness.packet_received(now);
        self.subscribers.publish(ConnectionEvent::PacketReceived(packet.clone()));

        match (packet.origin, packet.kind) {
            (Origin::Client, PacketKind::Response) => self.handle_response(packet, now),
            (Origin::Server, PacketKind::Request) => {
                self.router.dispatch(None, &packet);
                let ack = Packet::response_to(&packet, [OK]);
                self.send(ack, now);
            }
            _ => {
                warn!("Unexpected packet from server: {}", packet);
                self.router.dispatch(None, &packet);
            }
        }
    }

    fn handle_response(&mut self, response: Packet, now: Instant) {
        let Some(pending) = self.sequencer.correlate(&response) else {
            return;
        };

        if let Some(next) = self.sequencer.release_next(now) {
            self.emit(next, now);
        }

        if is_login(&pending.packet) && response.is_ok() {
            self.set_state(ConnectionState::LoggedIn);
        }

        self.router.dispatch(Some(&pending.packet), &response);
        self.coordinator.on_response(&pending.packet, &response);
    }

    /// Expires overdue actions and untracked requests, then checks liveness
    pub fn tick(&mut self, now: Instant) {
        let mut released = false;
        for sequence in self.coordinator.expire_due(now) {
            released |= self.sequencer.release(sequence).is_some();
        }
        let coordinator = &self.coordinator;
        released |= !self
            .sequencer
            .expire_stale(now, self.request_timeout, |sequence| {
                coordinator.owner_of(sequence).is_some()
            })
            .is_empty();

        if released {
            if let Some(next) = self.sequencer.release_next(now) {
                self.emit(next, now);
            }
        }

        self.poke(now);
    }

    /// Disconnects a logged-in connection when neither direction has seen
    /// recent traffic. Returns true when it did.
    pub fn poke(&mut self, now: Instant) -> bool {
        if !self.state.is_logged_in() || !self.liveness.is_stale(now) {
            return false;
        }

        warn!(
            "No traffic for {:?} in either direction, disconnecting",
            self.liveness.stale_after()
        );
        self.teardown("connection went stale");
        true
    }

    /// The transport failed; report it and tear down
    pub fn transport_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.subscribers.publish(ConnectionEvent::SocketException {
            message: message.clone(),
        });
        self.teardown(&message);
    }

    /// The connection ended without a transport error (peer closed, connect
    /// refused); report it and tear down
    pub fn connection_lost(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.subscribers.publish(ConnectionEvent::ConnectionFailure {
            reason: reason.clone(),
        });
        self.teardown(&reason);
    }

    /// Expires every in-flight action, forgets every pending and queued
    /// request and moves to Disconnected
    pub fn teardown(&mut self, reason: &str) {
        if self.state != ConnectionState::Disconnected {
            info!("Tearing down connection: {}", reason);
        }

        self.coordinator.expire_all();
        let (pending, queued) = self.sequencer.drain();
        if !pending.is_empty() || !queued.is_empty() {
            warn!(
                "Discarding {} outstanding and {} queued request(s)",
                pending.len(),
                queued.len()
            );
        }

        self.liveness.reset();
        self.set_state(ConnectionState::Disconnected);
    }
}

fn is_login(request: &Packet) -> bool {
    request
        .command()
        .is_some_and(|command| command.starts_with("login."))
        && request.words.len() >= 2
}
