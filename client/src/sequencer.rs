//! Request numbering, response correlation and client-side flow control
//!
//! The protocol allows a single client request on the wire at a time. The
//! sequencer numbers every client request, lets the first one through and
//! parks the rest in a FIFO queue that drains one packet per correlated
//! response. Responses to server-originated requests never pass through here.

use log::{debug, warn};
use rcon_shared::{Origin, Packet, PacketKind};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// A transmitted client request awaiting its response
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub sequence: u32,
    pub packet: Packet,
    pub sent_at: Instant,
}

/// Outcome of handing a packet to the sequencer
#[derive(Debug, Clone)]
pub enum Submission {
    /// Goes on the wire now
    Transmit(Packet),
    /// Parked behind the outstanding request
    Queued(Packet),
}

impl Submission {
    pub fn packet(&self) -> &Packet {
        match self {
            Self::Transmit(packet) | Self::Queued(packet) => packet,
        }
    }

    pub fn into_packet(self) -> Packet {
        match self {
            Self::Transmit(packet) | Self::Queued(packet) => packet,
        }
    }
}

#[derive(Debug)]
pub struct Sequencer {
    next_sequence: u32,
    pending: HashMap<u32, PendingRequest>,
    queue: VecDeque<Packet>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            pending: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    /// Returns 1, 2, 3, ... for the lifetime of this connection
    pub fn acquire_sequence_number(&mut self) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1).max(1);
        sequence
    }

    /// Numbers a client request and either releases it or queues it.
    ///
    /// Packets that are not client requests are returned as `Transmit`
    /// untouched; they are not subject to flow control.
    pub fn submit(&mut self, mut packet: Packet, now: Instant) -> Submission {
        if packet.origin != Origin::Client || packet.kind != PacketKind::Request {
            return Submission::Transmit(packet);
        }

        if packet.sequence().is_none() {
            let sequence = self.acquire_sequence_number();
            packet.assign_sequence(sequence);
        }

        if self.pending.is_empty() {
            self.record(packet.clone(), now);
            Submission::Transmit(packet)
        } else {
            debug!(
                "Queueing {} behind {} outstanding request(s), {} already queued",
                packet,
                self.pending.len(),
                self.queue.len()
            );
            self.queue.push_back(packet.clone());
            Submission::Queued(packet)
        }
    }

    fn record(&mut self, packet: Packet, now: Instant) {
        if let Some(sequence) = packet.sequence() {
            let replaced = self.pending.insert(
                sequence,
                PendingRequest {
                    sequence,
                    packet,
                    sent_at: now,
                },
            );
            if let Some(previous) = replaced {
                warn!(
                    "Request #{} reused while still pending, forgetting {}",
                    sequence, previous.packet
                );
            }
        }
    }

    /// Removes and returns the pending request `response` answers. Unknown
    /// sequence numbers are dropped with a warning.
    pub fn correlate(&mut self, response: &Packet) -> Option<PendingRequest> {
        let Some(sequence) = response.sequence() else {
            warn!("Dropping response without a sequence number: {}", response);
            return None;
        };

        let pending = self.pending.remove(&sequence);
        if pending.is_none() {
            warn!("Dropping response to unknown request #{}: {}", sequence, response);
        }
        pending
    }

    /// Releases the next queued packet once nothing is outstanding
    pub fn release_next(&mut self, now: Instant) -> Option<Packet> {
        if !self.pending.is_empty() {
            return None;
        }
        let packet = self.queue.pop_front()?;
        self.record(packet.clone(), now);
        Some(packet)
    }

    /// Forgets an outstanding request without a response
    pub fn release(&mut self, sequence: u32) -> Option<PendingRequest> {
        self.pending.remove(&sequence)
    }

    /// Force-expires outstanding requests sent more than `timeout` ago.
    /// Requests for which `tracked` returns true are left alone; their owner
    /// expires them on its own deadline.
    pub fn expire_stale(
        &mut self,
        now: Instant,
        timeout: Duration,
        tracked: impl Fn(u32) -> bool,
    ) -> Vec<PendingRequest> {
        let stale: Vec<u32> = self
            .pending
            .values()
            .filter(|pending| now.saturating_duration_since(pending.sent_at) > timeout)
            .filter(|pending| !tracked(pending.sequence))
            .map(|pending| pending.sequence)
            .collect();

        stale
            .into_iter()
            .filter_map(|sequence| self.pending.remove(&sequence))
            .inspect(|pending| warn!("Request {} expired without a response", pending.packet))
            .collect()
    }

    /// Empties the table and the queue, returning what was in them
    pub fn drain(&mut self) -> (Vec<PendingRequest>, Vec<Packet>) {
        let mut pending: Vec<PendingRequest> = self.pending.drain().map(|(_, p)| p).collect();
        pending.sort_by_key(|p| p.sequence);
        (pending, self.queue.drain(..).collect())
    }

    pub fn is_pending(&self, sequence: u32) -> bool {
        self.pending.contains_key(&sequence)
    }

    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}
