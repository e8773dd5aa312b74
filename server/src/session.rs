//! Per-connection state on the mock server
//!
//! Each accepted TCP connection becomes a [`Session`] that tracks whether it
//! has logged in, whether it asked for events, when it was last heard from
//! and where its outbound packets go. [`SessionManager`] owns every session,
//! enforces the connection limit and finds idle sessions.

use log::{debug, info};
use rcon_shared::Packet;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug)]
pub struct Session {
    pub id: u32,
    pub addr: SocketAddr,
    /// Last time any packet arrived from this session
    pub last_seen: Instant,
    pub logged_in: bool,
    /// Set by `admin.eventsEnabled true`
    pub events_enabled: bool,
    next_event_sequence: u32,
    outbound: mpsc::UnboundedSender<Packet>,
}

impl Session {
    pub fn new(id: u32, addr: SocketAddr, outbound: mpsc::UnboundedSender<Packet>) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            logged_in: false,
            events_enabled: false,
            next_event_sequence: 1,
            outbound,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Whether server events should be pushed to this session
    pub fn wants_events(&self) -> bool {
        self.logged_in && self.events_enabled
    }

    /// Builds a server-originated request with this session's next event
    /// sequence number
    pub fn next_event<S: Into<String>>(&mut self, words: impl IntoIterator<Item = S>) -> Packet {
        let sequence = self.next_event_sequence;
        self.next_event_sequence = self.next_event_sequence.wrapping_add(1).max(1);
        Packet::event(sequence, words)
    }

    /// Queues a packet for this session's writer. Returns false once the
    /// writer is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.outbound.send(packet).is_ok()
    }
}

pub struct SessionManager {
    sessions: HashMap<u32, Session>,
    next_session_id: u32,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            next_session_id: 1,
            max_sessions,
        }
    }

    /// Returns None when the server is full
    pub fn add_session(&mut self, addr: SocketAddr, outbound: mpsc::UnboundedSender<Packet>) -> Option<u32> {
        if self.sessions.len() >= self.max_sessions {
            return None;
        }

        let id = self.next_session_id;
        self.next_session_id += 1;

        info!("Session {} opened from {}", id, addr);
        self.sessions.insert(id, Session::new(id, addr, outbound));
        Some(id)
    }

    pub fn remove_session(&mut self, id: &u32) -> bool {
        if let Some(session) = self.sessions.remove(id) {
            info!("Session {} from {} closed", session.id, session.addr);
            true
        } else {
            false
        }
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Pushes an event to every session that asked for events. Returns how
    /// many sessions it was queued for.
    pub fn broadcast_event<S: AsRef<str>>(&mut self, words: &[S]) -> usize {
        let mut delivered = 0;
        for session in self.sessions.values_mut().filter(|s| s.wants_events()) {
            let event = session.next_event(words.iter().map(|w| w.as_ref().to_string()));
            debug!("Event to session {}: {}", session.id, event);
            if session.send(event) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Removes and returns sessions idle for longer than `timeout`
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .sessions
            .values()
            .filter(|session| session.is_timed_out(timeout))
            .map(|session| session.id)
            .collect();

        for id in &timed_out {
            self.remove_session(id);
        }
        timed_out
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
