//! Packet model shared by the client engine and the mock server
//!
//! A packet is an ordered list of words plus the two header bits every
//! Frostbite-style frame carries: who originated the exchange and whether
//! this frame is the request or the response half of it. A response always
//! carries the origin and sequence number of the request it answers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::codec::join;

/// Status word a peer answers with when a request succeeded
pub const OK: &str = "OK";

/// Side of the connection that started an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    Client,
    Server,
}

/// Whether a frame opens an exchange or answers one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    Request,
    Response,
}

/// One frame on the wire
#[derive(Debug, Clone)]
pub struct Packet {
    pub origin: Origin,
    pub kind: PacketKind,
    sequence: Option<u32>,
    pub words: Vec<String>,
    pub created_at: Instant,
}

impl Packet {
    pub fn new<S: Into<String>>(
        origin: Origin,
        kind: PacketKind,
        sequence: Option<u32>,
        words: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            origin,
            kind,
            sequence,
            words: words.into_iter().map(Into::into).collect(),
            created_at: Instant::now(),
        }
    }

    /// Creates a client request without a sequence number; the sequencer
    /// assigns one when the packet is submitted.
    pub fn request<S: Into<String>>(words: impl IntoIterator<Item = S>) -> Self {
        Self::new(Origin::Client, PacketKind::Request, None, words)
    }

    /// Creates a server-originated request (an unsolicited event)
    pub fn event<S: Into<String>>(sequence: u32, words: impl IntoIterator<Item = S>) -> Self {
        Self::new(Origin::Server, PacketKind::Request, Some(sequence), words)
    }

    /// Builds the response half of `request`, keeping its origin and sequence
    pub fn response_to<S: Into<String>>(request: &Packet, words: impl IntoIterator<Item = S>) -> Self {
        Self::new(request.origin, PacketKind::Response, request.sequence, words)
    }

    pub fn sequence(&self) -> Option<u32> {
        self.sequence
    }

    /// Assigns the sequence number once. Returns false and leaves the packet
    /// untouched when a number was already assigned.
    pub fn assign_sequence(&mut self, sequence: u32) -> bool {
        if self.sequence.is_some() {
            return false;
        }
        self.sequence = Some(sequence);
        true
    }

    /// First word of the payload: the command, event name or status token
    pub fn command(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }

    pub fn is_ok(&self) -> bool {
        self.command() == Some(OK)
    }

    pub fn is_request(&self) -> bool {
        self.kind == PacketKind::Request
    }

    pub fn is_response(&self) -> bool {
        self.kind == PacketKind::Response
    }

    /// Words after the command/status token
    pub fn arguments(&self) -> &[String] {
        self.words.get(1..).unwrap_or(&[])
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self.origin {
            Origin::Client => 'C',
            Origin::Server => 'S',
        };
        let kind = match self.kind {
            PacketKind::Request => 'Q',
            PacketKind::Response => 'R',
        };
        match self.sequence {
            Some(sequence) => write!(f, "{}{}#{} {}", origin, kind, sequence, join(&self.words)),
            None => write!(f, "{}{}#- {}", origin, kind, join(&self.words)),
        }
    }
}
