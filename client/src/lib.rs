//! # RCON Client Library
//!
//! The client side of a Frostbite-style RCON connection: everything between a
//! logical administrative action ("kick these two players") and the words on
//! the wire, plus everything between a packet arriving and the code that
//! cares about it.
//!
//! ## Architecture Overview
//!
//! ### One Owner for All Correlation State
//! The pending request table, the send queue, the handler registry, the
//! in-flight deferred actions and the liveness timestamps all live inside a
//! single [`ProtocolEngine`]. The engine is a synchronous state machine fed
//! one event at a time by the connection actor, so none of it needs a lock
//! and the invariants between those pieces hold after every step.
//!
//! ### One Request on the Wire
//! The protocol allows a single outstanding client request. Further requests
//! are numbered immediately but wait in a FIFO queue; each correlated
//! response releases exactly one of them. Acknowledgements of server events
//! bypass the queue.
//!
//! ### Completion by Callback
//! Submitting never blocks. A [`DeferredAction`] reports `sent`, one `each`
//! per response, then `done` or `expired`, then `always` exactly once, even
//! when the connection is torn down underneath it.
//!
//! ## Module Organization
//!
//! ### Sequencer Module (`sequencer`)
//! - Sequence number allocation
//! - Pending request table and response correlation
//! - Send queue with single-outstanding-request flow control
//!
//! ### Router Module (`router`)
//! Registry of handlers keyed by command name and origin filter. Responses
//! route by their request's command, unsolicited packets by their own.
//!
//! ### Coordinator Module (`coordinator`)
//! Tracks multi-packet actions to completion or expiry.
//!
//! ### Variant Module (`variant`)
//! Translates actions into packets for each supported game generation.
//!
//! ### Liveness Module (`liveness`)
//! Decides when a logged-in connection has gone quiet.
//!
//! ### Connection Module (`connection`)
//! The tokio tasks that own the socket and the engine, and the handle used to
//! talk to them.
//!
//! ## Usage Example
//!
//! ```no_run
//! use rcon_client::{ConnectionConfig, Connector, NetworkAction};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let connection = Connector::new(ConnectionConfig::new("127.0.0.1:47200"))
//!     .connect()
//!     .await?;
//!
//! if connection.login("secret").await? {
//!     let outcome = connection
//!         .execute(NetworkAction::kick("Phogue", "Team killing"), None)
//!         .await?;
//!     println!("kick finished: {:?}", outcome.state);
//! }
//!
//! connection.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod liveness;
pub mod router;
pub mod sequencer;
pub mod transport;
pub mod variant;

pub use action::{ActionKind, ActionScope, NetworkAction};
pub use config::ConnectionConfig;
pub use connection::{ActionOutcome, ConnectionHandle, Connector};
pub use coordinator::{ActionId, ActionState, Coordinator, DeferredAction};
pub use engine::ProtocolEngine;
pub use error::ConnectionError;
pub use events::{ConnectionEvent, ConnectionState, Subscribers};
pub use liveness::LivenessMonitor;
pub use router::{Handler, OriginFilter, Router, RouterBuilder};
pub use sequencer::{PendingRequest, Sequencer, Submission};
pub use transport::Transport;
pub use variant::{ActionTranslator, ProtocolVariant};
