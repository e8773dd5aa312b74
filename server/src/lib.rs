//! # Mock RCON Server Library
//!
//! A small, scriptable stand-in for a Frostbite game server's RCON port. It
//! speaks the same length-prefixed framing as the client and answers the
//! common administrative commands from an in-memory game, which makes it the
//! other end of every integration test and a convenient target for poking at
//! the `rcon` command line client by hand.
//!
//! ## Architecture Design
//!
//! ### Single Game Loop
//! One task owns the [`MockGame`] and the [`SessionManager`]. Connection tasks
//! forward decoded packets to it over a channel and it answers them one at a
//! time, so game state never needs a lock.
//!
//! ### Per-Session Writers
//! Every session has its own writer task draining an unbounded channel. The
//! configured response delay is applied there, keeping slow sessions from
//! stalling the game loop.
//!
//! ### Fault Injection
//! A seeded random number generator decides which responses to drop, so
//! timeout and expiry paths on the client can be exercised deterministically.
//!
//! ## Module Organization
//!
//! - `game`: roster, map rotation, ban list and the command handlers
//! - `session`: per-connection login and event state, capacity and idle limits
//! - `network`: listener, connection tasks and the main loop
//! - `config`: [`MockServerConfig`]
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use rcon_server::{MockServer, MockServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = MockServer::bind(MockServerConfig::new("127.0.0.1:0")).await?;
//!     println!("listening on {}", server.local_addr()?);
//!
//!     let handle = server.handle();
//!     let task = tokio::spawn(server.run());
//!
//!     handle.broadcast_event(["player.onJoin", "Phogue"]);
//!     handle.shutdown();
//!     task.await??;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod network;
pub mod session;

pub use config::MockServerConfig;
pub use game::{MockGame, Reply, PLAYER_COLUMNS};
pub use network::{MockServer, MockServerHandle, ServerMessage};
pub use session::{Session, SessionManager};
