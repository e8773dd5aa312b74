//! Mock server network layer: TCP sessions around a single game loop

use crate::config::MockServerConfig;
use crate::game::MockGame;
use crate::session::SessionManager;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rcon_shared::{read_packet, write_packet, Origin, Packet, PacketKind};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

/// Messages sent from connection tasks and handles to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { session_id: u32, packet: Packet },
    SessionClosed { session_id: u32 },
    Broadcast { words: Vec<String> },
    Shutdown,
}

/// Cloneable remote control for a running [`MockServer`]
#[derive(Debug, Clone)]
pub struct MockServerHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl MockServerHandle {
    /// Pushes a server event to every session that enabled events
    pub fn broadcast_event<S: Into<String>>(&self, words: impl IntoIterator<Item = S>) -> bool {
        let words = words.into_iter().map(Into::into).collect();
        self.server_tx.send(ServerMessage::Broadcast { words }).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.server_tx.send(ServerMessage::Shutdown).is_ok()
    }
}

/// Accepts RCON connections and answers them from a [`MockGame`]
pub struct MockServer {
    listener: TcpListener,
    config: MockServerConfig,
    game: MockGame,
    sessions: SessionManager,
    rng: StdRng,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl MockServer {
    pub async fn bind(config: MockServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.address).await?;
        info!("Mock server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            listener,
            game: MockGame::populated(config.password.clone(), config.ban_layout),
            sessions: SessionManager::new(config.max_sessions),
            rng,
            config,
            server_tx,
            server_rx,
        })
    }

    /// Replaces the default roster and map rotation
    pub fn with_game(mut self, game: MockGame) -> Self {
        self.game = game;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> MockServerHandle {
        MockServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Serves until [`MockServerHandle::shutdown`] is called
    pub async fn run(mut self) -> std::io::Result<()> {
        let mut timeout_check = interval(Duration::from_secs(1));

        info!(
            "Mock server started (delay {:?}, drop rate {:.2})",
            self.config.response_delay, self.config.drop_rate
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.accept(stream, addr),
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        sleep(Duration::from_millis(10)).await;
                    }
                },

                message = self.server_rx.recv() => match message {
                    Some(ServerMessage::PacketReceived { session_id, packet }) => {
                        self.handle_packet(session_id, packet);
                    }
                    Some(ServerMessage::SessionClosed { session_id }) => {
                        self.sessions.remove_session(&session_id);
                    }
                    Some(ServerMessage::Broadcast { words }) => {
                        let delivered = self.sessions.broadcast_event(&words);
                        debug!("Broadcast {:?} to {} session(s)", words, delivered);
                    }
                    Some(ServerMessage::Shutdown) | None => {
                        info!("Mock server shutting down");
                        break;
                    }
                },

                _ = timeout_check.tick() => {
                    for session_id in self.sessions.check_timeouts(self.config.idle_timeout) {
                        info!("Session {} timed out", session_id);
                    }
                }
            }
        }

        Ok(())
    }

    fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let Some(session_id) = self.sessions.add_session(addr, outbound_tx) else {
            warn!("Rejecting {}: server full", addr);
            return;
        };

        let (reader, writer) = stream.into_split();
        spawn_session_reader(session_id, reader, self.server_tx.clone());
        spawn_session_writer(session_id, writer, outbound_rx, self.config.response_delay);
    }

    fn handle_packet(&mut self, session_id: u32, packet: Packet) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            debug!("Packet for closed session {}: {}", session_id, packet);
            return;
        };
        session.touch();

        match (packet.origin, packet.kind) {
            (Origin::Client, PacketKind::Request) => {
                debug!("Session {} <- {}", session_id, packet);
                let reply = self.game.handle(session, &packet);
                let response = Packet::response_to(&packet, reply.words);

                if should_drop(&mut self.rng, self.config.drop_rate) {
                    debug!("Dropping response {}", response);
                } else {
                    session.send(response);
                }

                for event in reply.events {
                    self.sessions.broadcast_event(&event);
                }
            }
            (Origin::Server, PacketKind::Response) => {
                debug!("Session {} acknowledged event: {}", session_id, packet);
            }
            _ => warn!("Unexpected packet from session {}: {}", session_id, packet),
        }
    }
}

fn should_drop(rng: &mut StdRng, drop_rate: f64) -> bool {
    drop_rate > 0.0 && rng.gen_bool(drop_rate.min(1.0))
}

fn spawn_session_reader<R>(session_id: u32, mut reader: R, server_tx: mpsc::UnboundedSender<ServerMessage>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match read_packet(&mut reader).await {
                Ok(Some(packet)) => {
                    if server_tx
                        .send(ServerMessage::PacketReceived { session_id, packet })
                        .is_err()
                    {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) if e.is_recoverable() => warn!("Session {} sent a bad frame: {}", session_id, e),
                Err(e) => {
                    warn!("Session {} read failed: {}", session_id, e);
                    break;
                }
            }
        }
        let _ = server_tx.send(ServerMessage::SessionClosed { session_id });
    });
}

fn spawn_session_writer<W>(
    session_id: u32,
    mut writer: W,
    mut outbound_rx: mpsc::UnboundedReceiver<Packet>,
    response_delay: Duration,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(packet) = outbound_rx.recv().await {
            if packet.is_response() && !response_delay.is_zero() {
                sleep(response_delay).await;
            }
            if let Err(e) = write_packet(&mut writer, &packet).await {
                error!("Failed to send to session {}: {}", session_id, e);
                break;
            }
        }
    });
}
