//! Async connection actor
//!
//! A connection runs as three tokio tasks:
//!
//! - the reader decodes frames off the transport and forwards them
//! - the writer encodes whatever the engine put in its outbox
//! - the actor owns the [`ProtocolEngine`] and serializes everything that
//!   touches it: inbound packets, handle commands and the poke ticker
//!
//! [`ConnectionHandle`] is the cheap, cloneable front door. Submitting never
//! waits for completion; [`ConnectionHandle::execute`] and
//! [`ConnectionHandle::request`] bridge the completion callbacks to a oneshot
//! channel for callers that want to await the outcome.

use log::{debug, error, info, warn};
use rcon_shared::{read_packet, write_packet, Packet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::action::NetworkAction;
use crate::config::ConnectionConfig;
use crate::coordinator::{ActionId, ActionState, DeferredAction};
use crate::engine::ProtocolEngine;
use crate::error::ConnectionError;
use crate::events::{ConnectionEvent, ConnectionState};
use crate::router::Router;
use crate::transport::Transport;

/// Requests from handles to the actor
enum Command {
    Send {
        packet: Packet,
        reply: oneshot::Sender<Packet>,
    },
    Action {
        action: NetworkAction,
        reply: oneshot::Sender<Vec<Packet>>,
    },
    Deferred {
        deferred: DeferredAction,
        reply: Option<oneshot::Sender<ActionId>>,
    },
    Subscribe(mpsc::UnboundedSender<ConnectionEvent>),
    State(oneshot::Sender<ConnectionState>),
    Shutdown,
}

/// Messages from the reader and writer tasks to the actor
#[derive(Debug)]
enum TransportMessage {
    PacketReceived(Packet),
    SocketException(String),
    Closed,
}

/// Final result of an awaited action
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub state: ActionState,
    pub requests: Vec<Packet>,
    pub responses: Vec<Packet>,
}

impl ActionOutcome {
    pub fn is_done(&self) -> bool {
        self.state == ActionState::Done
    }
}

/// Builds and starts connections
pub struct Connector {
    config: ConnectionConfig,
    router: Router,
    subscribers: Vec<mpsc::UnboundedSender<ConnectionEvent>>,
}

impl Connector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            router: Router::default(),
            subscribers: Vec::new(),
        }
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Subscribes before the first state change, so the receiver sees
    /// `Connecting` onwards
    pub fn subscriber(mut self, sender: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        self.subscribers.push(sender);
        self
    }

    fn engine(self) -> (ConnectionConfig, ProtocolEngine) {
        let mut engine = ProtocolEngine::new(&self.config, self.router);
        for sender in self.subscribers {
            engine.subscribe(sender);
        }
        (self.config, engine)
    }

    /// Opens a TCP connection to the configured address
    pub async fn connect(self) -> Result<ConnectionHandle, ConnectionError> {
        let (config, mut engine) = self.engine();
        engine.set_state(ConnectionState::Connecting);
        info!("Connecting to {} ({})", config.address, config.variant);

        match TcpStream::connect(&config.address).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Could not disable Nagle on {}: {}", config.address, e);
                }
                Ok(start(config, engine, stream))
            }
            Err(source) => {
                engine.connection_lost(format!("connect to {} failed: {}", config.address, source));
                Err(ConnectionError::Connect {
                    address: config.address,
                    source,
                })
            }
        }
    }

    /// Runs a connection over an already established transport
    pub fn spawn<T: Transport>(self, transport: T) -> ConnectionHandle {
        let (config, mut engine) = self.engine();
        engine.set_state(ConnectionState::Connecting);
        start(config, engine, transport)
    }
}

fn start<T: Transport>(config: ConnectionConfig, mut engine: ProtocolEngine, transport: T) -> ConnectionHandle {
    let (reader, writer) = transport.into_split();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    engine.set_state(ConnectionState::Connected);

    let reader = spawn_reader(reader, transport_tx.clone());
    spawn_writer(writer, outbound_rx, transport_tx);

    let actor = Actor {
        engine,
        reader,
        outbound: outbound_tx,
        poke_interval: config.poke_interval,
    };
    tokio::spawn(actor.run(command_rx, transport_rx));

    ConnectionHandle { commands: command_tx }
}

fn spawn_reader<R>(mut reader: R, transport_tx: mpsc::UnboundedSender<TransportMessage>) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let message = match read_packet(&mut reader).await {
                Ok(Some(packet)) => TransportMessage::PacketReceived(packet),
                Ok(None) => {
                    let _ = transport_tx.send(TransportMessage::Closed);
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping malformed frame: {}", e);
                    continue;
                }
                Err(e) => {
                    error!("Error reading from server: {}", e);
                    let _ = transport_tx.send(TransportMessage::SocketException(e.to_string()));
                    break;
                }
            };

            if transport_tx.send(message).is_err() {
                debug!("Connection actor gone, reader stopping");
                break;
            }
        }
    })
}

fn spawn_writer<W>(
    mut writer: W,
    mut outbound_rx: mpsc::UnboundedReceiver<Packet>,
    transport_tx: mpsc::UnboundedSender<TransportMessage>,
) where
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(packet) = outbound_rx.recv().await {
            if let Err(e) = write_packet(&mut writer, &packet).await {
                error!("Failed to send {}: {}", packet, e);
                let _ = transport_tx.send(TransportMessage::SocketException(e.to_string()));
                break;
            }
        }
        // Dropping the write half shuts the stream down
    });
}

struct Actor {
    engine: ProtocolEngine,
    /// Aborted on exit; a silent peer would otherwise keep it parked forever
    reader: JoinHandle<()>,
    outbound: mpsc::UnboundedSender<Packet>,
    poke_interval: Duration,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut transport: mpsc::UnboundedReceiver<TransportMessage>,
    ) {
        let mut ticker = interval(self.poke_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let running = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        self.engine.teardown("every connection handle was dropped");
                        false
                    }
                },
                message = transport.recv() => match message {
                    Some(message) => self.handle_transport(message),
                    None => {
                        self.engine.connection_lost("transport tasks stopped");
                        false
                    }
                },
                _ = ticker.tick() => {
                    self.engine.tick(Instant::now());
                    self.engine.state() != ConnectionState::Disconnected
                }
            };

            self.flush();
            if !running {
                break;
            }
        }

        self.reader.abort();
        reject_queued(&mut commands);
        info!("Connection actor stopped");
    }

    fn flush(&mut self) {
        for packet in self.engine.drain_outbound() {
            if self.outbound.send(packet).is_err() {
                debug!("Writer gone, dropping outbound packets");
                break;
            }
        }
    }

    fn handle_command(&mut self, command: Command) -> bool {
        let now = Instant::now();
        match command {
            Command::Send { packet, reply } => {
                let _ = reply.send(self.engine.send(packet, now));
            }
            Command::Action { action, reply } => {
                let _ = reply.send(self.engine.action(&action, now));
            }
            Command::Deferred { deferred, reply } => {
                let id = self.engine.action_deferred(deferred, now);
                if let Some(reply) = reply {
                    let _ = reply.send(id);
                }
            }
            Command::Subscribe(sender) => self.engine.subscribe(sender),
            Command::State(reply) => {
                let _ = reply.send(self.engine.state());
            }
            Command::Shutdown => {
                self.engine.teardown("shutdown requested");
                return false;
            }
        }
        true
    }

    fn handle_transport(&mut self, message: TransportMessage) -> bool {
        match message {
            TransportMessage::PacketReceived(packet) => {
                self.engine.receive(packet, Instant::now());
                self.engine.state() != ConnectionState::Disconnected
            }
            TransportMessage::SocketException(message) => {
                self.engine.transport_failed(message);
                false
            }
            TransportMessage::Closed => {
                self.engine.connection_lost("server closed the connection");
                false
            }
        }
    }
}

/// Refuses whatever handles submitted after the actor stopped. Tracked
/// actions expire so their `always` callback still runs; dropping the other
/// replies resolves their callers with [`ConnectionError::Closed`].
fn reject_queued(commands: &mut mpsc::UnboundedReceiver<Command>) {
    commands.close();
    while let Ok(command) = commands.try_recv() {
        if let Command::Deferred { deferred, .. } = command {
            debug!("Expiring action submitted after shutdown: {:?}", deferred.action());
            deferred.abandon();
        }
    }
}

/// Cloneable handle to a running connection
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl ConnectionHandle {
    fn submit(&self, command: Command) -> Result<(), ConnectionError> {
        self.commands.send(command).map_err(|_| ConnectionError::Closed)
    }

    /// Sends one packet. Resolves with the packet as numbered once it has
    /// been transmitted or queued, not when it is answered.
    pub async fn send(&self, packet: Packet) -> Result<Packet, ConnectionError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Send { packet, reply })?;
        rx.await.map_err(|_| ConnectionError::Closed)
    }

    /// Translates and sends an action without tracking its completion
    pub async fn action(&self, action: NetworkAction) -> Result<Vec<Packet>, ConnectionError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Action { action, reply })?;
        rx.await.map_err(|_| ConnectionError::Closed)
    }

    /// Hands a tracked action to the connection and returns immediately
    pub fn action_deferred(&self, deferred: DeferredAction) -> Result<(), ConnectionError> {
        self.submit(Command::Deferred {
            deferred,
            reply: None,
        })
    }

    /// Like [`action_deferred`](Self::action_deferred), but resolves with the
    /// id the action was registered under
    pub async fn track(&self, deferred: DeferredAction) -> Result<ActionId, ConnectionError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Deferred {
            deferred,
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| ConnectionError::Closed)
    }

    /// Runs an action to completion or expiry and resolves with the outcome
    pub async fn execute(
        &self,
        action: NetworkAction,
        timeout: Option<Duration>,
    ) -> Result<ActionOutcome, ConnectionError> {
        self.execute_deferred(DeferredAction::new(action), timeout).await
    }

    async fn execute_deferred(
        &self,
        deferred: DeferredAction,
        timeout: Option<Duration>,
    ) -> Result<ActionOutcome, ConnectionError> {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let expired_slot = Arc::clone(&slot);

        let mut deferred = deferred
            .on_done(move |_, requests, responses| {
                resolve(&slot, ActionState::Done, requests, responses)
            })
            .on_expired(move |_, requests, responses| {
                resolve(&expired_slot, ActionState::Expired, requests, responses)
            });
        if let Some(timeout) = timeout {
            deferred = deferred.timeout(timeout);
        }

        self.action_deferred(deferred)?;
        rx.await.map_err(|_| ConnectionError::Closed)
    }

    /// Sends one request and resolves with its response
    pub async fn request<S: Into<String>>(
        &self,
        words: impl IntoIterator<Item = S>,
    ) -> Result<Packet, ConnectionError> {
        let packet = Packet::request(words);
        let command = packet.command().unwrap_or_default().to_string();
        let line = rcon_shared::join(&packet.words);
        let deferred = DeferredAction::new(NetworkAction::raw(line)).with_packets(vec![packet]);

        let outcome = self.execute_deferred(deferred, None).await?;
        outcome
            .responses
            .into_iter()
            .next()
            .ok_or(ConnectionError::Expired { command })
    }

    /// Logs in with a plain text password. Resolves true when the server
    /// accepted it.
    pub async fn login(&self, password: &str) -> Result<bool, ConnectionError> {
        let response = self.request(["login.plainText", password]).await?;
        if !response.is_ok() {
            warn!("Login rejected: {}", response);
        }
        Ok(response.is_ok())
    }

    pub fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<ConnectionEvent>, ConnectionError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.submit(Command::Subscribe(tx))?;
        Ok(rx)
    }

    pub async fn state(&self) -> Result<ConnectionState, ConnectionError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::State(reply))?;
        rx.await.map_err(|_| ConnectionError::Closed)
    }

    /// Tears the connection down. In-flight actions expire.
    pub fn shutdown(&self) -> Result<(), ConnectionError> {
        self.submit(Command::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

type OutcomeSlot = Arc<Mutex<Option<oneshot::Sender<ActionOutcome>>>>;

fn resolve(slot: &OutcomeSlot, state: ActionState, requests: &[Packet], responses: &[Packet]) {
    let sender = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(_) => return,
    };
    if let Some(sender) = sender {
        let _ = sender.send(ActionOutcome {
            state,
            requests: requests.to_vec(),
            responses: responses.to_vec(),
        });
    }
}
