use std::time::Duration;

use crate::variant::ProtocolVariant;

/// Connection settings. Binaries fill this from command line flags.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// `host:port` of the game server's RCON port
    pub address: String,
    pub variant: ProtocolVariant,
    /// How long a single request may wait for its response before the
    /// queue behind it is released
    pub request_timeout: Duration,
    /// Default deadline for deferred actions
    pub action_timeout: Duration,
    /// Liveness threshold for traffic in either direction
    pub stale_after: Duration,
    /// How often deadlines and liveness are checked
    pub poke_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:47200".to_string(),
            variant: ProtocolVariant::default(),
            request_timeout: Duration::from_secs(30),
            action_timeout: Duration::from_secs(15),
            stale_after: Duration::from_secs(120),
            poke_interval: Duration::from_secs(1),
        }
    }
}

impl ConnectionConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_variant(mut self, variant: ProtocolVariant) -> Self {
        self.variant = variant;
        self
    }
}
