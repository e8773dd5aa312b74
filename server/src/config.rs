use rcon_shared::BanLayout;
use std::time::Duration;

/// Mock server settings. The binary fills this from command line flags.
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Address to listen on; port 0 picks a free one
    pub address: String,
    /// Password `login.plainText` must present
    pub password: String,
    /// Delay before each response is written
    pub response_delay: Duration,
    /// Probability in `[0, 1]` that a response is silently dropped
    pub drop_rate: f64,
    /// Seed for the drop decision; entropy when unset
    pub seed: Option<u64>,
    /// Sessions idle for longer than this are closed
    pub idle_timeout: Duration,
    pub max_sessions: usize,
    pub ban_layout: BanLayout,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:47200".to_string(),
            password: "secret".to_string(),
            response_delay: Duration::ZERO,
            drop_rate: 0.0,
            seed: None,
            idle_timeout: Duration::from_secs(300),
            max_sessions: 16,
            ban_layout: BanLayout::SixWord,
        }
    }
}

impl MockServerConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}
