use rcon_shared::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("transport error: {0}")]
    Frame(#[from] FrameError),
    #[error("connection is closed")]
    Closed,
    #[error("'{command}' expired without a response")]
    Expired { command: String },
}
