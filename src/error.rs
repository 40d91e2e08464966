// Error types for the bridge, the direct driver and the remote client

use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid servo id {0}: must be between 1 and 4")]
    InvalidServo(u8),

    #[error("Failed to open serial port {path}: {source}")]
    OpenPort {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Communication error with {addr}: {source}")]
    Communication {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {timeout:?} connecting to {addr}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("Serial link {0} is closed")]
    LinkClosed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
