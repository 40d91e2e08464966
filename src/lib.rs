// Network-to-serial command bridge for a two-motor, four-servo vehicle
//
// - bridge: TCP server translating short text commands into serial frames
// - client: remote side of the bridge
// - driver: direct serial control without the network hop
// - serial: wire codec, shared serial link and the watchdog task

pub mod bridge;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod serial;

pub use bridge::{BridgeServer, Command};
pub use client::RemoteClient;
pub use config::{BridgeConfig, DriverConfig};
pub use driver::DirectDriver;
pub use error::{Error, Result};
