// Network bridge for the two-motor vehicle
//
// Provides:
// - The short text command grammar (S<n>, F, B, L, R, S, :S<id>=<v>!)
// - Shared motion state
// - The TCP server that owns the serial link and its background tasks

pub mod command;
mod server;
pub mod state;

pub use command::{Command, MalformedCommand};
pub use server::BridgeServer;
pub use state::MotionState;
