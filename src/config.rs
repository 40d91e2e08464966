// Defaults for the serial link, the bridge server and the direct driver
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// Serial port of the motor controller (must match the firmware baudrate)
pub const SERIAL_PORT: &str = "/dev/ttyUSB0";
pub const BAUDRATE: u32 = 9600;

// Opening the port resets the controller, give it time to boot
pub const RESET_DELAY: Duration = Duration::from_secs(2);

// Firmware cuts motor power if the watchdog bit does not toggle within ~500ms
pub const WATCHDOG_INTERVAL: Duration = Duration::from_millis(200);
pub const FIRMWARE_WATCHDOG_TIMEOUT: Duration = Duration::from_millis(500);

// Bridge: how often the last commanded motor state is re-sent
pub const MOTOR_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

// Bridge network endpoint (all interfaces)
pub const DEFAULT_PORT: u16 = 3000;

// Speed scale (0-100) used by F/B/L/R before any S<n> arrives
pub const DEFAULT_SPEED: i32 = 80;

// Delay between signalling loops to stop and forcing the motors to zero
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(300);

// Direct driver timing (firmware needs time to process each command)
pub const WHEEL_GAP: Duration = Duration::from_millis(10);
pub const COMMAND_SETTLE: Duration = Duration::from_millis(120);
pub const DRIVE_REASSERT_INTERVAL: Duration = Duration::from_millis(100);
pub const STOP_REPEATS: usize = 3;

// Remote client
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

// Largest network command payload read per connection
pub const MAX_COMMAND_LEN: u64 = 1024;

/// Bridge server configuration
///
/// Every field has a default, so a JSON file only needs the values it changes:
///
/// ```json
/// { "serial_port": "/dev/ttyACM0", "refresh_interval_ms": 50 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub listen: SocketAddr,
    pub serial_port: String,
    pub baudrate: u32,
    pub watchdog_interval_ms: u64,
    pub refresh_interval_ms: u64,
    pub default_speed: i32,
    pub reset_delay_ms: u64,
    pub shutdown_grace_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            serial_port: SERIAL_PORT.to_string(),
            baudrate: BAUDRATE,
            watchdog_interval_ms: WATCHDOG_INTERVAL.as_millis() as u64,
            refresh_interval_ms: MOTOR_REFRESH_INTERVAL.as_millis() as u64,
            default_speed: DEFAULT_SPEED,
            reset_delay_ms: RESET_DELAY.as_millis() as u64,
            shutdown_grace_ms: SHUTDOWN_GRACE.as_millis() as u64,
        }
    }
}

impl BridgeConfig {
    /// Load a JSON config file, missing fields fall back to defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_watchdog_interval(self.watchdog_interval_ms)?;
        if self.refresh_interval_ms == 0 {
            return Err(Error::Config("refresh_interval_ms must be non-zero".to_string()));
        }
        if !(0..=100).contains(&self.default_speed) {
            return Err(Error::Config(format!(
                "default_speed {} outside 0..=100",
                self.default_speed
            )));
        }
        Ok(())
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Direct serial driver configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    pub serial_port: String,
    pub baudrate: u32,
    pub watchdog_interval_ms: u64,
    pub auto_watchdog: bool,
    pub reset_delay_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            serial_port: SERIAL_PORT.to_string(),
            baudrate: BAUDRATE,
            watchdog_interval_ms: WATCHDOG_INTERVAL.as_millis() as u64,
            auto_watchdog: true,
            reset_delay_ms: RESET_DELAY.as_millis() as u64,
        }
    }
}

impl DriverConfig {
    pub fn new(serial_port: impl Into<String>) -> Self {
        Self {
            serial_port: serial_port.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_watchdog_interval(self.watchdog_interval_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}

// The bit has to toggle before the firmware gives up on us
fn validate_watchdog_interval(interval_ms: u64) -> Result<()> {
    let limit = FIRMWARE_WATCHDOG_TIMEOUT.as_millis() as u64;
    if interval_ms == 0 || interval_ms >= limit {
        return Err(Error::Config(format!(
            "watchdog_interval_ms {} must be between 1 and {}",
            interval_ms,
            limit - 1
        )));
    }
    Ok(())
}
