// Remote client for the bridge server
// Every call opens a fresh connection, writes one command and closes it.
// Nothing is read back and nothing is retried.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::bridge::Command;
use crate::config::CONNECT_TIMEOUT;
use crate::error::{Error, Result};
use crate::serial::ServoId;

#[derive(Debug, Clone)]
pub struct RemoteClient {
    addr: String,
    connect_timeout: Duration,
}

impl RemoteClient {
    /// `addr` is "host:port", e.g. "192.168.178.22:3000"
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Drive with normalized wheel speeds (-1.0 ..= 1.0)
    ///
    /// The bridge only knows forward/backward/turn-in-place, so unequal speeds
    /// become a turn towards the slower wheel.
    pub async fn set_wheel_speeds(&self, left: f32, right: f32) -> Result<()> {
        self.send(wheel_command(left, right)).await
    }

    /// Set the speed scale used by subsequent motion commands (0 ..= 100)
    pub async fn set_speed(&self, percent: i32) -> Result<()> {
        self.send(Command::SetSpeed(percent.clamp(0, 100))).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    pub async fn set_servo(&self, id: u8, value: i32) -> Result<()> {
        let id = ServoId::new(id)?;
        self.send(Command::Servo { id, value }).await
    }

    pub async fn servo_1(&self, value: i32) -> Result<()> {
        self.set_servo(1, value).await
    }

    pub async fn servo_2(&self, value: i32) -> Result<()> {
        self.set_servo(2, value).await
    }

    pub async fn servo_3(&self, value: i32) -> Result<()> {
        self.set_servo(3, value).await
    }

    pub async fn servo_4(&self, value: i32) -> Result<()> {
        self.set_servo(4, value).await
    }

    /// Send one command over its own connection
    pub async fn send(&self, cmd: Command) -> Result<()> {
        let payload = cmd.to_string();
        let comm_err = |source| Error::Communication {
            addr: self.addr.clone(),
            source,
        };

        let mut stream = timeout(self.connect_timeout, TcpStream::connect(self.addr.as_str()))
            .await
            .map_err(|_| Error::ConnectTimeout {
                addr: self.addr.clone(),
                timeout: self.connect_timeout,
            })?
            .map_err(comm_err)?;

        stream.write_all(payload.as_bytes()).await.map_err(comm_err)?;
        stream.shutdown().await.map_err(comm_err)?;
        debug!("Sent {:?} to {}", payload, self.addr);
        Ok(())
    }
}

/// Convert -1.0 ..= 1.0 to -100 ..= 100, truncating toward zero
fn speed_to_percent(speed: f32) -> i32 {
    if speed.is_nan() {
        return 0;
    }
    (speed.clamp(-1.0, 1.0) * 100.0) as i32
}

/// Map two wheel speeds onto the coarse bridge grammar
pub fn wheel_command(left: f32, right: f32) -> Command {
    let l = speed_to_percent(left);
    let r = speed_to_percent(right);

    if l == r {
        match l {
            l if l > 0 => Command::Forward,
            l if l < 0 => Command::Backward,
            _ => Command::Stop,
        }
    } else if l < r {
        Command::Left
    } else {
        Command::Right
    }
}
