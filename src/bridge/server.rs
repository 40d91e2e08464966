// TCP -> serial bridge
// Note: three things write to the serial link
// - the watchdog task toggles WD every 200ms no matter what
// - the refresh task re-sends the commanded motor state every 100ms, changed or not
// - the connection handler writes servo commands (re-encoded) directly
// The motors keep repeating the last command while the network is silent; the firmware
// only stops them once the watchdog goes quiet.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::command::Command;
use super::state::{MotionState, SharedMotion};
use crate::config::{BridgeConfig, MAX_COMMAND_LEN};
use crate::error::{Error, Result};
use crate::serial::protocol::{encode_motor, speed_to_wire_percent, Side};
use crate::serial::{watchdog, SerialLink};

pub struct BridgeServer {
    config: BridgeConfig,
    link: Arc<SerialLink>,
    motion: Arc<SharedMotion>,
    listener: TcpListener,
    local_addr: SocketAddr,
    // Stops the accept loop and the refresh task
    shutdown: CancellationToken,
    // Cancelled last, after the final stop frames are written
    watchdog_cancel: CancellationToken,
    watchdog: Option<JoinHandle<()>>,
    refresh: Option<JoinHandle<()>>,
}

impl BridgeServer {
    /// Open the serial port, wait for the controller to reset, then start serving
    pub async fn bind(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let link = SerialLink::open(&config.serial_port, config.baudrate)?;

        info!("Waiting {:?} for controller reset", config.reset_delay());
        sleep(config.reset_delay()).await;

        Self::start(link, config).await
    }

    /// Start the bridge on an already opened link
    ///
    /// The listen socket is bound before any background task is spawned.
    pub async fn start(link: SerialLink, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|source| Error::Bind {
                addr: config.listen,
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let link = Arc::new(link);
        let motion = Arc::new(SharedMotion::new(MotionState::new(config.default_speed)));
        let shutdown = CancellationToken::new();
        let watchdog_cancel = CancellationToken::new();

        let watchdog = watchdog::spawn(
            Arc::clone(&link),
            config.watchdog_interval(),
            watchdog_cancel.clone(),
        );
        let refresh = spawn_refresh(
            Arc::clone(&link),
            Arc::clone(&motion),
            config.refresh_interval(),
            shutdown.clone(),
        );

        info!(
            "Bridge started on {}: {}ms watchdog, {}ms motor refresh, serial {}",
            local_addr,
            config.watchdog_interval_ms,
            config.refresh_interval_ms,
            link.name()
        );

        Ok(Self {
            config,
            link,
            motion,
            listener,
            local_addr,
            shutdown,
            watchdog_cancel,
            watchdog: Some(watchdog),
            refresh: Some(refresh),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn motion(&self) -> MotionState {
        self.motion.snapshot()
    }

    /// Token that stops `serve` and the refresh task; `close` must still be called
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept loop: one connection at a time, one command per connection
    ///
    /// There is no read timeout, a client that keeps its connection open holds up
    /// the next command.
    pub async fn serve(&self) {
        info!("Accepting commands on {}", self.local_addr);
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => self.handle_connection(stream, peer).await,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    sleep(Duration::from_millis(10)).await;
                }
            }
        }
        debug!("Accept loop stopped");
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let mut payload = Vec::new();
        if let Err(e) = stream.take(MAX_COMMAND_LEN).read_to_end(&mut payload).await {
            warn!("Failed to read command from {}: {}", peer, e);
            return;
        }

        match std::str::from_utf8(&payload) {
            Ok(text) => {
                trace!("{} -> {:?}", peer, text);
                self.handle_command(text);
            }
            Err(_) => debug!("Ignoring non-UTF-8 payload from {}", peer),
        }
    }

    /// Parse and execute one network command, returns what was executed
    pub fn handle_command(&self, raw: &str) -> Option<Command> {
        let cmd = match raw.parse::<Command>() {
            Ok(cmd) => cmd,
            Err(e) => {
                debug!("Ignoring command: {}", e);
                return None;
            }
        };

        match cmd {
            Command::Servo { .. } => {
                if let Err(e) = self.link.send(&cmd.to_string()) {
                    warn!("Servo command failed: {}", e);
                }
            }
            _ => {
                self.motion.apply(cmd);
            }
        }
        Some(cmd)
    }

    /// Stop the bridge and leave the vehicle stopped
    ///
    /// Order: stop accepting and refreshing, wait the grace delay, zero the state and
    /// write explicit stop frames, stop the watchdog, close the serial link and socket.
    /// Returns the error of the stop write if it failed.
    pub async fn close(mut self) -> Result<()> {
        info!("Shutting down bridge...");
        self.shutdown.cancel();
        if let Some(refresh) = self.refresh.take() {
            if let Err(e) = refresh.await {
                warn!("Refresh task ended abnormally: {}", e);
            }
        }

        sleep(self.config.shutdown_grace()).await;

        let stopped = self.send_stop();

        self.watchdog_cancel.cancel();
        if let Some(watchdog) = self.watchdog.take() {
            if let Err(e) = watchdog.await {
                warn!("Watchdog task ended abnormally: {}", e);
            }
        }

        self.link.close();
        info!("Bridge shutdown complete");
        stopped
    }

    /// Zero the motion state and write one stop pair
    fn send_stop(&self) -> Result<()> {
        self.motion.halt();
        let stopped = self.link.send_all(&motor_frames(MotionState::new(0)));
        if let Err(e) = &stopped {
            warn!("Failed to send final stop: {}", e);
        }
        stopped
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.watchdog_cancel.cancel();
        if self.link.is_closed() {
            return;
        }

        // Dropped without close(): the background tasks must not keep the vehicle moving
        warn!("Bridge dropped without close(), stopping motors");
        let _ = self.send_stop();
        self.link.close();
    }
}

/// Both motor frames for a motion state
fn motor_frames(state: MotionState) -> [String; 2] {
    [
        encode_motor(Side::Left, speed_to_wire_percent(state.left)),
        encode_motor(Side::Right, speed_to_wire_percent(state.right)),
    ]
}

fn spawn_refresh(
    link: Arc<SerialLink>,
    motion: Arc<SharedMotion>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    let frames = motor_frames(motion.snapshot());
                    if let Err(e) = link.send_all(&frames) {
                        warn!("Motor refresh write failed: {}", e);
                    }
                }
            }
        }
        debug!("Motor refresh stopped");
    })
}
