// Direct serial driver
//
// Same motion and servo semantics as the bridge without the network hop. Runs its
// own watchdog task; motion is only reasserted while the caller keeps sending
// (see `drive_for`).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{
    DriverConfig, COMMAND_SETTLE, DRIVE_REASSERT_INTERVAL, STOP_REPEATS, WHEEL_GAP,
};
use crate::error::Result;
use crate::serial::protocol::{encode_motor, encode_servo, speed_to_wire_bipolar, Side, WIRE_STOP};
use crate::serial::{watchdog, SerialLink};

pub struct DirectDriver {
    link: Arc<SerialLink>,
    config: DriverConfig,
    watchdog_cancel: CancellationToken,
    watchdog: Option<JoinHandle<()>>,
}

impl DirectDriver {
    /// Open the serial port and wait for the controller to reset
    pub async fn open(config: DriverConfig) -> Result<Self> {
        config.validate()?;
        let link = SerialLink::open(&config.serial_port, config.baudrate)?;
        info!("Waiting {:?} for controller reset", config.reset_delay());
        sleep(config.reset_delay()).await;
        Self::with_link(link, config)
    }

    /// Build a driver on an opened link, starting the watchdog if `auto_watchdog` is set
    ///
    /// Fails with `Error::Config` if the watchdog interval is zero or too slow for the firmware.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_link(link: SerialLink, config: DriverConfig) -> Result<Self> {
        config.validate()?;
        let mut driver = Self {
            link: Arc::new(link),
            config,
            watchdog_cancel: CancellationToken::new(),
            watchdog: None,
        };
        if driver.config.auto_watchdog {
            driver.start_watchdog();
        }
        Ok(driver)
    }

    /// Start the watchdog task (no-op if already running)
    pub fn start_watchdog(&mut self) {
        if self.watchdog.is_some() {
            return;
        }
        self.watchdog = Some(watchdog::spawn(
            Arc::clone(&self.link),
            self.config.watchdog_interval(),
            self.watchdog_cancel.clone(),
        ));
    }

    pub fn watchdog_running(&self) -> bool {
        self.watchdog.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Left motor, -1.0 (full backward) ..= 1.0 (full forward)
    pub fn set_left_speed(&self, speed: f32) -> Result<()> {
        self.link
            .send(&encode_motor(Side::Left, speed_to_wire_bipolar(speed)))
    }

    /// Right motor, -1.0 (full backward) ..= 1.0 (full forward)
    pub fn set_right_speed(&self, speed: f32) -> Result<()> {
        self.link
            .send(&encode_motor(Side::Right, speed_to_wire_bipolar(speed)))
    }

    /// Set both wheels, giving the firmware time to process each command
    pub async fn set_wheel_speeds(&self, left: f32, right: f32) -> Result<()> {
        debug!("Setting wheel speeds: left={}, right={}", left, right);
        self.set_left_speed(left)?;
        sleep(WHEEL_GAP).await;
        self.set_right_speed(right)?;
        sleep(COMMAND_SETTLE).await;
        Ok(())
    }

    /// Keep reasserting the wheel speeds until `duration` has passed
    ///
    /// The motors are left running afterwards; call `stop` to halt them.
    pub async fn drive_for(&self, left: f32, right: f32, duration: Duration) -> Result<()> {
        let end = Instant::now() + duration;
        while Instant::now() < end {
            self.set_wheel_speeds(left, right).await?;
            sleep(DRIVE_REASSERT_INTERVAL).await;
        }
        Ok(())
    }

    /// Send zero speed several times so a single dropped frame cannot keep the vehicle moving
    ///
    /// Every repeat is attempted; the first error is returned afterwards.
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping motors");
        let mut result = Ok(());
        for _ in 0..STOP_REPEATS {
            if let Err(e) = self.set_wheel_speeds(0.0, 0.0).await {
                warn!("Stop write failed: {}", e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
            sleep(COMMAND_SETTLE).await;
        }
        result
    }

    /// Set a servo target, `id` must be 1..=4
    pub async fn set_servo(&self, id: u8, value: i32) -> Result<()> {
        let frame = encode_servo(id, value)?;
        self.link.send(&frame)?;
        sleep(COMMAND_SETTLE).await;
        Ok(())
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

    /// Stop the motors, then the watchdog, then close the serial link
    ///
    /// The watchdog keeps toggling during the stop sequence so the firmware
    /// accepts the final zero-speed frames.
    pub async fn close(mut self) -> Result<()> {
        info!("Closing driver on {}", self.link.name());
        let stopped = self.stop().await;

        self.watchdog_cancel.cancel();
        if let Some(handle) = self.watchdog.take() {
            if let Err(e) = handle.await {
                warn!("Watchdog task ended abnormally: {}", e);
            }
        }

        self.link.close();
        stopped
    }
}

impl Drop for DirectDriver {
    fn drop(&mut self) {
        self.watchdog_cancel.cancel();
        if self.link.is_closed() {
            return;
        }

        // Dropped without close(): one best-effort stop, then let go of the port
        let stop = [
            encode_motor(Side::Left, WIRE_STOP),
            encode_motor(Side::Right, WIRE_STOP),
        ];
        if let Err(e) = self.link.send_all(&stop) {
            warn!("Failed to stop motors on drop: {}", e);
        }
        self.link.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::serial::link::testing::Recorder;

    fn make_driver(auto_watchdog: bool) -> (DirectDriver, Recorder) {
        let recorder = Recorder::new();
        let link = SerialLink::from_writer("mock", recorder.clone());
        let config = DriverConfig {
            auto_watchdog,
            reset_delay_ms: 0,
            ..DriverConfig::default()
        };
        (DirectDriver::with_link(link, config).unwrap(), recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_watchdog_interval_is_rejected() {
        for ms in [0, 500] {
            let recorder = Recorder::new();
            let link = SerialLink::from_writer("mock", recorder.clone());
            let config = DriverConfig {
                watchdog_interval_ms: ms,
                reset_delay_ms: 0,
                ..DriverConfig::default()
            };
            assert!(matches!(
                DirectDriver::with_link(link, config),
                Err(Error::Config(_))
            ));
            assert!(recorder.frames().is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_validates_before_touching_the_port() {
        let config = DriverConfig {
            serial_port: "/dev/does-not-exist".to_string(),
            watchdog_interval_ms: 0,
            reset_delay_ms: 0,
            ..DriverConfig::default()
        };
        assert!(matches!(
            DirectDriver::open(config).await,
            Err(Error::Config(_))
        ));
    }

    fn motor_frames(recorder: &Recorder) -> Vec<String> {
        recorder.frames_matching(":M")
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_wheel_writes_immediately() {
        let (driver, recorder) = make_driver(false);
        driver.set_left_speed(1.0).unwrap();
        driver.set_right_speed(-1.0).unwrap();
        driver.set_left_speed(0.02).unwrap();
        assert_eq!(recorder.frames(), vec![":ML=310!", ":MR=0!", ":ML=155!"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wheel_speeds_settle() {
        let (driver, recorder) = make_driver(false);
        let start = Instant::now();
        driver.set_wheel_speeds(0.5, -0.5).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= WHEEL_GAP + COMMAND_SETTLE);
        assert!(elapsed < Duration::from_millis(140));
        assert_eq!(recorder.frames(), vec![":ML=233!", ":MR=78!"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_for_reasserts() {
        let (driver, recorder) = make_driver(false);
        driver
            .drive_for(1.0, 1.0, Duration::from_secs(1))
            .await
            .unwrap();
        // One pass takes 10 + 120 + 100 ms: passes start at 0, 230, 460, 690, 920
        let frames = motor_frames(&recorder);
        assert_eq!(frames.len(), 10);
        assert!(frames.iter().all(|f| f == ":ML=310!" || f == ":MR=310!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_sends_three_zero_pairs() {
        let (driver, recorder) = make_driver(false);
        driver.set_wheel_speeds(1.0, 1.0).await.unwrap();
        recorder.clear();

        for _ in 0..2 {
            driver.stop().await.unwrap();
            let frames = motor_frames(&recorder);
            assert_eq!(frames.len(), 6);
            assert!(frames.chunks(2).all(|pair| pair == [":ML=155!", ":MR=155!"]));
            recorder.clear();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_servo_writes_nothing() {
        let (driver, recorder) = make_driver(false);
        assert!(matches!(
            driver.set_servo(5, 100).await,
            Err(Error::InvalidServo(5))
        ));
        assert!(recorder.frames().is_empty());

        driver.servo_1(130).await.unwrap();
        driver.servo_4(160).await.unwrap();
        assert_eq!(recorder.frames(), vec![":S1=130!", ":S4=160!"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_watchdog() {
        let (driver, recorder) = make_driver(true);
        assert!(driver.watchdog_running());
        sleep(Duration::from_millis(500)).await;
        assert_eq!(
            recorder.frames_matching(":WD="),
            vec![":WD=1!", ":WD=0!", ":WD=1!"]
        );

        let (mut quiet, quiet_recorder) = make_driver(false);
        assert!(!quiet.watchdog_running());
        sleep(Duration::from_millis(500)).await;
        assert!(quiet_recorder.frames().is_empty());
        quiet.start_watchdog();
        assert!(quiet.watchdog_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_leaves_vehicle_stopped() {
        let (driver, recorder) = make_driver(true);
        driver.set_wheel_speeds(1.0, -1.0).await.unwrap();
        driver.close().await.unwrap();

        let motors = motor_frames(&recorder);
        let n = motors.len();
        assert!(motors[n - 6..]
            .chunks(2)
            .all(|pair| pair == [":ML=155!", ":MR=155!"]));

        // Link closed and watchdog gone: the wire stays silent
        let total = recorder.frames().len();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(recorder.frames().len(), total);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_sends_stop() {
        let (driver, recorder) = make_driver(true);
        driver.set_left_speed(0.8).unwrap();
        drop(driver);

        let frames = recorder.frames();
        assert_eq!(&frames[frames.len() - 2..], [":ML=155!", ":MR=155!"]);
        let total = frames.len();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(recorder.frames().len(), total);
    }
}
