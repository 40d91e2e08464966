// Watchdog liveness signal
// The firmware stops the motors when the WD bit has not toggled for ~500ms, so if this
// process hangs or dies the vehicle stops on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::link::SerialLink;
use super::protocol::encode_watchdog;

/// Alternating watchdog bit, first value sent is 1
#[derive(Debug, Default, Clone, Copy)]
pub struct WatchdogBit(bool);

impl WatchdogBit {
    pub fn toggle(&mut self) -> bool {
        self.0 = !self.0;
        self.0
    }
}

/// Spawn the watchdog task, it runs until `cancel` fires
///
/// A failed write is logged and retried on the next tick.
pub fn spawn(link: Arc<SerialLink>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut bit = WatchdogBit::default();
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("Watchdog started on {} ({}ms)", link.name(), period.as_millis());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    let value = bit.toggle();
                    match link.send(&encode_watchdog(value)) {
                        Ok(()) => trace!("Watchdog tick: {}", u8::from(value)),
                        Err(e) => warn!("Watchdog write failed: {}", e),
                    }
                }
            }
        }

        debug!("Watchdog stopped on {}", link.name());
    })
}

#[cfg(test)]
mod tests {
    use super::super::link::testing::Recorder;
    use super::*;

    #[test]
    fn test_bit_alternates() {
        let mut bit = WatchdogBit::default();
        let values: Vec<bool> = (0..6).map(|_| bit.toggle()).collect();
        assert_eq!(values, vec![true, false, true, false, true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_writes_alternating_frames() {
        let recorder = Recorder::new();
        let link = Arc::new(SerialLink::from_writer("mock", recorder.clone()));
        let cancel = CancellationToken::new();
        let handle = spawn(link, Duration::from_millis(200), cancel.clone());

        // Ticks at 0, 200, 400, 600, 800ms
        tokio::time::sleep(Duration::from_millis(900)).await;
        cancel.cancel();
        handle.await.unwrap();

        let frames = recorder.frames();
        assert_eq!(frames, vec![":WD=1!", ":WD=0!", ":WD=1!", ":WD=0!", ":WD=1!"]);
        for pair in frames.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_survives_write_errors() {
        let recorder = Recorder::new();
        let link = Arc::new(SerialLink::from_writer("mock", recorder.clone()));
        let cancel = CancellationToken::new();

        recorder.set_failing(true);
        let handle = spawn(link, Duration::from_millis(200), cancel.clone());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!handle.is_finished());

        recorder.set_failing(false);
        tokio::time::sleep(Duration::from_millis(400)).await;
        cancel.cancel();
        handle.await.unwrap();

        // Failed ticks still flipped the bit
        assert!(!recorder.frames_matching(":WD=").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_stops_on_cancel() {
        let recorder = Recorder::new();
        let link = Arc::new(SerialLink::from_writer("mock", recorder.clone()));
        let cancel = CancellationToken::new();
        let handle = spawn(link, Duration::from_millis(200), cancel.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();
        let count = recorder.frames().len();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(recorder.frames().len(), count);
    }
}
