// Shared write side of the serial connection
//
// Every writer (watchdog, motor refresh, command handler, direct driver) goes through
// one lock so two command frames never interleave on the wire.

use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{info, trace};

use crate::error::{Error, Result};

/// Write timeout for the serial port
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

type Port = Box<dyn Write + Send>;

pub struct SerialLink {
    name: String,
    port: Mutex<Option<Port>>,
}

impl SerialLink {
    /// Open the serial device
    pub fn open(path: &str, baudrate: u32) -> Result<Self> {
        info!("Opening serial link {} at {} baud", path, baudrate);
        let port = serialport::new(path, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()
            .map_err(|source| Error::OpenPort {
                path: path.to_string(),
                source,
            })?;

        Ok(Self::from_writer(path, port))
    }

    /// Wrap any byte sink (used for tests and for non-tty transports)
    pub fn from_writer<W: Write + Send + 'static>(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            port: Mutex::new(Some(Box::new(writer))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write one complete command frame
    pub fn send(&self, frame: &str) -> Result<()> {
        let mut port = self.lock();
        let Some(port) = port.as_mut() else {
            return Err(Error::LinkClosed(self.name.clone()));
        };
        port.write_all(frame.as_bytes())?;
        port.flush()?;
        trace!("serial <- {}", frame);
        Ok(())
    }

    /// Write several frames back to back without letting another writer in between
    pub fn send_all(&self, frames: &[String]) -> Result<()> {
        let mut port = self.lock();
        let Some(port) = port.as_mut() else {
            return Err(Error::LinkClosed(self.name.clone()));
        };
        for frame in frames {
            port.write_all(frame.as_bytes())?;
            trace!("serial <- {}", frame);
        }
        port.flush()?;
        Ok(())
    }

    /// Close the port, returns false if it was already closed
    pub fn close(&self) -> bool {
        let closed = self.lock().take().is_some();
        if closed {
            info!("Serial link {} closed", self.name);
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    // A panicking writer must not take the watchdog down with it
    fn lock(&self) -> MutexGuard<'_, Option<Port>> {
        self.port.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// In-memory serial port that records everything written to it
    #[derive(Clone, Default)]
    pub(crate) struct Recorder {
        bytes: Arc<Mutex<Vec<u8>>>,
        fail: Arc<Mutex<bool>>,
    }

    impl Recorder {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// All frames written so far, e.g. [":WD=1!", ":ML=155!"]
        pub(crate) fn frames(&self) -> Vec<String> {
            let bytes = self.bytes.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .split_inclusive('!')
                .map(str::to_string)
                .collect()
        }

        pub(crate) fn frames_matching(&self, prefix: &str) -> Vec<String> {
            self.frames()
                .into_iter()
                .filter(|f| f.starts_with(prefix))
                .collect()
        }

        pub(crate) fn clear(&self) {
            self.bytes.lock().unwrap().clear();
        }

        /// Make subsequent writes fail with an IO error
        pub(crate) fn set_failing(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if *self.fail.lock().unwrap() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.bytes.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Recorder;
    use super::*;

    #[test]
    fn test_send_writes_frame() {
        let recorder = Recorder::new();
        let link = SerialLink::from_writer("mock", recorder.clone());
        link.send(":WD=1!").unwrap();
        link.send_all(&[":ML=155!".to_string(), ":MR=155!".to_string()])
            .unwrap();
        assert_eq!(recorder.frames(), vec![":WD=1!", ":ML=155!", ":MR=155!"]);
    }

    #[test]
    fn test_send_after_close_fails() {
        let recorder = Recorder::new();
        let link = SerialLink::from_writer("mock", recorder.clone());
        assert!(link.close());
        assert!(!link.close());
        assert!(link.is_closed());
        assert!(matches!(link.send(":WD=0!"), Err(Error::LinkClosed(_))));
        assert!(recorder.frames().is_empty());
    }

    #[test]
    fn test_write_error_is_reported() {
        let recorder = Recorder::new();
        recorder.set_failing(true);
        let link = SerialLink::from_writer("mock", recorder);
        assert!(matches!(link.send(":WD=0!"), Err(Error::Io(_))));
        assert!(!link.is_closed());
    }

    #[test]
    fn test_open_missing_device() {
        let result = SerialLink::open("/dev/does-not-exist-rover", 9600);
        assert!(matches!(result, Err(Error::OpenPort { .. })));
    }

    #[test]
    fn test_concurrent_writers_do_not_interleave() {
        let recorder = Recorder::new();
        let link = std::sync::Arc::new(SerialLink::from_writer("mock", recorder.clone()));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let link = link.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        link.send(&format!(":S{}={}!", i + 1, 1000 + i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let frames = recorder.frames();
        assert_eq!(frames.len(), 200);
        for frame in frames {
            assert!(frame.starts_with(":S") && frame.ends_with('!'), "{}", frame);
            assert_eq!(frame.len(), ":S1=1000!".len());
        }
    }
}
