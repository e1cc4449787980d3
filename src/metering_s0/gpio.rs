use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use super::debounce::EdgeDebouncer;
use super::S0Error;

/// Called once per rising edge, must return quickly
pub type EdgeHandler = Arc<dyn Fn() + Send + Sync>;

pub trait EdgeSource {
    fn register(&mut self, handler: EdgeHandler) -> Result<EdgeRegistration, S0Error>;
}

/// Live edge delivery; detaching or dropping stops it and frees the pin
pub struct EdgeRegistration {
    task: Option<JoinHandle<()>>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl EdgeRegistration {
    pub fn new(task: JoinHandle<()>, release: Box<dyn FnOnce() + Send>) -> Self {
        Self { task: Some(task), release: Some(release) }
    }

    pub fn detach(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for EdgeRegistration {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Rising edges of a pin through the Linux sysfs GPIO interface.
///
/// The value file is polled, so edges shorter than `poll_interval` may be missed.
/// S0 pulses are at least 30ms long.
pub struct SysfsGpioEdgeSource {
    pub pin: u32,
    pub base: PathBuf,
    pub debounce: Duration,
    pub poll_interval: Duration,
}

impl SysfsGpioEdgeSource {
    pub fn new(pin: u32, debounce: Duration, poll_interval: Duration) -> Self {
        Self {
            pin,
            base: PathBuf::from("/sys/class/gpio"),
            debounce,
            poll_interval,
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.base.join(format!("gpio{}", self.pin))
    }

    fn write_attr(&self, path: PathBuf, value: &str) -> Result<(), S0Error> {
        std::fs::write(&path, value)
            .map_err(|e| S0Error::Gpio(format!("writing {} to {:?} failed: {}", value, path, e)))
    }

    fn configure_pin(&self, pin_dir: &Path) -> Result<(), S0Error> {
        self.write_attr(pin_dir.join("direction"), "in")?;
        self.write_attr(pin_dir.join("edge"), "rising")
    }
}

impl EdgeSource for SysfsGpioEdgeSource {
    fn register(&mut self, handler: EdgeHandler) -> Result<EdgeRegistration, S0Error> {
        let pin_dir = self.pin_dir();
        let exported = !pin_dir.exists();
        if exported {
            self.write_attr(self.base.join("export"), &self.pin.to_string())?;
        }

        if let Err(e) = self.configure_pin(&pin_dir) {
            // a pin we exported ourselves must not stay behind
            if exported {
                if let Err(unexport_err) = self.write_attr(self.base.join("unexport"), &self.pin.to_string()) {
                    error!("Unable to release GPIO {}: {}", self.pin, unexport_err);
                }
            }
            return Err(e);
        }

        info!("Watching GPIO {} for rising edges", self.pin);

        let value_path = pin_dir.join("value");
        let poll_interval = self.poll_interval;
        let mut debouncer = EdgeDebouncer::new(self.debounce);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            let mut last_high: Option<bool> = None;

            loop {
                interval.tick().await;
                let high = match tokio::fs::read_to_string(&value_path).await {
                    Ok(v) => v.trim() == "1",
                    Err(e) => {
                        warn!("Unable to read {:?}: {}", value_path, e);
                        continue;
                    }
                };

                // the level seen on the first poll is not an edge
                if last_high == Some(false) && high && debouncer.accept(Instant::now()) {
                    debug!("Rising edge on {:?}", value_path);
                    handler();
                }
                last_high = Some(high);
            }
        });

        let unexport = self.base.join("unexport");
        let pin = self.pin;
        let release = Box::new(move || {
            if let Err(e) = std::fs::write(&unexport, pin.to_string()) {
                error!("Unable to release GPIO {}: {}", pin, e);
            } else {
                info!("Released GPIO {}", pin);
            }
        });

        Ok(EdgeRegistration::new(task, release))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fake_sysfs(pin: u32) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let pin_dir = dir.path().join(format!("gpio{}", pin));
        std::fs::create_dir(&pin_dir).unwrap();
        std::fs::write(pin_dir.join("value"), "0\n").unwrap();
        dir
    }

    fn source(dir: &tempfile::TempDir, pin: u32, debounce: Duration) -> SysfsGpioEdgeSource {
        SysfsGpioEdgeSource {
            pin,
            base: dir.path().to_path_buf(),
            debounce,
            poll_interval: Duration::from_millis(5),
        }
    }

    fn counting_handler() -> (EdgeHandler, Arc<AtomicUsize>) {
        let edges = Arc::new(AtomicUsize::new(0));
        let counter = edges.clone();
        let handler: EdgeHandler = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (handler, edges)
    }

    async fn set_level(dir: &tempfile::TempDir, pin: u32, level: &str) {
        std::fs::write(dir.path().join(format!("gpio{}", pin)).join("value"), level).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
    }

    #[tokio::test]
    async fn test_register_configures_pin() {
        let dir = fake_sysfs(17);
        let (handler, _) = counting_handler();
        let registration = source(&dir, 17, Duration::ZERO).register(handler).unwrap();

        let pin_dir = dir.path().join("gpio17");
        assert_eq!(std::fs::read_to_string(pin_dir.join("direction")).unwrap(), "in");
        assert_eq!(std::fs::read_to_string(pin_dir.join("edge")).unwrap(), "rising");

        registration.detach();
        assert_eq!(std::fs::read_to_string(dir.path().join("unexport")).unwrap(), "17");
    }

    #[tokio::test]
    async fn test_rising_edges_reach_handler() {
        let dir = fake_sysfs(4);
        let (handler, edges) = counting_handler();
        let registration = source(&dir, 4, Duration::ZERO).register(handler).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        set_level(&dir, 4, "1\n").await;
        set_level(&dir, 4, "0\n").await;
        set_level(&dir, 4, "1\n").await;
        assert_eq!(edges.load(Ordering::SeqCst), 2);

        registration.detach();
        set_level(&dir, 4, "0\n").await;
        set_level(&dir, 4, "1\n").await;
        assert_eq!(edges.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bouncing_edges_are_suppressed() {
        let dir = fake_sysfs(5);
        let (handler, edges) = counting_handler();
        let _registration = source(&dir, 5, Duration::from_secs(10)).register(handler).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        set_level(&dir, 5, "1\n").await;
        set_level(&dir, 5, "0\n").await;
        set_level(&dir, 5, "1\n").await;
        assert_eq!(edges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_setup_releases_exported_pin() {
        // export is accepted but the pin directory never shows up
        let dir = tempfile::tempdir().unwrap();
        let (handler, edges) = counting_handler();
        let result = source(&dir, 23, Duration::ZERO).register(handler);

        assert!(matches!(result, Err(S0Error::Gpio(_))));
        assert_eq!(std::fs::read_to_string(dir.path().join("export")).unwrap(), "23");
        assert_eq!(std::fs::read_to_string(dir.path().join("unexport")).unwrap(), "23");
        assert_eq!(edges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_setup_keeps_foreign_pin_exported() {
        let dir = tempfile::tempdir().unwrap();
        // exported by someone else, but not writable as a directory entry
        std::fs::write(dir.path().join("gpio24"), "").unwrap();
        let (handler, _) = counting_handler();

        assert!(matches!(source(&dir, 24, Duration::ZERO).register(handler), Err(S0Error::Gpio(_))));
        assert!(!dir.path().join("export").exists());
        assert!(!dir.path().join("unexport").exists());
    }

    #[tokio::test]
    async fn test_missing_pin_fails_registration() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, _) = counting_handler();
        let mut source = SysfsGpioEdgeSource {
            pin: 22,
            base: dir.path().join("no-such-dir"),
            debounce: Duration::ZERO,
            poll_interval: Duration::from_millis(5),
        };
        assert!(matches!(source.register(handler), Err(S0Error::Gpio(_))));
    }
}
