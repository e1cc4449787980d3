use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use crate::store::SharedReadingStore;
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::MissedTickBehavior;

pub mod framer;
pub mod obis_parser;
pub mod serial;

use framer::DatagramFramer;

#[derive(Error, Debug)]
pub enum D0Error {
    #[error("Unable to open serial port {0}")]
    SerialOpen(String),
    #[error("Reading from the D0 interface failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("D0 byte stream ended")]
    EndOfStream,
}

/// Cooperative stop signal, checked once per byte
#[derive(Clone, Debug, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reads datagrams byte by byte from the D0 interface
pub struct D0Reader<R> {
    source: R,
    framer: DatagramFramer,
    byte_timeout: Duration,
}

impl<R: AsyncRead + Unpin> D0Reader<R> {
    pub fn new(source: R, byte_timeout: Duration) -> Self {
        Self {
            source,
            framer: DatagramFramer::new(),
            byte_timeout,
        }
    }

    /// Read until one complete datagram arrived.
    ///
    /// Returns `Ok(None)` once `abort` is raised, whatever was collected up to
    /// then is dropped. A byte timeout just means no data yet and is retried.
    pub async fn read_datagram(&mut self, abort: &AbortFlag) -> Result<Option<String>, D0Error> {
        self.framer.reset();
        let mut byte = [0u8; 1];

        while !abort.is_aborted() {
            match tokio::time::timeout(self.byte_timeout, self.source.read(&mut byte)).await {
                Err(_) => continue,
                Ok(Ok(0)) => return Err(D0Error::EndOfStream),
                Ok(Ok(_)) => {
                    if let Some(datagram) = self.framer.push(byte[0]) {
                        debug!("Received D0 datagram with {} bytes", datagram.len());
                        return Ok(Some(datagram));
                    }
                }
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Ok(Err(e)) => return Err(D0Error::Io(e)),
            }
        }

        debug!("D0 read aborted, dropping {} buffered bytes", self.framer.buffered().len());
        Ok(None)
    }
}

pub struct D0Manager<R> {
    reader: D0Reader<R>,
    store: Arc<SharedReadingStore>,
    section: String,
    read_interval: Duration,
    invocation_timeout: Duration,
    abort: AbortFlag,
}

impl<R: AsyncRead + Unpin> D0Manager<R> {
    pub fn new(reader: D0Reader<R>, store: Arc<SharedReadingStore>, section: String,
               read_interval: Duration, invocation_timeout: Duration) -> Self {
        Self {
            reader,
            store,
            section,
            read_interval,
            invocation_timeout,
            abort: AbortFlag::new(),
        }
    }

    /// Handle to stop the manager from outside
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// One read cycle, returns true if a datagram made it into the store
    pub async fn run_once(&mut self) -> Result<bool, D0Error> {
        let datagram = match tokio::time::timeout(self.invocation_timeout, self.reader.read_datagram(&self.abort)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("No complete D0 datagram within {:?}", self.invocation_timeout);
                return Ok(false);
            }
        };

        let Some(datagram) = datagram else {
            return Ok(false);
        };

        match obis_parser::apply_datagram(&self.store, &self.section, &datagram) {
            Ok(count) => {
                debug!("Updated {} fields in section {}", count, self.section);
                Ok(true)
            }
            Err(e) => {
                error!("Unable to store D0 datagram: {}", e);
                Ok(false)
            }
        }
    }

    pub async fn start_thread(&mut self) -> Result<(), D0Error> {
        info!("Starting D0 thread for section {}", self.section);

        let mut interval = tokio::time::interval(self.read_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.abort.is_aborted() {
            interval.tick().await;
            if let Err(e) = self.run_once().await {
                error!("D0 interface failed: {}", e);
                return Err(e);
            }
        }

        info!("D0 thread stopped");
        Ok(())
    }
}
