use std::sync::Arc;
use crate::models::{PulseReading, Section};
use crate::store::{SharedReadingStore, StoreError};
use log::{debug, error, info, warn};
use thiserror::Error;

pub mod debounce;
pub mod gpio;

use gpio::EdgeHandler;

/// kWh per pulse, the meter outputs 1000 pulses per kWh
pub const PULSE_QUANTUM: f64 = 0.001;

#[derive(Error, Debug)]
pub enum S0Error {
    #[error("Invalid counter value {0}")]
    InvalidValue(String),
    #[error("Store access failed: {0}")]
    Store(#[from] StoreError),
    #[error("GPIO error: {0}")]
    Gpio(String),
}

/// Counts the pulses of the S0 meter into a store section
#[derive(Clone)]
pub struct S0Interface {
    section: String,
    store: Arc<SharedReadingStore>,
}

impl S0Interface {
    /// Creates the section with a zero count unless it already exists
    pub fn new(section: String, store: Arc<SharedReadingStore>) -> Result<Self, S0Error> {
        store.with_pulse_section(&section, PulseReading::new, |_| ())?;
        info!("S0 interface counting into section {}", section);
        Ok(Self { section, store })
    }

    /// Set the counter to what the meter display shows.
    ///
    /// Invalid input is logged and leaves the counter alone.
    pub fn set_value(&self, value: &str) -> bool {
        let parsed = match value.trim().parse::<f64>() {
            Ok(v) => v,
            Err(e) => {
                warn!("Rejecting S0 counter value '{}': {}", value, e);
                return false;
            }
        };

        match self.set_count(parsed) {
            Ok(()) => true,
            Err(e) => {
                warn!("Setting S0 counter to '{}' failed: {}", value, e);
                false
            }
        }
    }

    pub fn set_count(&self, value: f64) -> Result<(), S0Error> {
        if !value.is_finite() || value < 0.0 {
            return Err(S0Error::InvalidValue(value.to_string()));
        }

        self.store.with_pulse_section(&self.section, PulseReading::new, |reading| reading.set(value))?;
        info!("S0 counter of {} set to {}", self.section, value);
        Ok(())
    }

    /// One pulse seen. Never fails towards the caller, errors only end up in the log.
    pub fn on_edge(&self) {
        match self.store.with_pulse_section(&self.section, PulseReading::new, |reading| {
            reading.add(PULSE_QUANTUM);
            reading.count
        }) {
            Ok(count) => debug!("S0 pulse, count now {}", count),
            Err(e) => error!("Unable to count S0 pulse for {}: {}", self.section, e),
        }
    }

    pub fn reading(&self) -> Option<PulseReading> {
        match self.store.get_section(&self.section) {
            Ok(Some(Section::Pulse(reading))) => Some(reading),
            Ok(_) => None,
            Err(e) => {
                error!("Unable to read S0 section {}: {}", self.section, e);
                None
            }
        }
    }

    pub fn edge_handler(&self) -> EdgeHandler {
        let counter = self.clone();
        Arc::new(move || counter.on_edge())
    }
}
