use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use log::error;
use thiserror::Error;
use crate::models::{MeterReading, PulseReading, Section};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store lock is poisoned")]
    Poisoned,
    #[error("Section {0} holds a different kind of reading")]
    SectionKind(String),
}

/// The one place where the acquisition side and the readers meet.
///
/// Every access takes the same lock, so a reader never sees a section that is
/// only partially written. Sections are created on their first write and are
/// never removed.
pub struct SharedReadingStore {
    sections: Mutex<HashMap<String, Section>>,
}

impl SharedReadingStore {
    pub fn new() -> Self {
        SharedReadingStore { sections: Mutex::new(HashMap::new()) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Section>>, StoreError> {
        self.sections.lock().map_err(|_| {
            error!("Reading store lock is poisoned");
            StoreError::Poisoned
        })
    }

    /// Copy of one section as of now
    pub fn get_section(&self, name: &str) -> Result<Option<Section>, StoreError> {
        Ok(self.lock()?.get(name).cloned())
    }

    /// Copy of every section taken under a single lock
    pub fn snapshot(&self) -> Result<HashMap<String, Section>, StoreError> {
        Ok(self.lock()?.clone())
    }

    pub fn section_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Run `f` with exclusive access to a meter section, creating it first if needed.
    pub fn with_meter_section<T, F>(&self, name: &str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut MeterReading) -> T,
    {
        let mut sections = self.lock()?;
        let section = sections
            .entry(name.to_string())
            .or_insert_with(|| Section::Meter(MeterReading::new()));

        match section {
            Section::Meter(reading) => Ok(f(reading)),
            Section::Pulse(_) => Err(StoreError::SectionKind(name.to_string())),
        }
    }

    /// Run `f` with exclusive access to a pulse section, creating it with `init` if needed.
    pub fn with_pulse_section<T, I, F>(&self, name: &str, init: I, f: F) -> Result<T, StoreError>
    where
        I: FnOnce() -> PulseReading,
        F: FnOnce(&mut PulseReading) -> T,
    {
        let mut sections = self.lock()?;
        let section = sections
            .entry(name.to_string())
            .or_insert_with(|| Section::Pulse(init()));

        match section {
            Section::Pulse(reading) => Ok(f(reading)),
            Section::Meter(_) => Err(StoreError::SectionKind(name.to_string())),
        }
    }
}
