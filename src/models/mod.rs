use serde::Serialize;
use std::collections::BTreeMap;
use chrono::{DateTime, Utc};


/// One OBIS value as extracted from a D0 datagram
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MeterField {
    /// OBIS code which produced the field, e.g. `1.8.0`
    #[serde(rename = "OBIS_Code")]
    pub code: String,
    /// Value rounded to three fractional digits
    pub value: f64,
    /// Unit as sent by the meter
    pub unit: String,
}

/// Latest values of the D0 meter
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MeterReading {
    /// Known fields by name, fields never seen are not present
    #[serde(flatten)]
    pub fields: BTreeMap<String, MeterField>,
    /// Time of the last parse attempt
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: DateTime<Utc>,
}

impl MeterReading {
    pub fn new() -> Self {
        MeterReading {
            fields: BTreeMap::new(),
            timestamp_utc: Utc::now(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&MeterField> {
        self.fields.get(name)
    }

    pub fn touch(&mut self) {
        self.timestamp_utc = Utc::now();
    }
}

/// Accumulated energy of the S0 meter
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PulseReading {
    pub count: f64,
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: DateTime<Utc>,
}

impl PulseReading {
    pub fn new() -> Self {
        PulseReading {
            count: 0.0,
            timestamp_utc: Utc::now(),
        }
    }

    /// Replace the counter, value and timestamp always change together
    pub fn set(&mut self, count: f64) {
        self.count = count;
        self.timestamp_utc = Utc::now();
    }

    pub fn add(&mut self, delta: f64) {
        self.set(self.count + delta);
    }
}

/// Content of a single named store section
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Section {
    Meter(MeterReading),
    Pulse(PulseReading),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_reading_serialization() {
        let mut reading = MeterReading::new();
        reading.fields.insert("POWER_IMPORT".to_string(), MeterField {
            code: "1.8.0".to_string(),
            value: 123.456,
            unit: "kWh".to_string(),
        });

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["POWER_IMPORT"]["OBIS_Code"], "1.8.0");
        assert_eq!(json["POWER_IMPORT"]["value"], 123.456);
        assert_eq!(json["POWER_IMPORT"]["unit"], "kWh");
        assert!(json["timestampUTC"].is_string());
    }

    #[test]
    fn test_pulse_reading_updates_timestamp() {
        let mut reading = PulseReading::new();
        let before = reading.timestamp_utc;
        reading.add(0.001);
        assert!(reading.timestamp_utc >= before);
        assert!((reading.count - 0.001).abs() < 1e-9);
    }

    #[test]
    fn test_sections_serialize_without_tag() {
        let json = serde_json::to_value(Section::Pulse(PulseReading::new())).unwrap();
        assert_eq!(json["count"], 0.0);
        assert!(json.get("Pulse").is_none());
    }
}
