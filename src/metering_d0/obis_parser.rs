use crate::models::MeterField;
use crate::obis_utils::{self, ObisData};
use crate::store::{SharedReadingStore, StoreError};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

lazy_static! {
    // 1-0:1.8.0*255(00123.456*kWh)
    static ref OBIS_LINE: Regex = Regex::new(r"1-0:(\d+.[8|7].0)\*255\((-?\d+.\d+)\*(\w+)\)").unwrap();
}

/// Extract every known OBIS value from a complete datagram.
///
/// Unknown codes are skipped, so are values that do not convert to a number.
pub fn parse_datagram(datagram: &str) -> Vec<ObisData> {
    let mut result = Vec::new();

    for caps in OBIS_LINE.captures_iter(datagram) {
        let code = &caps[1];
        if !obis_utils::is_known_code(code) {
            debug!("Ignoring OBIS code {}", code);
            continue;
        }

        let value = match caps[2].parse::<f64>() {
            Ok(v) => obis_utils::round_value(v),
            Err(e) => {
                warn!("Failed to parse value '{}' of OBIS code {}: {}", &caps[2], code, e);
                continue;
            }
        };

        debug!("Parsed OBIS {} ({}) = {} {}", code,
               obis_utils::get_obis_description(code).unwrap_or("unknown"), value, &caps[3]);

        result.push(ObisData {
            code: code.to_string(),
            value,
            unit: caps[3].to_string(),
        });
    }

    result
}

/// Write the values of one datagram into `section`.
///
/// The timestamp is refreshed even if nothing matched, all values of the
/// datagram become visible at once. Returns the number of fields written.
pub fn apply_datagram(store: &SharedReadingStore, section: &str, datagram: &str) -> Result<usize, StoreError> {
    let values = parse_datagram(datagram);

    store.with_meter_section(section, |reading| {
        reading.touch();

        let mut written = 0;
        for data in values {
            let Some(name) = obis_utils::field_name(&data.code) else { continue };
            reading.fields.insert(name.to_string(), MeterField {
                code: data.code,
                value: data.value,
                unit: data.unit,
            });
            written += 1;
        }
        written
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Section;
    use std::sync::Arc;
    use std::thread;

    const DD3_DATAGRAM: &str = "/EBZ5DD3BZ06ETA_107\r\n\r\n\
1-0:0.0.0*255(1EBZ0100507409)\r\n\
1-0:96.1.0*255(1EBZ0100507409)\r\n\
1-0:1.8.0*255(000125.25688570*kWh)\r\n\
1-0:2.8.0*255(000000.00000000*kWh)\r\n\
1-0:16.7.0*255(000115.59*W)\r\n\
1-0:36.7.0*255(000020.65*W)\r\n\
1-0:56.7.0*255(000035.50*W)\r\n\
1-0:76.7.0*255(000059.44*W)\r\n\
1-0:32.7.0*255(232.8*V)\r\n\
1-0:96.5.0*255(001C0104)\r\n\
0-0:96.8.0*255(00104CB6)\r\n\
!";

    #[test]
    fn test_parse_known_and_unknown_codes() {
        let frame = "/ABC\r\n1-0:1.8.0*255(00123.456*kWh)\r\n1-0:99.9.9*255(1*X)\r\n!";
        let values = parse_datagram(frame);
        assert_eq!(values, vec![ObisData {
            code: "1.8.0".to_string(),
            value: 123.456,
            unit: "kWh".to_string(),
        }]);
    }

    #[test]
    fn test_parse_rounding_and_sign() {
        let frame = "/X\r\n1-0:1.8.0*255(123.4567*kWh)\r\n1-0:16.7.0*255(-5.1*W)\r\n!";
        let values = parse_datagram(frame);
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].value, 123.457);
        assert_eq!(values[1].code, "16.7.0");
        assert_eq!(values[1].value, -5.1);
    }

    #[test]
    fn test_parse_full_dd3_datagram() {
        let values = parse_datagram(DD3_DATAGRAM);
        let codes: Vec<&str> = values.iter().map(|v| v.code.as_str()).collect();
        assert_eq!(codes, vec!["1.8.0", "2.8.0", "16.7.0", "36.7.0", "56.7.0", "76.7.0"]);
        assert_eq!(values[0].value, 125.257);
        assert_eq!(values[2].unit, "W");
    }

    #[test]
    fn test_apply_datagram_writes_named_fields() {
        let store = SharedReadingStore::new();
        let frame = "/ABC\r\n1-0:1.8.0*255(00123.456*kWh)\r\n1-0:99.9.9*255(1*X)\r\n!";

        let written = apply_datagram(&store, "smartmeter_d0", frame).unwrap();
        assert_eq!(written, 1);

        let Some(Section::Meter(reading)) = store.get_section("smartmeter_d0").unwrap() else {
            panic!("meter section missing");
        };
        let field = reading.field("POWER_IMPORT").unwrap();
        assert_eq!(field.code, "1.8.0");
        assert_eq!(field.value, 123.456);
        assert_eq!(field.unit, "kWh");
        assert_eq!(reading.fields.len(), 1);
    }

    #[test]
    fn test_apply_datagram_without_matches_refreshes_timestamp() {
        let store = SharedReadingStore::new();
        apply_datagram(&store, "d0", "/A\r\n1-0:1.8.0*255(1.0*kWh)\r\n!").unwrap();
        let Some(Section::Meter(first)) = store.get_section("d0").unwrap() else { panic!() };

        let written = apply_datagram(&store, "d0", "/A\r\nnothing here\r\n!").unwrap();
        assert_eq!(written, 0);

        let Some(Section::Meter(second)) = store.get_section("d0").unwrap() else { panic!() };
        assert!(second.timestamp_utc >= first.timestamp_utc);
        // fields of earlier datagrams stay
        assert_eq!(second.field("POWER_IMPORT").unwrap().value, 1.0);
    }

    #[test]
    fn test_apply_datagram_overwrites_previous_value() {
        let store = SharedReadingStore::new();
        apply_datagram(&store, "d0", "/A\r\n1-0:2.8.0*255(1.0*kWh)\r\n!").unwrap();
        apply_datagram(&store, "d0", "/A\r\n1-0:2.8.0*255(2.5*kWh)\r\n!").unwrap();

        let Some(Section::Meter(reading)) = store.get_section("d0").unwrap() else { panic!() };
        assert_eq!(reading.field("POWER_EXPORT").unwrap().value, 2.5);
    }

    fn frame_with_marker(marker: u32) -> String {
        format!("/EBZ5DD3\r\n\
1-0:1.8.0*255({m}.5*kWh)\r\n\
1-0:2.8.0*255({m}.5*kWh)\r\n\
1-0:16.7.0*255({m}.5*W)\r\n\
1-0:36.7.0*255({m}.5*W)\r\n\
1-0:56.7.0*255({m}.5*W)\r\n\
1-0:76.7.0*255({m}.5*W)\r\n!", m = marker)
    }

    #[test]
    fn test_readers_never_see_a_partial_datagram() {
        let store = Arc::new(SharedReadingStore::new());

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for marker in 1..=2000 {
                    assert_eq!(apply_datagram(&store, "d0", &frame_with_marker(marker)).unwrap(), 6);
                }
            })
        };

        let reader = {
            let store = store.clone();
            thread::spawn(move || {
                let mut last_marker = 0.0;
                for _ in 0..2000 {
                    let Some(Section::Meter(reading)) = store.get_section("d0").unwrap() else {
                        continue;
                    };
                    assert_eq!(reading.fields.len(), 6);
                    let marker = reading.field("POWER_IMPORT").unwrap().value;
                    assert!(reading.fields.values().all(|f| f.value == marker), "mixed datagrams: {:?}", reading);
                    assert!(marker >= last_marker);
                    last_marker = marker;
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();

        let Some(Section::Meter(reading)) = store.get_section("d0").unwrap() else { panic!() };
        assert_eq!(reading.field("CURRENT_POWER_L3").map(|f| f.value), Some(2000.5));
    }
}
