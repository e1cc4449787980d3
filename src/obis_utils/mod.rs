use std::collections::HashMap;
use lazy_static::lazy_static;

#[derive(Debug, Clone, PartialEq)]
pub struct ObisData {
    pub code: String,
    pub value: f64,
    pub unit: String,
}

/// OBIS codes of the EBZ DD3 we publish and the field names they are published under
pub const EBZ_DD3_CODES: [(&str, &str); 6] = [
    ("1.8.0", "POWER_IMPORT"),
    ("2.8.0", "POWER_EXPORT"),
    ("16.7.0", "CURRENT_POWER_SUM"),
    ("36.7.0", "CURRENT_POWER_L1"),
    ("56.7.0", "CURRENT_POWER_L2"),
    ("76.7.0", "CURRENT_POWER_L3"),
];

lazy_static! {
    static ref FIELD_NAMES: HashMap<&'static str, &'static str> = EBZ_DD3_CODES.iter().copied().collect();
}

pub fn field_name(code: &str) -> Option<&'static str> {
    FIELD_NAMES.get(code).copied()
}

pub fn is_known_code(code: &str) -> bool {
    FIELD_NAMES.contains_key(code)
}

pub fn get_obis_description(code: &str) -> Option<&'static str> {
    match code {
        "1.8.0" => Some("Active energy + (total)"),
        "2.8.0" => Some("Active energy - (total)"),
        "16.7.0" => Some("Sum active instantaneous power"),
        "36.7.0" => Some("Active instantaneous power (L1)"),
        "56.7.0" => Some("Active instantaneous power (L2)"),
        "76.7.0" => Some("Active instantaneous power (L3)"),
        _ => None,
    }
}

/// Values are published with three fractional digits
pub fn round_value(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_name() {
        assert_eq!(field_name("1.8.0"), Some("POWER_IMPORT"));
        assert_eq!(field_name("76.7.0"), Some("CURRENT_POWER_L3"));
        assert_eq!(field_name("1.8.1"), None);
        assert!(!is_known_code("99.9.9"));
    }

    #[test]
    fn test_every_code_has_a_description() {
        for (code, _) in EBZ_DD3_CODES.iter() {
            assert!(get_obis_description(code).is_some(), "{code} without description");
        }
    }

    #[test]
    fn test_round_value() {
        assert_eq!(round_value(123.4567), 123.457);
        assert_eq!(round_value(-5.1), -5.1);
        assert_eq!(round_value(123.456), 123.456);
        assert_eq!(round_value(0.0), 0.0);
    }
}
