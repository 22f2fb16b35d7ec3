use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use pims_spatial::Location;

/// Canonical inventory record.
///
/// `id` is `None` until the row is inserted. A property with
/// `is_property_of_interest` set exists only because some file references it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Property {
    pub id: Option<i64>,
    pub pid: Option<i32>,
    pub pin: Option<i32>,
    pub location: Option<Location>,
    pub address: Option<Address>,
    pub classification_code: Option<String>,
    pub property_type_code: Option<String>,
    pub status_code: Option<String>,
    pub surplus_declaration_code: Option<String>,
    pub data_source_code: Option<String>,
    pub data_source_effective_date: Option<NaiveDate>,
    pub is_property_of_interest: bool,
    pub is_owned: bool,
    pub row_version: Option<i64>,
}

impl Property {
    pub fn with_pid(pid: i32) -> Self {
        Self {
            pid: Some(pid),
            ..Self::default()
        }
    }

    pub fn with_pin(pin: i32) -> Self {
        Self {
            pin: Some(pin),
            ..Self::default()
        }
    }

    pub fn at(location: Location) -> Self {
        Self {
            location: Some(location),
            ..Self::default()
        }
    }

    /// True when nothing identifies the property: no id, PID, PIN or location.
    pub fn is_unidentified(&self) -> bool {
        self.id.is_none() && self.pid.is_none() && self.pin.is_none() && self.location.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub id: Option<i64>,
    pub street_address: Option<String>,
    pub municipality: Option<String>,
    pub postal_code: Option<String>,
    pub province_state_id: Option<i64>,
    pub country_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_partial_payload() {
        let p: Property = serde_json::from_value(serde_json::json!({
            "pid": 123456789,
            "location": { "coordinate": { "x": -123.1, "y": 49.2 }, "srid": 4326 }
        }))
        .unwrap();
        assert_eq!(p.pid, Some(123456789));
        assert!(p.location.is_some());
        assert!(!p.is_property_of_interest);
        assert_eq!(p.id, None);
    }

    #[test]
    fn unidentified_requires_all_identifiers_absent() {
        assert!(Property::default().is_unidentified());
        assert!(!Property::with_pin(7).is_unidentified());
        assert!(!Property::at(Location::wgs84(-123.0, 49.0)).is_unidentified());
    }
}
