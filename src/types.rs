use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::wire_string;
use crate::command::Property;

/// A unit state response exactly as the API returned it, plus when it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawState {
    pub values: Map<String, Value>,
    pub fetched_at: DateTime<Utc>,
}

impl RawState {
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values,
            fetched_at: Utc::now(),
        }
    }

    /// Build from an API response. The `error` envelope field is not state.
    pub fn from_response(response: Value) -> Self {
        let mut values = match response {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        values.remove("error");
        Self::new(values)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(wire_string)
    }
}

/// A normalized property value: a catalog token or a display temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Token(String),
    Number(f64),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Token(s) => f.write_str(s),
            StateValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Human-readable unit state. Temperatures include the unit's offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitState {
    pub power: Option<String>,
    pub mode: Option<String>,
    pub auto_mode: Option<String>,
    pub standby: Option<String>,
    pub fan_speed: Option<String>,
    pub set_temperature: Option<f64>,
    pub room_temperature: Option<f64>,
    pub air_direction_v: Option<String>,
    pub air_direction_h: Option<String>,
}

/// Partial target state for [`crate::MelviewClient::set_state`]. `None` leaves
/// a property as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredState {
    pub power: Option<String>,
    pub mode: Option<String>,
    pub set_temperature: Option<f64>,
    pub fan_speed: Option<String>,
    pub air_direction_v: Option<String>,
    pub air_direction_h: Option<String>,
}

impl DesiredState {
    pub fn token(&self, property: Property) -> Option<&str> {
        match property {
            Property::Power => self.power.as_deref(),
            Property::Mode => self.mode.as_deref(),
            Property::FanSpeed => self.fan_speed.as_deref(),
            Property::AirDirectionV => self.air_direction_v.as_deref(),
            Property::AirDirectionH => self.air_direction_h.as_deref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Emitted when a poll shows trackable properties that changed without this
/// client asking for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub unit_index: usize,
    pub unit_id: String,
    pub previous: BTreeMap<Property, StateValue>,
    pub current: BTreeMap<Property, StateValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_response_drops_error_envelope() {
        let raw = RawState::from_response(json!({"error": "ok", "power": 1, "settemp": "22"}));
        assert!(raw.get("error").is_none());
        assert_eq!(raw.get_string("power").as_deref(), Some("1"));
        assert_eq!(raw.get_string("settemp").as_deref(), Some("22"));
    }

    #[test]
    fn null_values_read_as_missing() {
        let raw = RawState::from_response(json!({"airdirh": null}));
        assert!(raw.get("airdirh").is_none());
    }

    #[test]
    fn state_value_serializes_untagged() {
        assert_eq!(serde_json::to_value(StateValue::Number(21.5)).unwrap(), json!(21.5));
        assert_eq!(
            serde_json::to_value(StateValue::Token("cool".into())).unwrap(),
            json!("cool")
        );
    }

    #[test]
    fn desired_state_uses_camel_case() {
        let d: DesiredState =
            serde_json::from_value(json!({"mode": "heat", "setTemperature": 21})).unwrap();
        assert_eq!(d.mode.as_deref(), Some("heat"));
        assert_eq!(d.set_temperature, Some(21.0));
        assert!(!d.is_empty());
        assert!(DesiredState::default().is_empty());
    }
}
