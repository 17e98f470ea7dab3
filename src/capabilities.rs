use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::catalog::CapabilityFlag;

/// Temperature bounds for one mode, in raw (offset-free) degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRange {
    #[serde(deserialize_with = "lenient_f64")]
    pub min: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub max: f64,
}

/// Hardware capabilities reported by `unitcapabilities.aspx`.
///
/// Only the fields the client understands are kept. The API is loose with
/// types, so numeric fields accept both `1` and `"1"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default)]
    pub unitname: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub modeltype: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub fanstage: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub hasairdir: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub hasswing: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub hasautomode: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub hasautofan: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub hasdrymode: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub hasairauto: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub hasairdirh: Option<i64>,
    /// Per-mode bounds keyed by the mode's wire code.
    #[serde(default)]
    pub max: BTreeMap<String, TemperatureRange>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub localip: Option<String>,
}

impl Capabilities {
    pub fn flag(&self, flag: CapabilityFlag) -> Option<i64> {
        match flag {
            CapabilityFlag::FanStage => self.fanstage,
            CapabilityFlag::HasAirDir => self.hasairdir,
            CapabilityFlag::HasSwing => self.hasswing,
            CapabilityFlag::HasAutoMode => self.hasautomode,
            CapabilityFlag::HasAutoFan => self.hasautofan,
            CapabilityFlag::HasDryMode => self.hasdrymode,
            CapabilityFlag::HasAirAuto => self.hasairauto,
            CapabilityFlag::HasAirDirH => self.hasairdirh,
        }
    }

    pub fn range(&self, mode_code: &str) -> Option<TemperatureRange> {
        self.max.get(mode_code).copied()
    }
}

fn value_to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(value_to_i64))
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    match &v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {v}")))
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(d)?.unwrap_or_default())
}
