use chrono::NaiveDateTime;
use compact_str::{CompactString, ToCompactString as _};
use serde::{Deserialize, Serialize};

use crate::{SensorKind, sensor_id};

/// Wire format of the `time_stamp` field, second precision without offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_timestamp(at: &NaiveDateTime) -> CompactString {
    at.format(TIMESTAMP_FORMAT).to_compact_string()
}

/// One outbound reading: `{"sensor": .., "time_stamp": .., "value": ..}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// `<device>_<kind key>`, e.g. `pi_shima_temp`
    pub sensor: CompactString,
    pub time_stamp: CompactString,
    pub value: SensorValue,
}

impl SensorReading {
    pub fn new(
        device: &str,
        kind: SensorKind,
        time_stamp: impl Into<CompactString>,
        value: SensorValue,
    ) -> Self {
        Self {
            sensor: sensor_id(device, kind),
            time_stamp: time_stamp.into(),
            value,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    /// Classified discrete values (light on/off, motion)
    Integer(i64),
    Number(f64),
}

impl SensorValue {
    /// Continuous readings are published with two decimals.
    pub fn rounded(raw: f64) -> Self {
        SensorValue::Number((raw * 100.0).round() / 100.0)
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            SensorValue::Integer(v) => v as f64,
            SensorValue::Number(v) => v,
        }
    }
}

impl From<bool> for SensorValue {
    fn from(value: bool) -> Self {
        SensorValue::Integer(value.into())
    }
}
