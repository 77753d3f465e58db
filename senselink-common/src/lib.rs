use core::{fmt::Display, str::FromStr};

use compact_str::{CompactString, format_compact};
use serde::{Deserialize, Serialize};

pub mod event;
pub mod reading;

pub use event::{Parameter, RemoteEvent};
pub use reading::{SensorReading, SensorValue, format_timestamp};

/// A category of sensor with its own publish policy and topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    Humidity,
    Pressure,
    Light,
    Motion,
}

impl SensorKind {
    pub const ALL: [SensorKind; 5] = [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::Pressure,
        SensorKind::Light,
        SensorKind::Motion,
    ];

    /// Short key used as the last topic segment and the sensor id suffix.
    pub const fn key(self) -> &'static str {
        match self {
            SensorKind::Temperature => "temp",
            SensorKind::Humidity => "hum",
            SensorKind::Pressure => "pre",
            SensorKind::Light => "light",
            SensorKind::Motion => "mov",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::Pressure => "pressure",
            SensorKind::Light => "light",
            SensorKind::Motion => "motion",
        }
    }

    /// Continuous values are sampled on a cadence, the rest are edge-triggered.
    pub const fn is_continuous(self) -> bool {
        matches!(self, SensorKind::Temperature | SensorKind::Humidity | SensorKind::Pressure)
    }
}

impl Display for SensorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SensorKind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorKind::ALL
            .into_iter()
            .find(|kind| kind.key() == s || kind.name() == s)
            .ok_or("expected one of temp, hum, pre, light, mov")
    }
}

/// Topic layout for outbound readings: `<prefix>/<key>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorTopics {
    prefix: CompactString,
}

impl SensorTopics {
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: CompactString::from(prefix.as_ref().trim_end_matches('/')),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn topic(&self, kind: SensorKind) -> CompactString {
        format_compact!("{}/{}", self.prefix, kind.key())
    }
}

pub fn sensor_id(device: &str, kind: SensorKind) -> CompactString {
    format_compact!("{device}_{}", kind.key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_keys() {
        assert_eq!(
            SensorKind::ALL.map(SensorKind::key),
            ["temp", "hum", "pre", "light", "mov"]
        );
    }

    #[test]
    fn kind_from_str() {
        assert_eq!("temp".parse::<SensorKind>(), Ok(SensorKind::Temperature));
        assert_eq!("humidity".parse::<SensorKind>(), Ok(SensorKind::Humidity));
        assert_eq!("mov".parse::<SensorKind>(), Ok(SensorKind::Motion));
        assert_eq!("motion".parse::<SensorKind>(), Ok(SensorKind::Motion));
        assert!("colour".parse::<SensorKind>().is_err());
    }

    #[test]
    fn kind_serde() {
        assert_eq!(
            serde_json::to_value(SensorKind::Pressure).unwrap(),
            serde_json::json!("pressure")
        );
    }

    #[test]
    fn only_environment_kinds_are_continuous() {
        let continuous = SensorKind::ALL
            .into_iter()
            .filter(|kind| kind.is_continuous())
            .collect::<Vec<_>>();

        assert_eq!(continuous, [
            SensorKind::Temperature,
            SensorKind::Humidity,
            SensorKind::Pressure
        ]);
    }

    #[test]
    fn topic_display() {
        let topics = SensorTopics::new("gridos/shima/");

        assert_eq!(topics.prefix(), "gridos/shima");
        assert_eq!(topics.topic(SensorKind::Temperature), "gridos/shima/temp");
        assert_eq!(topics.topic(SensorKind::Motion), "gridos/shima/mov");
    }

    #[test]
    fn sensor_ids() {
        assert_eq!(sensor_id("pi_shima", SensorKind::Light), "pi_shima_light");
        assert_eq!(sensor_id("pi_shima", SensorKind::Humidity), "pi_shima_hum");
    }
}
