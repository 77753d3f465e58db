//! Inbound remote sensor events
//!
//! All devices share one topic; each payload names the device it came from.
//!
//! ```plain
//! gridos/discoverylab/pi/data <- {"device": "angela", "parameter": "light", "value": 1}
//! ```

use compact_str::CompactString;
use serde::{Deserialize, Deserializer, Serialize, de};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub device: CompactString,
    pub parameter: Parameter,
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    pub value: f64,
}

impl RemoteEvent {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Light,
    Temperature,
    /// Anything else published on the shared topic
    #[serde(other)]
    Unknown,
}

fn number_or_numeric_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(CompactString),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Number(value) => value,
        Raw::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format_args!("non-numeric value {text:?}")))?,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(de::Error::custom(format_args!("non-finite value {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_light_event() {
        assert_eq!(
            RemoteEvent::from_json(br#"{"device": "angela", "parameter": "light", "value": 1}"#)
                .unwrap(),
            RemoteEvent {
                device: "angela".into(),
                parameter: Parameter::Light,
                value: 1.0,
            }
        );
    }

    #[test]
    fn value_may_be_a_numeric_string() {
        let event = RemoteEvent::from_json(
            br#"{"device": "angela", "parameter": "temperature", "value": " 43.5"}"#,
        )
        .unwrap();

        assert_eq!(event.parameter, Parameter::Temperature);
        assert_eq!(event.value, 43.5);
    }

    #[test]
    fn missing_value_defaults_to_zero() {
        let event =
            RemoteEvent::from_json(br#"{"device": "angela", "parameter": "light"}"#).unwrap();

        assert_eq!(event.value, 0.0);
    }

    #[test]
    fn unknown_parameter() {
        let event =
            RemoteEvent::from_json(br#"{"device": "bob", "parameter": "humidity", "value": 40}"#)
                .unwrap();

        assert_eq!(event.parameter, Parameter::Unknown);
    }

    #[test]
    fn malformed_events() {
        assert!(RemoteEvent::from_json(b"\xff\xfe").is_err());
        assert!(RemoteEvent::from_json(br#"{"parameter": "light", "value": 1}"#).is_err());
        assert!(RemoteEvent::from_json(br#"{"device": "angela", "value": 1}"#).is_err());
        assert!(
            RemoteEvent::from_json(br#"{"device": "angela", "parameter": "light", "value": "on"}"#)
                .is_err()
        );
        assert!(
            RemoteEvent::from_json(br#"{"device": "angela", "parameter": "light", "value": null}"#)
                .is_err()
        );    }

    #[test]
    fn non_finite_values_are_malformed() {
        for value in ["NaN", "nan", "inf", "-infinity"] {
            let payload =
                format!(r#"{{"device": "angela", "parameter": "light", "value": "{value}"}}"#);

            assert!(RemoteEvent::from_json(payload.as_bytes()).is_err(), "{value} accepted");
        }
    }
}
