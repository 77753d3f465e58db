//! Deciding which readings are worth sending
//!
//! Continuous values (temperature, humidity, pressure) go out together on a
//! fixed cadence. Discrete values (light, motion) go out when they change, and
//! once at startup to announce the initial state.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::{Duration, Instant},
};

use senselink_common::{SensorKind, SensorReading, SensorValue};

use crate::board::{Acceleration, Colour, SensorBoard};

mod publisher;

pub use publisher::Publisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPolicy {
    Periodic(Duration),
    OnChange,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cadence shared by all continuous sensors
    pub env_interval: Duration,
    /// A colour channel at or above this counts as "light on"
    pub brightness_threshold: u16,
    /// Deviation from 1 g, in g, that counts as motion
    pub motion_threshold: f64,
    /// Sensor kinds to publish at all, each at most once per tick
    pub kinds: BTreeSet<SensorKind>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            env_interval: Duration::from_secs(300),
            brightness_threshold: 5,
            motion_threshold: 0.5,
            kinds: BTreeSet::from(SensorKind::ALL),
        }
    }
}

impl EngineConfig {
    pub fn policy(&self, kind: SensorKind) -> PublishPolicy {
        if kind.is_continuous() {
            PublishPolicy::Periodic(self.env_interval)
        } else {
            PublishPolicy::OnChange
        }
    }
}

pub fn classify_light(colour: Colour, threshold: u16) -> i64 {
    let lit = [colour.r, colour.g, colour.b]
        .into_iter()
        .any(|channel| channel >= threshold);

    lit.into()
}

pub fn classify_motion(acceleration: Acceleration, threshold: f64) -> bool {
    (acceleration.magnitude() - 1.0).abs() > threshold
}

/// Everything read from the board in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSnapshot {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub colour: Colour,
    pub acceleration: Acceleration,
}

impl SensorSnapshot {
    pub fn read(board: &mut impl SensorBoard) -> Self {
        Self {
            temperature: board.temperature(),
            humidity: board.humidity(),
            pressure: board.pressure(),
            colour: board.colour(),
            acceleration: board.acceleration(),
        }
    }
}

/// A reading the engine decided to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub kind: SensorKind,
    pub reading: SensorReading,
}

#[derive(Debug, Clone, Default)]
pub struct EngineState {
    /// One timestamp for the whole continuous group
    last_env_publish: Option<Instant>,
    /// Absent until the first observation has been announced
    last_discrete: BTreeMap<SensorKind, i64>,
}

impl EngineState {
    pub fn last_env_publish(&self) -> Option<Instant> {
        self.last_env_publish
    }

    pub fn last_discrete(&self, kind: SensorKind) -> Option<i64> {
        self.last_discrete.get(&kind).copied()
    }
}

pub struct PublishEngine {
    device: String,
    config: EngineConfig,
    state: EngineState,
}

impl PublishEngine {
    pub fn new(device: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            device: device.into(),
            config,
            state: EngineState::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Runs one decision pass. State advances as if every emission is delivered.
    pub fn tick(
        &mut self,
        now: Instant,
        time_stamp: &str,
        snapshot: &SensorSnapshot,
    ) -> Vec<Emission> {
        let mut emissions = Vec::new();

        let env_due = match self.state.last_env_publish {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.config.env_interval,
        };

        let mut env_published = false;

        for &kind in &self.config.kinds {
            let value = match self.config.policy(kind) {
                PublishPolicy::Periodic(_) if env_due => {
                    env_published = true;
                    SensorValue::rounded(match kind {
                        SensorKind::Temperature => snapshot.temperature,
                        SensorKind::Humidity => snapshot.humidity,
                        _ => snapshot.pressure,
                    })
                }
                PublishPolicy::Periodic(_) => continue,
                PublishPolicy::OnChange => {
                    let current = match kind {
                        SensorKind::Light => {
                            classify_light(snapshot.colour, self.config.brightness_threshold)
                        }
                        _ => {
                            classify_motion(snapshot.acceleration, self.config.motion_threshold)
                                .into()
                        }
                    };

                    let previous = self.state.last_discrete.insert(kind, current);
                    if previous == Some(current) {
                        continue;
                    }

                    SensorValue::Integer(current)
                }
            };

            emissions.push(Emission {
                kind,
                reading: SensorReading::new(&self.device, kind, time_stamp, value),
            });
        }

        if env_published {
            self.state.last_env_publish = Some(now);
        }

        emissions
    }
}
