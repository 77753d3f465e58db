//! Stand-in board for running without a hardware driver.
//!
//! Environment values drift slowly, the light toggles every 45 s and the board
//! is shaken for a few seconds once a minute.

use core::f64::consts::TAU;
use std::time::{Duration, Instant};

use super::{Acceleration, Colour, LedMatrix, Rgb, SensorBoard};

const LIGHT_PERIOD_SECS: f64 = 45.0;
const SHAKE_PERIOD_SECS: f64 = 60.0;
const SHAKE_SECS: f64 = 3.0;

pub struct SimulatedBoard {
    origin: Instant,
}

impl SimulatedBoard {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    fn elapsed(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn wave(t: f64, period: f64) -> f64 {
        (t / period * TAU).sin()
    }

    pub fn colour_at(t: f64) -> Colour {
        if (t / LIGHT_PERIOD_SECS) as u64 % 2 == 0 {
            Colour { r: 120, g: 110, b: 90, clear: 310 }
        } else {
            Colour { r: 2, g: 1, b: 3, clear: 7 }
        }
    }

    pub fn acceleration_at(t: f64) -> Acceleration {
        if t % SHAKE_PERIOD_SECS >= SHAKE_PERIOD_SECS - SHAKE_SECS {
            Acceleration { x: 0.9, y: 0.4, z: 1.5 }
        } else {
            Acceleration { x: 0.01, y: -0.02, z: 1.0 }
        }
    }
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorBoard for SimulatedBoard {
    fn temperature(&mut self) -> f64 {
        22.0 + 1.5 * Self::wave(self.elapsed(), 1800.0)
    }

    fn humidity(&mut self) -> f64 {
        45.0 + 5.0 * Self::wave(self.elapsed(), 2400.0)
    }

    fn pressure(&mut self) -> f64 {
        1013.25 + 2.0 * Self::wave(self.elapsed(), 3600.0)
    }

    fn colour(&mut self) -> Colour {
        Self::colour_at(self.elapsed())
    }

    fn acceleration(&mut self) -> Acceleration {
        Self::acceleration_at(self.elapsed())
    }
}

/// Logs what would be drawn. Messages take as long as a real scroll.
#[derive(Debug, Default)]
pub struct ConsoleMatrix {
    current: Option<Rgb>,
}

impl ConsoleMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// 8 columns per glyph plus one screen width to scroll off.
    pub fn scroll_duration(text: &str, scroll_speed: f32) -> Duration {
        let columns = (text.chars().count() + 1) * 8;
        Duration::from_secs_f32(scroll_speed.max(0.0) * columns as f32)
    }
}

impl LedMatrix for ConsoleMatrix {
    fn clear(&mut self, colour: Rgb) {
        if self.current != Some(colour) {
            tracing::info!(?colour, "matrix");
            self.current = Some(colour);
        }
    }

    fn show_message(&mut self, text: &str, scroll_speed: f32) {
        tracing::info!("matrix message: {text}");
        std::thread::sleep(Self::scroll_duration(text, scroll_speed));
        self.current = None;
    }
}
