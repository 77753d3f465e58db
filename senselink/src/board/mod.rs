//! Capabilities of the attached sensor board
//!
//! Drivers are blocking: every call talks to the hardware before returning.

pub mod sim;

/// Raw colour sensor channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Colour {
    pub r: u16,
    pub g: u16,
    pub b: u16,
    pub clear: u16,
}

/// Accelerometer reading in g.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Matrix pixel colour, each 0-255
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const GREEN: Rgb = Rgb(0, 150, 0);
    pub const BLANK: Rgb = Rgb(0, 0, 0);
}

pub trait SensorBoard {
    /// Degrees Celsius
    fn temperature(&mut self) -> f64;
    /// Relative humidity, percent
    fn humidity(&mut self) -> f64;
    /// Millibars (hPa)
    fn pressure(&mut self) -> f64;
    fn colour(&mut self) -> Colour;
    fn acceleration(&mut self) -> Acceleration;
}

pub trait LedMatrix {
    /// Paint the whole matrix one colour.
    fn clear(&mut self, colour: Rgb);

    /// Scroll `text` across the matrix, returning once it has left the display.
    /// `scroll_speed` is the pause in seconds between one-column shifts.
    fn show_message(&mut self, text: &str, scroll_speed: f32);
}
