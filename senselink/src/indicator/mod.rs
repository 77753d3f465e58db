//! Remote light state on the LED matrix
//!
//! Two actors share one [`Indicator`]: the message handler applies inbound
//! events, the render loop repaints the matrix every 200 ms. A scrolling
//! message owns the display until it has finished; the render loop leaves the
//! matrix alone while `displaying_message` is set.
//!
//! | light     | since "on"   | matrix   |
//! |-----------|--------------|----------|
//! | unknown   |              | untouched|
//! | off       |              | red      |
//! | on        | < flash      | green    |
//! | on        | >= flash     | blank    |

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use compact_str::CompactString;
use senselink_common::{Parameter, RemoteEvent};

use crate::board::{LedMatrix, Rgb};

mod tasks;

pub use tasks::{spawn_event_loop, spawn_render_loop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightState {
    #[default]
    Unknown,
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Leave whatever is on the matrix
    Untouched,
    Solid(Rgb),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorState {
    pub light: LightState,
    pub light_on_at: Option<Instant>,
    pub displaying_message: bool,
}

impl IndicatorState {
    pub fn apply_light(&mut self, value: f64, now: Instant) {
        if value == 0.0 {
            self.light = LightState::Off;
            self.light_on_at = None;
        } else {
            self.light = LightState::On;
            self.light_on_at = Some(now);
        }
    }

    pub fn frame(&self, now: Instant, flash: Duration) -> Frame {
        if self.displaying_message {
            return Frame::Untouched;
        }

        match (self.light, self.light_on_at) {
            (LightState::Unknown, _) => Frame::Untouched,
            (LightState::Off, _) => Frame::Solid(Rgb::RED),
            (LightState::On, Some(on_at)) if now.saturating_duration_since(on_at) < flash => {
                Frame::Solid(Rgb::GREEN)
            }
            (LightState::On, _) => Frame::Solid(Rgb::BLANK),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    /// Only events from this device are shown
    pub device: CompactString,
    /// How long the matrix stays green after the light turns on
    pub flash_duration: Duration,
    pub temperature_threshold: f64,
    pub message_on_temperature: bool,
    pub scroll_speed: f32,
}

impl IndicatorConfig {
    pub fn new(device: impl Into<CompactString>) -> Self {
        Self {
            device: device.into(),
            flash_duration: Duration::from_secs(2),
            temperature_threshold: 42.0,
            message_on_temperature: true,
            scroll_speed: 0.05,
        }
    }
}

pub fn temperature_message(device: &str, value: f64, threshold: f64) -> String {
    if value > threshold {
        format!("The temperature in {device}'s room is too high! ({value:?})")
    } else {
        format!("The temperature in {device}'s room is normal. ({value:?})")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// From another device
    Ignored,
    LightUpdated(LightState),
    MessageShown,
    /// Our device, but nothing to do for this parameter
    Unhandled,
}

struct Shared<M> {
    state: IndicatorState,
    matrix: M,
}

pub struct Indicator<M> {
    config: IndicatorConfig,
    shared: Mutex<Shared<M>>,
}

impl<M: LedMatrix> Indicator<M> {
    pub fn new(config: IndicatorConfig, matrix: M) -> Self {
        Self {
            config,
            shared: Mutex::new(Shared {
                state: IndicatorState::default(),
                matrix,
            }),
        }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    // a panic mid-scroll must not stall rendering forever
    fn lock(&self) -> MutexGuard<'_, Shared<M>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> IndicatorState {
        self.lock().state.clone()
    }

    /// Parses and applies one inbound message; malformed ones are logged and dropped.
    pub fn handle_payload(&self, payload: &[u8], now: Instant) -> Option<EventOutcome> {
        match RemoteEvent::from_json(payload) {
            Ok(event) => {
                tracing::debug!(?event, "Remote event");
                Some(self.handle_event(&event, now))
            }
            Err(err) => {
                tracing::warn!(
                    payload = %String::from_utf8_lossy(payload),
                    "Dropping malformed event: {err}"
                );
                None
            }
        }
    }

    /// Blocks for the whole scroll when the event shows a message.
    pub fn handle_event(&self, event: &RemoteEvent, now: Instant) -> EventOutcome {
        if event.device != self.config.device {
            return EventOutcome::Ignored;
        }

        match event.parameter {
            Parameter::Light => {
                let mut shared = self.lock();
                shared.state.apply_light(event.value, now);

                tracing::info!(light = ?shared.state.light, "{} light changed", event.device);

                EventOutcome::LightUpdated(shared.state.light)
            }
            Parameter::Temperature if self.config.message_on_temperature => {
                self.show_temperature_message(&event.device, event.value);
                EventOutcome::MessageShown
            }
            Parameter::Temperature | Parameter::Unknown => EventOutcome::Unhandled,
        }
    }

    fn show_temperature_message(&self, device: &str, value: f64) {
        let message = temperature_message(device, value, self.config.temperature_threshold);

        let mut shared = self.lock();
        shared.state.displaying_message = true;
        shared.matrix.show_message(&message, self.config.scroll_speed);
        shared.state.displaying_message = false;
    }

    /// One render tick.
    pub fn render(&self, now: Instant) -> Frame {
        let mut shared = self.lock();
        let frame = shared.state.frame(now, self.config.flash_duration);

        if let Frame::Solid(colour) = frame {
            shared.matrix.clear(colour);
        }

        frame
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        thread,
    };

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Drawn {
        Clear(Rgb),
        MessageStart(String),
        MessageEnd,
    }

    #[derive(Clone, Default)]
    struct RecordingMatrix {
        drawn: Arc<Mutex<Vec<Drawn>>>,
        scroll_time: Duration,
    }

    impl RecordingMatrix {
        fn drawn(&self) -> Vec<Drawn> {
            self.drawn.lock().unwrap().clone()
        }
    }

    impl LedMatrix for RecordingMatrix {
        fn clear(&mut self, colour: Rgb) {
            self.drawn.lock().unwrap().push(Drawn::Clear(colour));
        }

        fn show_message(&mut self, text: &str, _scroll_speed: f32) {
            self.drawn
                .lock()
                .unwrap()
                .push(Drawn::MessageStart(text.to_owned()));
            thread::sleep(self.scroll_time);
            self.drawn.lock().unwrap().push(Drawn::MessageEnd);
        }
    }

    fn light(device: &str, value: f64) -> RemoteEvent {
        RemoteEvent {
            device: device.into(),
            parameter: Parameter::Light,
            value,
        }
    }

    fn temperature(value: f64) -> RemoteEvent {
        RemoteEvent {
            device: "angela".into(),
            parameter: Parameter::Temperature,
            value,
        }
    }

    fn indicator(matrix: RecordingMatrix) -> Indicator<RecordingMatrix> {
        Indicator::new(IndicatorConfig::new("angela"), matrix)
    }

    #[test]
    fn green_flash_then_blank() {
        let indicator = indicator(RecordingMatrix::default());
        let t = Instant::now();

        indicator.handle_event(&light("angela", 1.0), t);

        assert_eq!(indicator.render(t), Frame::Solid(Rgb::GREEN));
        assert_eq!(indicator.render(t + Duration::from_millis(1_900)), Frame::Solid(Rgb::GREEN));
        assert_eq!(indicator.render(t + Duration::from_millis(2_100)), Frame::Solid(Rgb::BLANK));
    }

    #[test]
    fn off_is_red_regardless_of_prior_state() {
        let indicator = indicator(RecordingMatrix::default());
        let t = Instant::now();

        indicator.handle_event(&light("angela", 0.0), t);
        assert_eq!(indicator.render(t), Frame::Solid(Rgb::RED));

        indicator.handle_event(&light("angela", 1.0), t);
        indicator.handle_event(&light("angela", 0.0), t + Duration::from_millis(500));
        assert_eq!(indicator.render(t + Duration::from_millis(600)), Frame::Solid(Rgb::RED));
        assert_eq!(indicator.state().light_on_at, None);
    }

    #[test]
    fn nonzero_values_mean_on() {
        let mut state = IndicatorState::default();
        let t = Instant::now();

        state.apply_light(2.0, t);
        assert_eq!(state.light, LightState::On);
        assert_eq!(state.light_on_at, Some(t));
    }

    #[test]
    fn unknown_light_leaves_matrix_untouched() {
        let matrix = RecordingMatrix::default();
        let indicator = indicator(matrix.clone());

        assert_eq!(indicator.render(Instant::now()), Frame::Untouched);
        assert!(matrix.drawn().is_empty());
    }

    #[test]
    fn message_flag_gates_frames() {
        let t = Instant::now();
        let state = IndicatorState {
            light: LightState::Off,
            light_on_at: None,
            displaying_message: true,
        };

        assert_eq!(state.frame(t, Duration::from_secs(2)), Frame::Untouched);
    }

    #[test]
    fn other_devices_are_ignored() {
        let indicator = indicator(RecordingMatrix::default());

        assert_eq!(
            indicator.handle_event(&light("bob", 0.0), Instant::now()),
            EventOutcome::Ignored
        );
        assert_eq!(indicator.state(), IndicatorState::default());
    }

    #[test]
    fn malformed_payloads_are_dropped() {
        let indicator = indicator(RecordingMatrix::default());
        let t = Instant::now();

        assert_eq!(indicator.handle_payload(b"not json", t), None);
        assert_eq!(
            indicator.handle_payload(br#"{"device": "angela", "parameter": "light", "value": "x"}"#, t),
            None
        );
        assert_eq!(
            indicator.handle_payload(br#"{"device": "angela", "parameter": "light", "value": "NaN"}"#, t),
            None
        );
        assert_eq!(indicator.state(), IndicatorState::default());

        assert_eq!(
            indicator.handle_payload(br#"{"device": "angela", "parameter": "light", "value": 1}"#, t),
            Some(EventOutcome::LightUpdated(LightState::On))
        );
    }

    #[test]
    fn temperature_messages() {
        assert_eq!(
            temperature_message("angela", 45.0, 42.0),
            "The temperature in angela's room is too high! (45.0)"
        );
        assert_eq!(
            temperature_message("angela", 42.0, 42.0),
            "The temperature in angela's room is normal. (42.0)"
        );
    }

    #[test]
    fn temperature_without_messages_is_unhandled() {
        let matrix = RecordingMatrix::default();
        let mut config = IndicatorConfig::new("angela");
        config.message_on_temperature = false;
        let indicator = Indicator::new(config, matrix.clone());

        assert_eq!(
            indicator.handle_event(&temperature(50.0), Instant::now()),
            EventOutcome::Unhandled
        );
        assert!(matrix.drawn().is_empty());
    }

    #[test]
    fn message_blocks_rendering_until_done() {
        let matrix = RecordingMatrix {
            scroll_time: Duration::from_millis(300),
            ..Default::default()
        };
        let indicator = Arc::new(indicator(matrix.clone()));
        let t = Instant::now();

        indicator.handle_event(&light("angela", 0.0), t);

        let scrolling = thread::spawn({
            let indicator = indicator.clone();
            move || indicator.handle_event(&temperature(43.5), t)
        });

        while matrix.drawn().is_empty() {
            thread::yield_now();
        }

        // waits on the lock for the rest of the scroll
        assert_eq!(indicator.render(t), Frame::Solid(Rgb::RED));
        assert_eq!(scrolling.join().unwrap(), EventOutcome::MessageShown);

        assert_eq!(matrix.drawn(), [
            Drawn::MessageStart("The temperature in angela's room is too high! (43.5)".into()),
            Drawn::MessageEnd,
            Drawn::Clear(Rgb::RED),
        ]);
        assert!(!indicator.state().displaying_message);
    }
}
