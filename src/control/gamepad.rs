//! Gamepad control-event source.
//!
//! Bridges gilrs input onto the pipeline: button press/release goes to
//! the [`ButtonStateTracker`] (which derives short/long presses), axis
//! motion goes straight to the shared sink as `ScalarChanged` with the
//! axis position rescaled to the 0-255 calibration range.

use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use statum::{machine, state};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::control::{ButtonStateTracker, ControlEvent, ControlEventSink, ControlEventType};

// How often the gilrs event queue is drained
const POLL_INTERVAL: Duration = Duration::from_millis(2);

// Gamepad source settings
#[derive(Clone, Debug)]
pub struct GamepadSourceSettings {
    pub axis_deadzone: f32,
}

impl Default for GamepadSourceSettings {
    fn default() -> Self {
        Self { axis_deadzone: 0.05 }
    }
}

// Gamepad source errors
#[derive(Debug, thiserror::Error)]
pub enum GamepadSourceError {
    #[error("Failed to initialize gamepad interface: {0}")]
    InitializationError(String),
}

// Source lifecycle states
#[state]
#[derive(Debug, Clone)]
pub enum SourceState {
    Initializing,
    Collecting,
}

#[machine]
pub struct GamepadSource<S: SourceState> {
    // Gilrs context
    gilrs: Gilrs,

    // Active gamepad
    active_gamepad: Option<GamepadId>,

    // Source settings
    settings: GamepadSourceSettings,

    // Sink for scalar events
    sink: Arc<dyn ControlEventSink>,

    // Tracker deriving press semantics for buttons
    tracker: Arc<ButtonStateTracker>,
}

impl GamepadSource<Initializing> {
    pub fn create(
        settings: Option<GamepadSourceSettings>,
        sink: Arc<dyn ControlEventSink>,
        tracker: Arc<ButtonStateTracker>,
    ) -> Result<Self, GamepadSourceError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating gamepad source with settings: {:?}", settings);

        info!("Initializing gilrs gamepad interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => g,
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(GamepadSourceError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, None, settings, sink, tracker))
    }

    // Pick a gamepad and transition to the Collecting state
    pub fn initialize(mut self) -> GamepadSource<Collecting> {
        let gamepads: Vec<(GamepadId, String)> = self
            .gilrs
            .gamepads()
            .map(|(id, pad)| (id, pad.name().to_string()))
            .collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, continuing in idle mode");
        } else {
            for (id, name) in &gamepads {
                info!("Found gamepad [{}]: {}", id, name);
            }
            let (id, name) = &gamepads[0];
            self.active_gamepad = Some(*id);
            info!("Selected gamepad: {} ({})", name, id);
        }

        self.transition()
    }
}

impl GamepadSource<Collecting> {
    // Drain whatever gilrs has queued up
    fn collect_pending_events(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            if let Some(active_id) = self.active_gamepad {
                if id != active_id {
                    debug!("Skipping event from non-active gamepad: {:?}", id);
                    continue;
                }
            }
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: EventType) {
        match event {
            EventType::ButtonPressed(button, _) => {
                if let Some(input_id) = button_input_id(button) {
                    debug!("Button pressed: {}", input_id);
                    self.tracker.press(input_id);
                }
            }
            EventType::ButtonReleased(button, _) => {
                if let Some(input_id) = button_input_id(button) {
                    debug!("Button released: {}", input_id);
                    self.tracker.release(input_id);
                }
            }
            EventType::AxisChanged(axis, value, _) => {
                if let Some(input_id) = axis_input_id(axis) {
                    let value = apply_deadzone(value, self.settings.axis_deadzone);
                    self.sink.notify_event(ControlEvent::new(
                        input_id,
                        ControlEventType::ScalarChanged,
                        scale_axis(value),
                    ));
                }
            }
            EventType::ButtonRepeated(button, _) => {
                debug!("Button repeat ignored: {:?}", button);
            }
            EventType::Connected => info!("Gamepad connected"),
            EventType::Disconnected => warn!("Gamepad disconnected"),
            _ => {}
        }
    }

    pub async fn run_collection_loop(mut self, cancel: CancellationToken) {
        info!("Starting gamepad collection loop");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(POLL_INTERVAL) => self.collect_pending_events(),
            }
        }
        info!("Gamepad collection loop stopped");
    }
}

/// Handle for the gamepad source task.
pub struct GamepadSourceHandle {
    task_handle: JoinHandle<()>,
}

impl GamepadSourceHandle {
    /// Creates a gamepad source and spawns its poll loop; cancel the
    /// token to stop it.
    pub fn spawn(
        settings: Option<GamepadSourceSettings>,
        sink: Arc<dyn ControlEventSink>,
        tracker: Arc<ButtonStateTracker>,
        cancel: CancellationToken,
    ) -> Result<Self, GamepadSourceError> {
        let source = GamepadSource::create(settings, sink, tracker)?;
        let task_handle = tokio::spawn(async move {
            source.initialize().run_collection_loop(cancel).await;
        });
        Ok(Self { task_handle })
    }

    pub async fn join(self) {
        let _ = self.task_handle.await;
    }
}

// Stable input ids for the buttons we bind
fn button_input_id(button: Button) -> Option<&'static str> {
    match button {
        Button::South => Some("south"),
        Button::East => Some("east"),
        Button::West => Some("west"),
        Button::North => Some("north"),
        Button::Start => Some("start"),
        Button::Select => Some("select"),
        Button::LeftTrigger => Some("left-bumper"),
        Button::RightTrigger => Some("right-bumper"),
        Button::LeftThumb => Some("left-stick"),
        Button::RightThumb => Some("right-stick"),
        Button::DPadUp => Some("dpad-up"),
        Button::DPadDown => Some("dpad-down"),
        Button::DPadLeft => Some("dpad-left"),
        Button::DPadRight => Some("dpad-right"),
        Button::Mode => Some("guide"),
        _ => None,
    }
}

fn axis_input_id(axis: Axis) -> Option<&'static str> {
    match axis {
        Axis::LeftStickX => Some("left-x"),
        Axis::LeftStickY => Some("left-y"),
        Axis::RightStickX => Some("right-x"),
        Axis::RightStickY => Some("right-y"),
        Axis::LeftZ => Some("left-z"),
        Axis::RightZ => Some("right-z"),
        _ => None,
    }
}

// Rescale a -1.0..1.0 axis position onto the 0-255 calibration range
fn scale_axis(value: f32) -> u8 {
    (((value.clamp(-1.0, 1.0) + 1.0) / 2.0) * 255.0).round() as u8
}

// Apply deadzone to analog stick values, rescaling the live range
fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_scaling_covers_full_calibration_range() {
        assert_eq!(scale_axis(-1.0), 0);
        assert_eq!(scale_axis(0.0), 128);
        assert_eq!(scale_axis(1.0), 255);
        // Out-of-range values are clamped, not wrapped
        assert_eq!(scale_axis(-2.0), 0);
        assert_eq!(scale_axis(2.0), 255);
    }

    #[test]
    fn deadzone_zeroes_small_motion_and_rescales_the_rest() {
        assert_eq!(apply_deadzone(0.03, 0.05), 0.0);
        assert_eq!(apply_deadzone(-0.03, 0.05), 0.0);
        assert_eq!(apply_deadzone(1.0, 0.05), 1.0);
        assert_eq!(apply_deadzone(-1.0, 0.05), -1.0);
        // The live range starts at the deadzone edge
        assert_eq!(apply_deadzone(0.05, 0.05), 0.0);
    }

    #[test]
    fn every_bound_button_has_a_distinct_input_id() {
        let buttons = [
            Button::South,
            Button::East,
            Button::West,
            Button::North,
            Button::Start,
            Button::Select,
            Button::DPadUp,
            Button::DPadDown,
            Button::DPadLeft,
            Button::DPadRight,
        ];
        let mut seen = std::collections::HashSet::new();
        for button in buttons {
            let id = button_input_id(button).expect("bound button has an id");
            assert!(seen.insert(id), "duplicate input id: {id}");
        }
    }
}
