//! Control input handling: the event model, the collecting sink with
//! debouncing, the press/long-press state tracker, and the gamepad source.
//!
//! Producers (gamepad, network, anything else) push raw signals into a
//! shared [`ControlEventSink`] and/or a [`ButtonStateTracker`]; a driving
//! loop pulls debounced events back out via `wait_for_input`.

pub mod collector;
pub mod gamepad;
pub mod tracker;

// Re-exports for easier access
pub use collector::{CollectorError, EventCollector};
pub use gamepad::{GamepadSourceError, GamepadSourceHandle, GamepadSourceSettings};
pub use tracker::ButtonStateTracker;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of signal a control event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlEventType {
    /// A value (knob, slider, axis) has changed
    ScalarChanged,
    /// A button style input was briefly pressed and released
    ShortPress,
    /// A button style input was pressed and held for a period
    LongPress,
}

/// A discrete event received from an input device, used to drive actions
/// via routes.
///
/// Immutable once constructed; carries no identity beyond its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEvent {
    /// ID of the input this event was emitted from. Never empty.
    pub input_id: String,
    /// The type of this event
    pub event_type: ControlEventType,
    /// The calibration value associated with this event (0-255)
    pub value: u8,
}

impl ControlEvent {
    pub fn new(input_id: impl Into<String>, event_type: ControlEventType, value: u8) -> Self {
        Self {
            input_id: input_id.into(),
            event_type,
            value,
        }
    }

    /// True when `other` is for the same logical input as this event,
    /// which is the identity the collector coalesces on.
    pub fn same_input(&self, other: &ControlEvent) -> bool {
        self.input_id == other.input_id && self.event_type == other.event_type
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event: {:?}, Input: {}, Value: {:#04x}",
            self.event_type, self.input_id, self.value
        )
    }
}

/// A sink for control events.
///
/// Any adapter integrates by calling [`notify_event`](Self::notify_event)
/// on a shared sink; the pipeline is agnostic to the transport producing
/// the raw signals. The call never blocks.
pub trait ControlEventSink: Send + Sync {
    /// Notifies the sink that a new event is available.
    fn notify_event(&self, event: ControlEvent);
}
