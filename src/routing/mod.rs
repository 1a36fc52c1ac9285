//! Event routing: declarative routes matched against incoming control
//! events, dispatching matched actions strictly in order.

pub mod router;
pub mod source;

// Re-exports for easier access
pub use router::{RouterError, RouterHandle};
pub use source::{
    EventRouteSource, FileRouteSource, RouteSourceError, RouteSourceFuture, StaticRouteSource,
};

use serde::{Deserialize, Serialize};

use crate::actions::ActionOptions;
use crate::control::{ControlEvent, ControlEventType};

/// Maps a control event to an action.
///
/// `trigger_above` and `trigger_below` are independent optional bounds
/// combined with AND semantics when both are present; an absent field
/// does not constrain on that dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRoute {
    /// The input id to watch out for
    pub input_id: String,

    /// If set, trigger only for events of the specified type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<ControlEventType>,

    /// If set, trigger only when the value is equal to or above this threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_above: Option<u8>,

    /// If set, trigger only when the value is below this threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_below: Option<u8>,

    /// The id (or alias) of the action to fire when triggered
    pub target_action: String,

    /// Options to pass to the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ActionOptions>,
}

impl EventRoute {
    /// Whether this route should fire for the given event.
    pub fn matches(&self, event: &ControlEvent) -> bool {
        if self.input_id != event.input_id {
            return false;
        }
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }
        if let Some(below) = self.trigger_below {
            if event.value >= below {
                return false;
            }
        }
        if let Some(above) = self.trigger_above {
            if event.value < above {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(input_id: &str) -> EventRoute {
        EventRoute {
            input_id: input_id.to_string(),
            event_type: None,
            trigger_above: None,
            trigger_below: None,
            target_action: "write-log".to_string(),
            options: None,
        }
    }

    fn scalar(input_id: &str, value: u8) -> ControlEvent {
        ControlEvent::new(input_id, ControlEventType::ScalarChanged, value)
    }

    #[test]
    fn unconstrained_route_matches_on_input_id_alone() {
        let route = route("knob-1");
        assert!(route.matches(&scalar("knob-1", 0)));
        assert!(route.matches(&ControlEvent::new(
            "knob-1",
            ControlEventType::LongPress,
            0xFF
        )));
        assert!(!route.matches(&scalar("knob-2", 0)));
    }

    #[test]
    fn event_type_constraint_is_exact() {
        let mut route = route("pad-1");
        route.event_type = Some(ControlEventType::ShortPress);
        assert!(route.matches(&ControlEvent::new("pad-1", ControlEventType::ShortPress, 0)));
        assert!(!route.matches(&ControlEvent::new("pad-1", ControlEventType::LongPress, 0)));
    }

    #[test]
    fn trigger_above_is_inclusive() {
        let mut route = route("knob-1");
        route.trigger_above = Some(0x0F);
        assert!(!route.matches(&scalar("knob-1", 0x0E)));
        assert!(route.matches(&scalar("knob-1", 0x0F)));
        assert!(route.matches(&scalar("knob-1", 0xFF)));
    }

    #[test]
    fn trigger_below_is_exclusive() {
        let mut route = route("knob-1");
        route.trigger_below = Some(0x10);
        assert!(route.matches(&scalar("knob-1", 0x0F)));
        assert!(!route.matches(&scalar("knob-1", 0x10)));
    }

    #[test]
    fn both_bounds_combine_with_and_semantics() {
        let mut route = route("knob-1");
        route.trigger_above = Some(0x10);
        route.trigger_below = Some(0x20);
        assert!(!route.matches(&scalar("knob-1", 0x0F)));
        assert!(route.matches(&scalar("knob-1", 0x10)));
        assert!(route.matches(&scalar("knob-1", 0x1F)));
        assert!(!route.matches(&scalar("knob-1", 0x20)));
    }
}
