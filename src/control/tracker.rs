//! Tracks the held status of a collection of button style inputs,
//! emitting short-press and long-press events into a shared sink.
//!
//! Designed for raw press/release producers (gamepad buttons, pads on a
//! MIDI surface, keys over the network) that have no press semantics of
//! their own.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::control::{ControlEvent, ControlEventSink, ControlEventType};

// How long an input must be held before it becomes a 'long press'
const LONG_PRESS_DURATION: Duration = Duration::from_millis(1000);
// How frequently held inputs are checked for due long presses
const TICK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct TrackerState {
    held: HashMap<String, Instant>,
    long_pressed: HashSet<String>,
}

/// Converts raw press/release signals per input into discrete
/// short-press / long-press events.
///
/// `press` and `release` may be called from any number of producer
/// threads concurrently with the tick loop; one lock guards the held set
/// and the long-pressed set. None of the operations fail - malformed or
/// duplicate calls are silently absorbed.
pub struct ButtonStateTracker {
    sink: Arc<dyn ControlEventSink>,
    state: Mutex<TrackerState>,
}

impl ButtonStateTracker {
    pub fn new(sink: Arc<dyn ControlEventSink>) -> Self {
        Self {
            sink,
            state: Mutex::new(TrackerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Captures that a given input has just been pressed down.
    pub fn press(&self, id: &str) {
        let mut state = self.state();
        if state.held.contains_key(id) {
            // Duplicate press notification from a flaky source
            return;
        }
        state.held.insert(id.to_string(), Instant::now());
    }

    /// Captures that a given input has just been released.
    pub fn release(&self, id: &str) {
        let emit_short_press = {
            let mut state = self.state();
            if state.held.remove(id).is_none() {
                return;
            }
            // If a long press already fired for this input, don't refire
            !state.long_pressed.remove(id)
        };

        if emit_short_press {
            self.sink
                .notify_event(ControlEvent::new(id, ControlEventType::ShortPress, 0));
        }
    }

    /// Sends out any long press events that have become due.
    pub fn send_pending_long_press_events(&self) {
        let mut due = Vec::new();
        {
            let mut state = self.state();
            let now = Instant::now();
            let TrackerState { held, long_pressed } = &mut *state;
            for (id, pressed_at) in held.iter() {
                if !long_pressed.contains(id)
                    && now.duration_since(*pressed_at) > LONG_PRESS_DURATION
                {
                    long_pressed.insert(id.clone());
                    due.push(id.clone());
                }
            }
        }

        // Emit outside the state lock
        for id in due {
            debug!("Long press fired for input '{}'", id);
            self.sink
                .notify_event(ControlEvent::new(id, ControlEventType::LongPress, 0));
        }
    }

    /// Spawns the tick loop; cancel the token to stop it.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            debug!("Button state tracker: tick loop started");
            let mut tick = interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => tracker.send_pending_long_press_events(),
                }
            }
            debug!("Button state tracker: tick loop stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ControlEvent>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<ControlEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ControlEventSink for RecordingSink {
        fn notify_event(&self, event: ControlEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn started_tracker() -> (Arc<ButtonStateTracker>, Arc<RecordingSink>, CancellationToken) {
        let sink = Arc::new(RecordingSink::default());
        let tracker = Arc::new(ButtonStateTracker::new(sink.clone()));
        let cancel = CancellationToken::new();
        tracker.start(cancel.clone());
        (tracker, sink, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn short_press_emitted_on_release_within_threshold() {
        let (tracker, sink, _cancel) = started_tracker();

        tracker.press("a");
        tokio::time::sleep(Duration::from_millis(300)).await;
        tracker.release("a");

        // No long press may fire later either
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(
            sink.events(),
            vec![ControlEvent::new("a", ControlEventType::ShortPress, 0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn held_input_emits_exactly_one_long_press() {
        let (tracker, sink, _cancel) = started_tracker();

        tracker.press("a");
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(
            sink.events(),
            vec![ControlEvent::new("a", ControlEventType::LongPress, 0)]
        );

        // Still held: no refire
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(sink.events().len(), 1);

        // Releasing after a long press emits nothing further
        tracker.release("a");
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_press_keeps_original_press_time() {
        let (tracker, sink, _cancel) = started_tracker();

        tracker.press("a");
        tokio::time::sleep(Duration::from_millis(600)).await;
        tracker.press("a");
        tokio::time::sleep(Duration::from_millis(500)).await;

        // 1100ms since the first press: the long press is due
        assert_eq!(
            sink.events(),
            vec![ControlEvent::new("a", ControlEventType::LongPress, 0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn release_without_press_is_absorbed() {
        let (tracker, sink, _cancel) = started_tracker();

        tracker.release("ghost");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.events().is_empty());
    }
}
