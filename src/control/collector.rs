//! Collecting sink: a single logical FIFO of control events with
//! debouncing and pending-event coalescing, consumed by one waiter at a
//! time via [`EventCollector::wait_for_input`].
//!
//! Rapid repeats of the same `(input, type)` within the cooloff window are
//! held back as a single "pending" event and flushed by the pump once the
//! window has passed. A coalesced event is positioned at its flush time,
//! which may be after later distinct-input events - this reordering is
//! intentional.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::control::{ControlEvent, ControlEventSink};

// Cooloff period during which duplicate events are coalesced
const EVENT_COOLOFF: Duration = Duration::from_millis(100);
// How frequently the pump flushes pending events and expires waits
const PENDING_PUMP_INTERVAL: Duration = Duration::from_millis(50);
// How long a consumer waits for the sink to be started before giving up
const START_GRACE: Duration = Duration::from_millis(1000);

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("The sink is not started")]
    NotStarted,

    #[error("This sink is already started")]
    AlreadyStarted,

    #[error("Another wait is already pending on this sink")]
    WaitPending,
}

// The single outstanding consumer wait
struct Waiter {
    resolve: oneshot::Sender<Option<ControlEvent>>,
    deadline: Option<Instant>,
}

#[derive(Default)]
struct CollectorState {
    started: bool,
    queue: VecDeque<ControlEvent>,
    last_event: Option<(ControlEvent, Instant)>,
    pending_event: Option<(ControlEvent, Instant)>,
    waiter: Option<Waiter>,
}

/// Collects control events and provides an async method of processing
/// them.
///
/// All producers share one instance behind an `Arc`; a single mutex
/// guards the queue, the cooloff bookkeeping, and the waiter slot.
pub struct EventCollector {
    state: Mutex<CollectorState>,
    started_tx: watch::Sender<bool>,
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EventCollector {
    pub fn new() -> Self {
        let (started_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(CollectorState::default()),
            started_tx,
        }
    }

    fn state(&self) -> MutexGuard<'_, CollectorState> {
        // The state stays consistent even if a caller panicked mid-call
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the sink's pump. The sink must be started exactly once
    /// before events can be consumed; cancel the token to stop it.
    pub fn start(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, CollectorError> {
        {
            let mut state = self.state();
            if state.started {
                return Err(CollectorError::AlreadyStarted);
            }
            state.started = true;
        }
        // send_replace stores the value even while no receiver exists
        self.started_tx.send_replace(true);
        info!("Event collector started");

        let sink = Arc::clone(self);
        Ok(tokio::spawn(async move { sink.run_pump(cancel).await }))
    }

    /// Returns the next collected event, or `None` once `timeout_ms` has
    /// elapsed without one. Set `timeout_ms` to 0 to wait indefinitely.
    ///
    /// Only one wait may be outstanding at a time; a second concurrent
    /// call fails with [`CollectorError::WaitPending`] rather than
    /// silently displacing the first.
    pub async fn wait_for_input(
        &self,
        timeout_ms: u64,
    ) -> Result<Option<ControlEvent>, CollectorError> {
        // Wait for the sink to be started, up to the grace period
        let mut started_rx = self.started_tx.subscribe();
        match tokio::time::timeout(START_GRACE, started_rx.wait_for(|started| *started)).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) | Err(_) => return Err(CollectorError::NotStarted),
        }

        let receiver = {
            let mut state = self.state();
            if !state.started {
                // The sink stopped between the started gate and the lock;
                // the pump is gone and would never resolve this wait
                return Err(CollectorError::NotStarted);
            }
            if let Some(event) = state.queue.pop_front() {
                return Ok(Some(event));
            }
            if state.waiter.is_some() {
                return Err(CollectorError::WaitPending);
            }

            let (resolve, receiver) = oneshot::channel();
            let deadline =
                (timeout_ms > 0).then(|| Instant::now() + Duration::from_millis(timeout_ms));
            state.waiter = Some(Waiter { resolve, deadline });
            receiver
        };

        // Resolved by notify_event, the pump (data or timeout), or shutdown
        Ok(receiver.await.unwrap_or(None))
    }

    // Hands the queue head to the outstanding waiter, if there is one.
    // Must be called with the state lock held.
    fn satisfy_waiter(state: &mut CollectorState) {
        if state.waiter.is_none() {
            return;
        }
        let Some(head) = state.queue.pop_front() else {
            return;
        };
        if let Some(waiter) = state.waiter.take() {
            if let Err(Some(event)) = waiter.resolve.send(Some(head)) {
                // The wait future was dropped; keep the event for the next consumer
                state.queue.push_front(event);
            }
        }
    }

    async fn run_pump(&self, cancel: CancellationToken) {
        debug!("Event collector: pump started");
        let mut tick = interval(PENDING_PUMP_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => self.pump_once(),
            }
        }

        debug!("Event collector: pump stopped");
        let mut state = self.state();
        if let Some(waiter) = state.waiter.take() {
            // Force completion of the outstanding wait rather than hang
            let _ = waiter.resolve.send(None);
        }
        state.started = false;
        drop(state);
        self.started_tx.send_replace(false);
    }

    fn pump_once(&self) {
        let now = Instant::now();
        let mut state = self.state();

        // Flush a pending event that has aged past the cooloff window
        let pending_due = state
            .pending_event
            .as_ref()
            .is_some_and(|(_, pending_at)| now.duration_since(*pending_at) >= EVENT_COOLOFF);
        if pending_due {
            if let Some((pending, _)) = state.pending_event.take() {
                debug!("Event collector: pending => queue: {}", pending.input_id);
                state.queue.push_back(pending.clone());
                state.last_event = Some((pending, now));
                Self::satisfy_waiter(&mut state);
            }
        }

        // Expire the outstanding wait if its timeout has elapsed
        let wait_due = state
            .waiter
            .as_ref()
            .and_then(|waiter| waiter.deadline)
            .is_some_and(|deadline| now >= deadline);
        if wait_due {
            if let Some(waiter) = state.waiter.take() {
                let _ = waiter.resolve.send(None);
            }
        }
    }
}

impl ControlEventSink for EventCollector {
    fn notify_event(&self, event: ControlEvent) {
        if event.input_id.is_empty() {
            warn!("Discarding control event with empty input id");
            return;
        }

        let now = Instant::now();
        let mut state = self.state();

        // A new event of the same kind for the same input as the last
        // delivered one, still within the cooloff period? Hold it back
        // instead of queueing it.
        if let Some((last, delivered_at)) = &state.last_event {
            if event.same_input(last) && now.duration_since(*delivered_at) < EVENT_COOLOFF {
                debug!("Event collector: pending: {}", event.input_id);
                state.pending_event = Some((event, now));
                return;
            }
        }

        if let Some((pending, pending_at)) = state.pending_event.take() {
            if !event.same_input(&pending) {
                // The new event is for a different input - flush the
                // pending one into the queue first
                debug!("Event collector: pending => queue: {}", pending.input_id);
                state.queue.push_back(pending);
            } else if now.duration_since(pending_at) < EVENT_COOLOFF {
                // Still hot: replace the pending event and keep holding it
                debug!("Event collector: pending hot: {}", event.input_id);
                state.pending_event = Some((event, now));
                return;
            } else {
                // Aged out; the pump flushes it on its next tick
                state.pending_event = Some((pending, pending_at));
            }
        }

        state.queue.push_back(event.clone());
        state.last_event = Some((event, now));
        Self::satisfy_waiter(&mut state);
    }
}
