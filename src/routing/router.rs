//! The event router: accepts events without blocking, matches them
//! against the cached route table, and dispatches matched actions
//! strictly in order.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::actions::ActionExecutor;
use crate::control::ControlEvent;
use crate::routing::{EventRoute, EventRouteSource};

// Router errors
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("Router task panicked: {0}")]
    TaskPanicked(String),
}

struct EventRouter {
    events: mpsc::UnboundedReceiver<ControlEvent>,
    route_sources: Vec<Box<dyn EventRouteSource>>,
    executor: Arc<dyn ActionExecutor>,
    // Loaded lazily on the first event, then cached for the router's life
    routes: Option<Vec<EventRoute>>,
}

impl EventRouter {
    async fn run(mut self, cancel: CancellationToken) {
        debug!("Event router: queue monitor started");
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => break, // every handle has been dropped
                },
            };
            self.dispatch(event).await;
        }
        debug!("Event router: queue monitor stopped");
    }

    async fn dispatch(&mut self, event: ControlEvent) {
        if self.routes.is_none() {
            self.routes = Some(self.load_routes().await);
        }
        let routes = self.routes.as_deref().unwrap_or_default();

        debug!("Event router: match routes for '{}'", event);
        let matched: Vec<&EventRoute> = routes
            .iter()
            .filter(|route| route.matches(&event))
            .collect();

        if matched.is_empty() {
            debug!("Event router: no matching routes");
            return;
        }
        debug!("Event router: {} routes matched", matched.len());

        // One at a time, in the route table's stored order: ordering
        // sensitive action chains rely on the previous action having
        // finished before the next begins.
        for route in matched {
            self.executor
                .execute(&route.target_action, route.options.as_ref(), Some(&event))
                .await;
        }
    }

    async fn load_routes(&self) -> Vec<EventRoute> {
        debug!("Event router: finding routes");
        let mut routes = Vec::new();
        for source in &self.route_sources {
            match source.get_routes().await {
                Ok(mut found) => routes.append(&mut found),
                Err(e) => error!("Route source failed, contributing no routes: {}", e),
            }
        }
        info!("Event router: found {} routes", routes.len());
        routes
    }
}

/// Handle for the router task.
///
/// [`route`](Self::route) never blocks the caller; events queue on an
/// unbounded channel whose wake-on-send gives the dispatch loop its
/// liveness (no separate safety-net poll needed).
pub struct RouterHandle {
    event_sender: mpsc::UnboundedSender<ControlEvent>,
    task_handle: Option<JoinHandle<()>>,
}

impl RouterHandle {
    /// Spawns the dispatch loop; cancel the token to stop it. In-flight
    /// action dispatch is allowed to finish.
    pub fn spawn(
        route_sources: Vec<Box<dyn EventRouteSource>>,
        executor: Arc<dyn ActionExecutor>,
        cancel: CancellationToken,
    ) -> Self {
        let (event_sender, events) = mpsc::unbounded_channel();
        let router = EventRouter {
            events,
            route_sources,
            executor,
            routes: None,
        };
        let task_handle = tokio::spawn(router.run(cancel));
        info!("Event router started");

        Self {
            event_sender,
            task_handle: Some(task_handle),
        }
    }

    /// Accepts an event and queues it for routing. Never blocks.
    pub fn route(&self, event: ControlEvent) {
        if self.event_sender.send(event).is_err() {
            warn!("Event router task is gone, dropping event");
        }
    }

    /// Waits for the router task to finish after cancellation.
    pub async fn shutdown(&mut self) -> Result<(), RouterError> {
        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| RouterError::TaskPanicked(e.to_string()))?;
        }
        Ok(())
    }
}
