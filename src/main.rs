pub mod actions;
pub mod control;
pub mod routing;

use crate::actions::ActionRegistry;
use crate::control::{ButtonStateTracker, EventCollector, GamepadSourceHandle};
use crate::routing::{EventRouteSource, FileRouteSource, RouterHandle};
use color_eyre::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

// Timeout for each wait on the collector; keeps the listen loop
// responsive to shutdown
const LISTEN_WAIT_TIMEOUT_MS: u64 = 500;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    // One cooperative cancellation signal stops every component loop
    let cancel = CancellationToken::new();

    // Shared sink and press tracker, fed by all producers
    let sink = Arc::new(EventCollector::new());
    let tracker = Arc::new(ButtonStateTracker::new(sink.clone()));

    let _pump_task = sink.start(cancel.clone())?;
    let _tracker_task = tracker.start(cancel.clone());

    // Gamepad producer; a missing pad is not fatal, mapped inputs can
    // also arrive through any other adapter sharing the sink
    let _gamepad = match GamepadSourceHandle::spawn(
        None,
        sink.clone(),
        tracker.clone(),
        cancel.clone(),
    ) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Gamepad source unavailable: {}", e);
            None
        }
    };

    let executor = Arc::new(ActionRegistry::with_builtin_actions());
    let route_file = FileRouteSource::new(FileRouteSource::default_path());
    info!("Route file: {}", route_file.path().display());
    let route_sources: Vec<Box<dyn EventRouteSource>> = vec![Box::new(route_file)];
    let mut router = RouterHandle::spawn(route_sources, executor, cancel.clone());

    info!("Listening for events");
    info!("Use any of your mapped inputs to execute actions");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                cancel.cancel();
                break;
            }
            result = sink.wait_for_input(LISTEN_WAIT_TIMEOUT_MS) => match result {
                Ok(Some(event)) => router.route(event),
                Ok(None) => {}
                Err(e) => {
                    error!("Event collection failed: {}", e);
                    cancel.cancel();
                    break;
                }
            }
        }
    }

    // Let in-flight dispatch finish before exiting
    router.shutdown().await?;
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
