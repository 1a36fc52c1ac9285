//! Action execution: the executor boundary consumed by the event router,
//! plus the explicit registry that resolves action ids and aliases.

pub mod registry;

// Re-exports for easier access
pub use registry::{ActionDescriptor, ActionRegistry, WriteLogAction};

use crate::control::ControlEvent;
use std::future::Future;
use std::pin::Pin;

/// Opaque configuration blob carried by a route and handed to its action.
pub type ActionOptions = toml::Value;

/// Boxed future returned across the action trait objects.
pub type ActionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// Action errors
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Invalid action options: {0}")]
    InvalidOptions(#[from] toml::de::Error),

    #[error("Action failed: {0}")]
    Failed(String),
}

/// Context passed to an action when it runs.
pub struct ActionContext<'a> {
    /// The id (or alias) the action was invoked under
    pub target_action: &'a str,
    /// Options from the route that fired, if any
    pub options: Option<&'a ActionOptions>,
    /// The control event which caused this execution, if any
    pub source_event: Option<&'a ControlEvent>,
}

/// A single executable action.
pub trait Action: Send + Sync {
    fn execute<'a>(&'a self, context: ActionContext<'a>) -> ActionFuture<'a, Result<(), ActionError>>;
}

/// An object capable of executing actions.
///
/// Implementations resolve the action id (including aliases), run the
/// action, and guarantee that no failure propagates to the caller.
pub trait ActionExecutor: Send + Sync {
    /// Executes the specified action to completion.
    fn execute<'a>(
        &'a self,
        action_id: &'a str,
        options: Option<&'a ActionOptions>,
        source_event: Option<&'a ControlEvent>,
    ) -> ActionFuture<'a, ()>;
}
