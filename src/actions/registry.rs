//! Explicit start-time registry mapping action ids and aliases to their
//! implementations.

use chrono::Local;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::actions::{Action, ActionContext, ActionError, ActionFuture, ActionOptions};
use crate::control::ControlEvent;

/// Describes a registered action.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    /// The id of the action
    pub id: String,
    /// A human-readable description of the action
    pub description: String,
    /// Aliases that can also be used to execute this action
    pub aliases: Vec<String>,
}

impl ActionDescriptor {
    pub fn new(id: &str, description: &str, aliases: &[&str]) -> Self {
        Self {
            id: id.to_lowercase(),
            description: description.to_string(),
            aliases: aliases.iter().map(|alias| alias.to_lowercase()).collect(),
        }
    }
}

struct RegisteredAction {
    descriptor: ActionDescriptor,
    action: Box<dyn Action>,
}

/// Executes actions registered at startup.
///
/// Resolution is case-insensitive over ids and aliases. An unknown action
/// or a failing action is logged and absorbed; nothing propagates to the
/// dispatch loop driving the executor.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<RegisteredAction>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in actions.
    pub fn with_builtin_actions() -> Self {
        let mut registry = Self::new();
        registry.register(WriteLogAction::descriptor(), Box::new(WriteLogAction));
        registry
    }

    pub fn register(&mut self, descriptor: ActionDescriptor, action: Box<dyn Action>) {
        debug!("Registered action '{}'", descriptor.id);
        self.actions.push(RegisteredAction { descriptor, action });
    }

    /// All registered action descriptors, in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.actions.iter().map(|registered| &registered.descriptor)
    }

    fn resolve(&self, name: &str) -> Option<&RegisteredAction> {
        let name = name.to_lowercase();
        self.actions.iter().find(|registered| {
            registered.descriptor.id == name
                || registered.descriptor.aliases.iter().any(|alias| *alias == name)
        })
    }
}

impl super::ActionExecutor for ActionRegistry {
    fn execute<'a>(
        &'a self,
        action_id: &'a str,
        options: Option<&'a ActionOptions>,
        source_event: Option<&'a ControlEvent>,
    ) -> ActionFuture<'a, ()> {
        Box::pin(async move {
            let Some(registered) = self.resolve(action_id) else {
                warn!("Unknown action '{}'", action_id);
                return;
            };

            info!("Executing action '{}'", registered.descriptor.id);
            let context = ActionContext {
                target_action: action_id,
                options,
                source_event,
            };
            match registered.action.execute(context).await {
                Ok(()) => debug!("Finished executing action '{}'", registered.descriptor.id),
                Err(e) => error!(
                    "There was a problem running action '{}': {}",
                    registered.descriptor.id, e
                ),
            }
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WriteLogOptions {
    /// Items to write to the log
    #[serde(default)]
    pub items: Vec<String>,
}

/// Writes route-configured items, or the source event itself, to the log.
pub struct WriteLogAction;

impl WriteLogAction {
    pub fn descriptor() -> ActionDescriptor {
        ActionDescriptor::new("write-log", "Write a Log entry", &["log", "debug", "dump"])
    }
}

impl Action for WriteLogAction {
    fn execute<'a>(&'a self, context: ActionContext<'a>) -> ActionFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            let options: WriteLogOptions = match context.options {
                Some(value) => value.clone().try_into()?,
                None => WriteLogOptions::default(),
            };

            let stamp = Local::now().format("%H:%M:%S%.3f");
            if options.items.is_empty() {
                match context.source_event {
                    Some(event) => info!("[{}] {}", stamp, event),
                    None => info!("[{}] Action executed", stamp),
                }
            } else {
                for item in &options.items {
                    info!("[{}] {}", stamp, item);
                }
            }
            Ok(())
        })
    }
}
