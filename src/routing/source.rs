//! Sources of event routes.
//!
//! The router merges every configured source once, lazily, on the first
//! event it processes; route editing tools own the files, the router only
//! reads a snapshot.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tracing::{debug, info};

use crate::routing::EventRoute;

/// Boxed future returned by [`EventRouteSource::get_routes`].
pub type RouteSourceFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<EventRoute>, RouteSourceError>> + Send + 'a>>;

// Route source errors
#[derive(Debug, thiserror::Error)]
pub enum RouteSourceError {
    #[error("Failed to read route file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse route file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A source of event routes.
pub trait EventRouteSource: Send + Sync {
    /// Gets the routes registered with this source, in stored order.
    /// Invoked once per router lifetime.
    fn get_routes(&self) -> RouteSourceFuture<'_>;
}

/// Routes held directly in memory, for programmatic wiring.
pub struct StaticRouteSource {
    routes: Vec<EventRoute>,
}

impl StaticRouteSource {
    pub fn new(routes: Vec<EventRoute>) -> Self {
        Self { routes }
    }
}

impl EventRouteSource for StaticRouteSource {
    fn get_routes(&self) -> RouteSourceFuture<'_> {
        let routes = self.routes.clone();
        Box::pin(async move { Ok(routes) })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RouteFile {
    #[serde(default)]
    routes: Vec<EventRoute>,
}

/// Sources routes from a TOML file on disk.
///
/// A missing file is an empty route set, not an error; the mapping tools
/// create the file on first use.
pub struct FileRouteSource {
    path: PathBuf,
}

impl FileRouteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location of the route file under the user config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("huedeck")
            .join("routes.toml")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<EventRoute>, RouteSourceError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "No route file at {}, using an empty route set",
                    self.path.display()
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let file: RouteFile = toml::from_str(&content)?;
        info!("Loaded {} routes from {}", file.routes.len(), self.path.display());
        Ok(file.routes)
    }
}

impl EventRouteSource for FileRouteSource {
    fn get_routes(&self) -> RouteSourceFuture<'_> {
        Box::pin(self.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlEventType;

    #[test]
    fn route_file_deserializes_optional_fields() {
        let content = r#"
            [[routes]]
            input_id = "knob-1"
            event_type = "scalar-changed"
            trigger_above = 16
            target_action = "write-log"

            [routes.options]
            items = ["knob moved"]

            [[routes]]
            input_id = "south"
            target_action = "log"
        "#;

        let file: RouteFile = toml::from_str(content).expect("valid route file");
        assert_eq!(file.routes.len(), 2);

        let first = &file.routes[0];
        assert_eq!(first.input_id, "knob-1");
        assert_eq!(first.event_type, Some(ControlEventType::ScalarChanged));
        assert_eq!(first.trigger_above, Some(16));
        assert_eq!(first.trigger_below, None);
        assert!(first.options.is_some());

        let second = &file.routes[1];
        assert_eq!(second.event_type, None);
        assert_eq!(second.target_action, "log");
        assert!(second.options.is_none());
    }

    #[test]
    fn empty_file_is_an_empty_route_set() {
        let file: RouteFile = toml::from_str("").expect("empty file parses");
        assert!(file.routes.is_empty());
    }

    #[tokio::test]
    async fn missing_file_yields_no_routes() {
        let source = FileRouteSource::new("/nonexistent/huedeck/routes.toml");
        let routes = source.get_routes().await.expect("missing file is not an error");
        assert!(routes.is_empty());
    }
}
