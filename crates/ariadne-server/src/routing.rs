//! The resource-matching stage.

use std::fmt;
use std::sync::Arc;

use ariadne_core::{ContainerRequest, ProcessingResult, SharedInflector};
use ariadne_router::{ResourceRouter, RouteOutcome};
use tracing::debug;

use crate::context::{AcceptingContext, RouteResolution};
use crate::stage::{Continuation, Stage};

/// Matches the request path against the resource tree.
///
/// The stage strips the base path, routes what remains and publishes the
/// outcome into the [`AcceptingContext`]. On a match the request is replaced
/// by one carrying the captured parameters and matched templates. The stage
/// always proceeds; the extraction stage decides what the outcome means.
#[derive(Clone)]
pub struct RoutingStage {
    router: Arc<ResourceRouter<SharedInflector>>,
    base_path: Option<String>,
}

impl RoutingStage {
    /// Creates the stage. `base_path` must already be normalized to
    /// `/segment[/segment...]`.
    pub const fn new(
        router: Arc<ResourceRouter<SharedInflector>>,
        base_path: Option<String>,
    ) -> Self {
        Self { router, base_path }
    }

    /// Returns the router.
    pub fn router(&self) -> &ResourceRouter<SharedInflector> {
        &self.router
    }

    fn strip_base<'p>(&self, path: &'p str) -> Option<&'p str> {
        let Some(base) = &self.base_path else {
            return Some(path);
        };
        match path.strip_prefix(base.as_str())? {
            "" => Some("/"),
            rest if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }
}

impl Stage for RoutingStage {
    fn name(&self) -> &'static str {
        "routing"
    }

    fn apply(
        &self,
        request: ContainerRequest,
        ctx: &mut AcceptingContext,
    ) -> ProcessingResult<Continuation> {
        let Some(path) = self.strip_base(request.path()) else {
            debug!(path = request.path(), "Path outside base path");
            ctx.publish(RouteResolution::NotFound);
            return Ok(Continuation::Proceed(request));
        };

        let resolution = match self.router.route(request.method(), path) {
            RouteOutcome::Matched(found) => {
                debug!(
                    inflector = found.handler.name(),
                    templates = ?found.matched,
                    "Resource matched"
                );
                ctx.publish(RouteResolution::Inflector(found.handler));
                let request = request.with_route(found.params, found.matched, "");
                return Ok(Continuation::Proceed(request));
            }
            RouteOutcome::MethodNotAllowed { allowed } => {
                RouteResolution::MethodNotAllowed { allowed }
            }
            RouteOutcome::NotFound => RouteResolution::NotFound,
        };

        debug!(resolution = ?resolution, "No resource method selected");
        ctx.publish(resolution);
        Ok(Continuation::Proceed(request))
    }
}

impl fmt::Debug for RoutingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingStage")
            .field("resources", &self.router.len())
            .field("base_path", &self.base_path)
            .finish()
    }
}
