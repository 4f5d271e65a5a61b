//! Per-request state shared between stages.

use ariadne_core::{ContainerRequest, ContainerResponse, SharedInflector};
use http::Method;

/// What pre-match filters see and modify.
///
/// A filter may replace the request or abort processing by setting a
/// response. Only the first response set is kept.
#[derive(Debug)]
pub struct FilterContext {
    request: ContainerRequest,
    response: Option<ContainerResponse>,
}

impl FilterContext {
    /// Wraps a request.
    pub const fn new(request: ContainerRequest) -> Self {
        Self {
            request,
            response: None,
        }
    }

    /// Returns the current request.
    pub const fn request(&self) -> &ContainerRequest {
        &self.request
    }

    /// Returns the current request for in-place modification.
    pub fn request_mut(&mut self) -> &mut ContainerRequest {
        &mut self.request
    }

    /// Replaces the request, returning the previous one.
    pub fn set_request(&mut self, request: ContainerRequest) -> ContainerRequest {
        std::mem::replace(&mut self.request, request)
    }

    /// Aborts processing with `response`.
    ///
    /// Returns `false` and drops `response` if one was already set.
    pub fn set_response(&mut self, response: ContainerResponse) -> bool {
        if self.response.is_some() {
            return false;
        }
        self.response = Some(response);
        true
    }

    /// Returns the abort response, if any.
    pub const fn response(&self) -> Option<&ContainerResponse> {
        self.response.as_ref()
    }

    /// Returns `true` once a filter has set a response.
    pub const fn is_aborted(&self) -> bool {
        self.response.is_some()
    }

    /// Splits the context into the request and the abort response.
    pub fn into_parts(self) -> (ContainerRequest, Option<ContainerResponse>) {
        (self.request, self.response)
    }
}

/// Outcome of resource matching, published by the routing stage.
#[derive(Clone)]
pub enum RouteResolution {
    /// A resource method serves the request.
    Inflector(SharedInflector),
    /// The path matched but the method is not served.
    MethodNotAllowed {
        /// Methods the matched resource serves.
        allowed: Vec<Method>,
    },
    /// Nothing matched.
    NotFound,
}

impl std::fmt::Debug for RouteResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inflector(inflector) => f.debug_tuple("Inflector").field(&inflector.name()).finish(),
            Self::MethodNotAllowed { allowed } => f
                .debug_struct("MethodNotAllowed")
                .field("allowed", allowed)
                .finish(),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Scratch state of the accepting stages of one request.
#[derive(Debug, Default)]
pub struct AcceptingContext {
    resolution: Option<RouteResolution>,
}

impl AcceptingContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the routing outcome, replacing any earlier one.
    pub fn publish(&mut self, resolution: RouteResolution) {
        self.resolution = Some(resolution);
    }

    /// Returns the routing outcome, if routing has run.
    pub const fn resolution(&self) -> Option<&RouteResolution> {
        self.resolution.as_ref()
    }

    /// Removes and returns the routing outcome.
    pub fn take(&mut self) -> Option<RouteResolution> {
        self.resolution.take()
    }

    /// Removes the selected inflector. Other outcomes stay in place so the
    /// driver can turn them into a 404 or 405.
    pub fn take_inflector(&mut self) -> Option<SharedInflector> {
        match self.resolution.take() {
            Some(RouteResolution::Inflector(inflector)) => Some(inflector),
            other => {
                self.resolution = other;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ariadne_core::inflector_fn;
    use http::StatusCode;

    #[test]
    fn test_first_response_wins() {
        let mut ctx = FilterContext::new(ContainerRequest::get("/"));
        assert!(!ctx.is_aborted());

        assert!(ctx.set_response(ContainerResponse::new(StatusCode::UNAUTHORIZED)));
        assert!(!ctx.set_response(ContainerResponse::new(StatusCode::FORBIDDEN)));

        let (_, response) = ctx.into_parts();
        assert_eq!(response.unwrap().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_set_request_returns_previous() {
        let mut ctx = FilterContext::new(ContainerRequest::get("/old"));
        let previous = ctx.set_request(ContainerRequest::get("/new"));
        assert_eq!(previous.path(), "/old");
        assert_eq!(ctx.request().path(), "/new");
    }

    #[test]
    fn test_take_inflector_keeps_other_outcomes() {
        let mut ctx = AcceptingContext::new();
        ctx.publish(RouteResolution::MethodNotAllowed {
            allowed: vec![Method::GET],
        });
        assert!(ctx.take_inflector().is_none());
        assert!(matches!(
            ctx.resolution(),
            Some(RouteResolution::MethodNotAllowed { .. })
        ));

        let inflector = inflector_fn("ok", |_| async { Ok(ContainerResponse::ok()) });
        ctx.publish(RouteResolution::Inflector(inflector));
        assert_eq!(ctx.take_inflector().unwrap().name(), "ok");
        assert!(ctx.resolution().is_none());
    }
}
