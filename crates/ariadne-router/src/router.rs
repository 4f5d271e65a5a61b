//! Hierarchical resource matching.
//!
//! [`ResourceRouter`] walks the resource tree depth first. At each level the
//! candidates are tried most specific first; a candidate whose template
//! matches consumes a prefix of the path and hands the rest to its children
//! and then to its sub-resource locator. When a subtree cannot complete the
//! match, captures are rolled back and the next candidate is tried.

use http::Method;

use crate::params::Params;
use crate::resource::{sort_by_specificity, Resource};

/// Maximum depth of nested sub-resource locators.
pub const MAX_LOCATOR_DEPTH: usize = 32;

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<H> {
    /// The handler serving the request.
    pub handler: H,
    /// Captured parameters, outermost first.
    pub params: Params,
    /// Templates matched from the root downwards.
    pub matched: Vec<String>,
}

/// Outcome of routing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome<H> {
    /// A handler was found.
    Matched(RouteMatch<H>),
    /// The path matched a resource that does not serve the method.
    MethodNotAllowed {
        /// Methods the resource serves.
        allowed: Vec<Method>,
    },
    /// No resource matched the path.
    NotFound,
}

impl<H> RouteOutcome<H> {
    /// Returns the match, if any.
    pub fn into_match(self) -> Option<RouteMatch<H>> {
        match self {
            Self::Matched(m) => Some(m),
            _ => None,
        }
    }
}

struct MatchState<'m> {
    method: &'m Method,
    params: Params,
    matched: Vec<String>,
    allowed: Option<Vec<Method>>,
}

/// Routes request paths through a tree of [`Resource`]s.
///
/// # Example
///
/// ```rust
/// use ariadne_router::{Resource, ResourceRouter, RouteOutcome};
/// use http::Method;
///
/// let router = ResourceRouter::new()
///     .with_resource(Resource::builder("/a/{id}").get("byId").build().unwrap())
///     .with_resource(Resource::builder("/a/fixed").get("fixed").build().unwrap());
///
/// let matched = router.route(&Method::GET, "/a/fixed").into_match().unwrap();
/// assert_eq!(matched.handler, "fixed");
///
/// let matched = router.route(&Method::GET, "/a/42").into_match().unwrap();
/// assert_eq!(matched.handler, "byId");
/// assert_eq!(matched.params.get("id"), Some("42"));
///
/// assert!(matches!(
///     router.route(&Method::POST, "/a/42"),
///     RouteOutcome::MethodNotAllowed { .. }
/// ));
/// ```
#[derive(Debug, Clone)]
pub struct ResourceRouter<H> {
    resources: Vec<Resource<H>>,
}

impl<H> Default for ResourceRouter<H> {
    fn default() -> Self {
        Self {
            resources: Vec::new(),
        }
    }
}

impl<H: Clone> ResourceRouter<H> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root resource.
    pub fn add(&mut self, resource: Resource<H>) {
        self.resources.push(resource);
        sort_by_specificity(&mut self.resources);
    }

    /// Builder-style [`add`](Self::add).
    #[must_use]
    pub fn with_resource(mut self, resource: Resource<H>) -> Self {
        self.add(resource);
        self
    }

    /// Returns the root resources, most specific first.
    pub fn resources(&self) -> &[Resource<H>] {
        &self.resources
    }

    /// Returns the number of root resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if no resources are registered.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Routes `path` for `method`.
    ///
    /// Empty path segments are ignored, so `/users/` and `/users` route
    /// identically.
    pub fn route(&self, method: &Method, path: &str) -> RouteOutcome<H> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut state = MatchState {
            method,
            params: Params::new(),
            matched: Vec::new(),
            allowed: None,
        };

        for resource in &self.resources {
            if let Some(found) = Self::match_resource(resource, &segments, 0, &mut state) {
                return RouteOutcome::Matched(found);
            }
        }

        match state.allowed {
            Some(allowed) => RouteOutcome::MethodNotAllowed { allowed },
            None => RouteOutcome::NotFound,
        }
    }

    fn match_resource(
        resource: &Resource<H>,
        segments: &[&str],
        depth: usize,
        state: &mut MatchState<'_>,
    ) -> Option<RouteMatch<H>> {
        let mark = state.params.len();
        let consumed = resource.template().match_prefix(segments, &mut state.params)?;
        state.matched.push(resource.template().as_str().to_owned());

        if let Some(found) = Self::descend(resource, &segments[consumed..], depth, state) {
            return Some(found);
        }

        state.params.truncate(mark);
        state.matched.pop();
        None
    }

    fn descend(
        resource: &Resource<H>,
        rest: &[&str],
        depth: usize,
        state: &mut MatchState<'_>,
    ) -> Option<RouteMatch<H>> {
        if rest.is_empty() && resource.methods().has_any_method() {
            if let Some(handler) = resource.methods().resolve(state.method) {
                return Some(RouteMatch {
                    handler: handler.clone(),
                    params: state.params.clone(),
                    matched: state.matched.clone(),
                });
            }
            if state.allowed.is_none() {
                state.allowed = Some(resource.methods().allowed_methods());
            }
        }

        for child in resource.children() {
            if let Some(found) = Self::match_resource(child, rest, depth, state) {
                return Some(found);
            }
        }

        let locator = resource.locator()?;
        if depth >= MAX_LOCATOR_DEPTH {
            return None;
        }
        let sub_resource = locator(&state.params)?;
        Self::match_resource(&sub_resource, rest, depth + 1, state)
    }
}

impl<H: Clone> FromIterator<Resource<H>> for ResourceRouter<H> {
    fn from_iter<I: IntoIterator<Item = Resource<H>>>(iter: I) -> Self {
        let mut resources: Vec<_> = iter.into_iter().collect();
        sort_by_specificity(&mut resources);
        Self { resources }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(template: &str) -> crate::resource::ResourceBuilder<&'static str> {
        Resource::builder(template)
    }

    #[test]
    fn test_literal_beats_template_regardless_of_declaration() {
        let router: ResourceRouter<_> = [
            resource("/a/{id}").get("param").build().unwrap(),
            resource("/a/fixed").get("literal").build().unwrap(),
        ]
        .into_iter()
        .collect();

        let found = router.route(&Method::GET, "/a/fixed").into_match().unwrap();
        assert_eq!(found.handler, "literal");
    }

    #[test]
    fn test_hierarchical_match_collects_params_and_templates() {
        let router = ResourceRouter::new().with_resource(
            resource("/orgs/{org}")
                .child(resource("/users/{user}").get("user"))
                .build()
                .unwrap(),
        );

        let found = router
            .route(&Method::GET, "/orgs/acme/users/7")
            .into_match()
            .unwrap();
        assert_eq!(found.handler, "user");
        assert_eq!(found.params.get("org"), Some("acme"));
        assert_eq!(found.params.get("user"), Some("7"));
        assert_eq!(found.matched, vec!["/orgs/{org}", "/users/{user}"]);
    }

    #[test]
    fn test_backtracks_into_less_specific_sibling() {
        let router = ResourceRouter::new()
            .with_resource(
                resource("/a/fixed")
                    .child(resource("/only").get("fixed-only"))
                    .build()
                    .unwrap(),
            )
            .with_resource(
                resource("/a/{id}")
                    .child(resource("/other").get("param-other"))
                    .build()
                    .unwrap(),
            );

        let found = router
            .route(&Method::GET, "/a/fixed/other")
            .into_match()
            .unwrap();
        assert_eq!(found.handler, "param-other");
        assert_eq!(found.params.get("id"), Some("fixed"));
        assert_eq!(found.matched, vec!["/a/{id}", "/other"]);
    }

    #[test]
    fn test_method_not_allowed_lists_methods() {
        let router = ResourceRouter::new()
            .with_resource(resource("/items").get("list").post("create").build().unwrap());

        match router.route(&Method::DELETE, "/items") {
            RouteOutcome::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::GET, Method::HEAD, Method::POST]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_not_found() {
        let router = ResourceRouter::new()
            .with_resource(resource("/items").get("list").build().unwrap());
        assert_eq!(router.route(&Method::GET, "/other"), RouteOutcome::NotFound);
        assert_eq!(router.route(&Method::GET, "/items/1"), RouteOutcome::NotFound);
    }

    #[test]
    fn test_locator_builds_sub_resource_from_params() {
        let router = ResourceRouter::new().with_resource(
            resource("/tenants/{tenant}")
                .locator(|params: &Params| {
                    let tenant = params.get("tenant")?;
                    if tenant == "blocked" {
                        return None;
                    }
                    Resource::builder("/reports/{id}")
                        .get("report")
                        .build()
                        .ok()
                })
                .build()
                .unwrap(),
        );

        let found = router
            .route(&Method::GET, "/tenants/acme/reports/3")
            .into_match()
            .unwrap();
        assert_eq!(found.handler, "report");
        assert_eq!(found.params.get("tenant"), Some("acme"));
        assert_eq!(found.params.get("id"), Some("3"));

        assert_eq!(
            router.route(&Method::GET, "/tenants/blocked/reports/3"),
            RouteOutcome::NotFound
        );
    }

    #[test]
    fn test_recursive_locator_is_bounded() {
        fn endless(_: &Params) -> Option<Resource<&'static str>> {
            Resource::builder("/").locator(endless).build().ok()
        }

        let router = ResourceRouter::new()
            .with_resource(resource("/loop").locator(endless).build().unwrap());
        assert_eq!(router.route(&Method::GET, "/loop/x"), RouteOutcome::NotFound);
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let router = ResourceRouter::new()
            .with_resource(resource("/items").get("list").build().unwrap());
        assert!(router.route(&Method::GET, "/items/").into_match().is_some());
    }
}
