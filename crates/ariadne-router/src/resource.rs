//! Resource tree nodes.

use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::error::RouteResult;
use crate::method_router::MethodRouter;
use crate::params::Params;
use crate::template::PathTemplate;

/// Produces a sub-resource at match time from the parameters captured so far.
pub type Locator<H> = Arc<dyn Fn(&Params) -> Option<Resource<H>> + Send + Sync>;

/// A node of the resource tree.
///
/// A resource owns a template relative to its parent, the handlers for the
/// methods it serves, static child resources and optionally a locator that
/// builds a sub-resource dynamically.
pub struct Resource<H> {
    template: PathTemplate,
    methods: MethodRouter<H>,
    children: Vec<Resource<H>>,
    locator: Option<Locator<H>>,
}

impl<H> Resource<H> {
    /// Starts building a resource with the given template.
    pub fn builder(template: impl Into<String>) -> ResourceBuilder<H> {
        ResourceBuilder {
            template: template.into(),
            methods: MethodRouter::new(),
            children: Vec::new(),
            locator: None,
        }
    }

    /// Returns the template.
    pub const fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Returns the method handlers.
    pub const fn methods(&self) -> &MethodRouter<H> {
        &self.methods
    }

    /// Returns the child resources, most specific first.
    pub fn children(&self) -> &[Resource<H>] {
        &self.children
    }

    /// Returns the sub-resource locator, if any.
    pub fn locator(&self) -> Option<&Locator<H>> {
        self.locator.as_ref()
    }
}

impl<H: Clone> Clone for Resource<H> {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            methods: self.methods.clone(),
            children: self.children.clone(),
            locator: self.locator.clone(),
        }
    }
}

impl<H> fmt::Debug for Resource<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("template", &self.template.as_str())
            .field("methods", &self.methods.allowed_methods())
            .field("children", &self.children)
            .field("locator", &self.locator.is_some())
            .finish()
    }
}

/// Builder for [`Resource`].
///
/// # Example
///
/// ```rust
/// use ariadne_router::Resource;
///
/// let users = Resource::builder("/users")
///     .get("listUsers")
///     .child(Resource::builder("/{id}").get("getUser").delete("deleteUser"))
///     .build()
///     .unwrap();
///
/// assert_eq!(users.children().len(), 1);
/// ```
#[must_use]
pub struct ResourceBuilder<H> {
    template: String,
    methods: MethodRouter<H>,
    children: Vec<ResourceBuilder<H>>,
    locator: Option<Locator<H>>,
}

impl<H> ResourceBuilder<H> {
    /// Registers a GET handler.
    pub fn get(mut self, handler: H) -> Self {
        self.methods = self.methods.get(handler);
        self
    }

    /// Registers a POST handler.
    pub fn post(mut self, handler: H) -> Self {
        self.methods = self.methods.post(handler);
        self
    }

    /// Registers a PUT handler.
    pub fn put(mut self, handler: H) -> Self {
        self.methods = self.methods.put(handler);
        self
    }

    /// Registers a DELETE handler.
    pub fn delete(mut self, handler: H) -> Self {
        self.methods = self.methods.delete(handler);
        self
    }

    /// Registers a handler for any method.
    pub fn method(mut self, method: &Method, handler: H) -> Self {
        self.methods = self.methods.method(method, handler);
        self
    }

    /// Merges a whole method router.
    pub fn methods(mut self, methods: MethodRouter<H>) -> Self {
        self.methods.merge(methods);
        self
    }

    /// Adds a child resource.
    pub fn child(mut self, child: ResourceBuilder<H>) -> Self {
        self.children.push(child);
        self
    }

    /// Sets the sub-resource locator.
    pub fn locator<F>(mut self, locator: F) -> Self
    where
        F: Fn(&Params) -> Option<Resource<H>> + Send + Sync + 'static,
    {
        self.locator = Some(Arc::new(locator));
        self
    }

    /// Parses every template in the subtree and orders children by specificity.
    pub fn build(self) -> RouteResult<Resource<H>> {
        let template = PathTemplate::parse(&self.template)?;
        let mut children = self
            .children
            .into_iter()
            .map(ResourceBuilder::build)
            .collect::<RouteResult<Vec<_>>>()?;
        sort_by_specificity(&mut children);

        Ok(Resource {
            template,
            methods: self.methods,
            children,
            locator: self.locator,
        })
    }
}

/// Stable sort placing the most specific templates first.
pub(crate) fn sort_by_specificity<H>(resources: &mut [Resource<H>]) {
    resources.sort_by_key(|r| r.template.specificity());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_sorted_by_specificity() {
        let resource = Resource::builder("/a")
            .child(Resource::builder("/{id}").get(1))
            .child(Resource::builder("/*rest").get(2))
            .child(Resource::builder("/fixed").get(3))
            .build()
            .unwrap();

        let order: Vec<_> = resource
            .children()
            .iter()
            .map(|c| c.template().as_str())
            .collect();
        assert_eq!(order, vec!["/fixed", "/{id}", "/*rest"]);
    }

    #[test]
    fn test_equal_specificity_keeps_declaration_order() {
        let resource = Resource::builder("/")
            .child(Resource::builder("/{a}").get(1))
            .child(Resource::builder("/{b}").get(2))
            .build()
            .unwrap();

        assert_eq!(resource.children()[0].template().as_str(), "/{a}");
    }

    #[test]
    fn test_child_errors_propagate() {
        let result = Resource::<u8>::builder("/ok")
            .child(Resource::builder("/{bad"))
            .build();
        assert!(result.is_err());
    }
}
