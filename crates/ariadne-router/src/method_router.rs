//! HTTP method dispatch for a single resource.
//!
//! [`MethodRouter`] maps HTTP methods to handlers. A `HEAD` request falls
//! back to the `GET` handler when no explicit `HEAD` handler exists.

use http::Method;

/// Maps HTTP methods to handlers of type `H`.
///
/// # Example
///
/// ```rust
/// use ariadne_router::MethodRouter;
/// use http::Method;
///
/// let router = MethodRouter::new()
///     .get("listUsers")
///     .post("createUser");
///
/// assert_eq!(router.resolve(&Method::GET), Some(&"listUsers"));
/// assert_eq!(router.resolve(&Method::HEAD), Some(&"listUsers"));
/// assert_eq!(router.resolve(&Method::DELETE), None);
/// assert_eq!(router.allowed_methods(), vec![Method::GET, Method::HEAD, Method::POST]);
/// ```
#[derive(Debug, Clone)]
pub struct MethodRouter<H> {
    get: Option<H>,
    post: Option<H>,
    put: Option<H>,
    delete: Option<H>,
    patch: Option<H>,
    head: Option<H>,
    options: Option<H>,
    trace: Option<H>,
    connect: Option<H>,
}

impl<H> Default for MethodRouter<H> {
    fn default() -> Self {
        Self {
            get: None,
            post: None,
            put: None,
            delete: None,
            patch: None,
            head: None,
            options: None,
            trace: None,
            connect: None,
        }
    }
}

impl<H> MethodRouter<H> {
    /// Creates an empty method router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a GET handler.
    #[must_use]
    pub fn get(self, handler: H) -> Self {
        self.method(&Method::GET, handler)
    }

    /// Registers a POST handler.
    #[must_use]
    pub fn post(self, handler: H) -> Self {
        self.method(&Method::POST, handler)
    }

    /// Registers a PUT handler.
    #[must_use]
    pub fn put(self, handler: H) -> Self {
        self.method(&Method::PUT, handler)
    }

    /// Registers a DELETE handler.
    #[must_use]
    pub fn delete(self, handler: H) -> Self {
        self.method(&Method::DELETE, handler)
    }

    /// Registers a PATCH handler.
    #[must_use]
    pub fn patch(self, handler: H) -> Self {
        self.method(&Method::PATCH, handler)
    }

    /// Registers a HEAD handler, overriding the GET fallback.
    #[must_use]
    pub fn head(self, handler: H) -> Self {
        self.method(&Method::HEAD, handler)
    }

    /// Registers an OPTIONS handler.
    #[must_use]
    pub fn options(self, handler: H) -> Self {
        self.method(&Method::OPTIONS, handler)
    }

    /// Registers a handler for `method`. Extension methods are ignored.
    #[must_use]
    pub fn method(mut self, method: &Method, handler: H) -> Self {
        if let Some(slot) = self.slot_mut(method) {
            *slot = Some(handler);
        }
        self
    }

    fn slot_mut(&mut self, method: &Method) -> Option<&mut Option<H>> {
        match *method {
            Method::GET => Some(&mut self.get),
            Method::POST => Some(&mut self.post),
            Method::PUT => Some(&mut self.put),
            Method::DELETE => Some(&mut self.delete),
            Method::PATCH => Some(&mut self.patch),
            Method::HEAD => Some(&mut self.head),
            Method::OPTIONS => Some(&mut self.options),
            Method::TRACE => Some(&mut self.trace),
            Method::CONNECT => Some(&mut self.connect),
            _ => None,
        }
    }

    /// Returns the handler registered for exactly `method`.
    #[must_use]
    pub fn handler(&self, method: &Method) -> Option<&H> {
        match *method {
            Method::GET => self.get.as_ref(),
            Method::POST => self.post.as_ref(),
            Method::PUT => self.put.as_ref(),
            Method::DELETE => self.delete.as_ref(),
            Method::PATCH => self.patch.as_ref(),
            Method::HEAD => self.head.as_ref(),
            Method::OPTIONS => self.options.as_ref(),
            Method::TRACE => self.trace.as_ref(),
            Method::CONNECT => self.connect.as_ref(),
            _ => None,
        }
    }

    /// Returns the handler serving `method`, applying the HEAD to GET fallback.
    #[must_use]
    pub fn resolve(&self, method: &Method) -> Option<&H> {
        self.handler(method).or_else(|| {
            if *method == Method::HEAD {
                self.get.as_ref()
            } else {
                None
            }
        })
    }

    /// Merges another router into this one without overwriting existing handlers.
    pub fn merge(&mut self, other: MethodRouter<H>) {
        let MethodRouter {
            get,
            post,
            put,
            delete,
            patch,
            head,
            options,
            trace,
            connect,
        } = other;
        for (slot, incoming) in [
            (&mut self.get, get),
            (&mut self.post, post),
            (&mut self.put, put),
            (&mut self.delete, delete),
            (&mut self.patch, patch),
            (&mut self.head, head),
            (&mut self.options, options),
            (&mut self.trace, trace),
            (&mut self.connect, connect),
        ] {
            if slot.is_none() {
                *slot = incoming;
            }
        }
    }

    /// Returns true if any method has a handler.
    #[must_use]
    pub fn has_any_method(&self) -> bool {
        !self.allowed_methods().is_empty()
    }

    /// Returns the methods this router serves, including an implied HEAD.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        [
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
            Method::TRACE,
            Method::CONNECT,
        ]
        .into_iter()
        .filter(|m| self.resolve(m).is_some())
        .collect()
    }
}
