//! The request value flowing through the pipeline.

use std::fmt;
use std::sync::Arc;

use ariadne_router::Params;
use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, Uri};

use crate::closeable::CloseableService;
use crate::context::RequestId;

/// A request as seen by the pipeline stages.
///
/// Stages transform requests by value: each `with_*` method consumes the
/// request and returns the updated one, so a stage never observes a
/// half-applied change made by another.
///
/// Every request owns a [`CloseableService`] created with it; the pipeline
/// closes it when the request completes.
///
/// # Example
///
/// ```
/// use ariadne_core::ContainerRequest;
/// use http::Method;
///
/// let request = ContainerRequest::new(Method::GET, "/users/42".parse().unwrap());
/// assert_eq!(request.path(), "/users/42");
/// assert_eq!(request.remaining_path(), "/users/42");
/// ```
pub struct ContainerRequest {
    id: RequestId,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    remaining_path: String,
    params: Params,
    matched_templates: Vec<String>,
    extensions: Extensions,
    closeables: Arc<CloseableService>,
}

impl ContainerRequest {
    /// Creates a request with an empty body and no headers.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        let remaining_path = uri.path().to_owned();
        Self {
            id: RequestId::new(),
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remaining_path,
            params: Params::new(),
            matched_templates: Vec::new(),
            extensions: Extensions::new(),
            closeables: Arc::new(CloseableService::new()),
        }
    }

    /// Shorthand for a GET request to `path`.
    ///
    /// Falls back to `/` if `path` is not a valid URI.
    #[must_use]
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path.parse().unwrap_or_else(|_| Uri::from_static("/")))
    }

    /// Returns the request id.
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Returns the HTTP method.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the request path.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers for in-place modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the body.
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the part of the path not consumed by resource matching.
    pub fn remaining_path(&self) -> &str {
        &self.remaining_path
    }

    /// Returns the path parameters captured during matching.
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Returns a single path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Returns the templates matched from the root resource downwards.
    pub fn matched_templates(&self) -> &[String] {
        &self.matched_templates
    }

    /// Returns the typed extensions.
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns the typed extensions for in-place modification.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Returns the request's closeable registry.
    pub const fn closeables(&self) -> &Arc<CloseableService> {
        &self.closeables
    }

    /// Returns a copy of the request line, headers and id.
    #[must_use]
    pub fn head(&self) -> RequestHead {
        RequestHead {
            id: self.id,
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
        }
    }

    /// Replaces the method in place.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Replaces the URI in place and resets the remaining path.
    pub fn set_uri(&mut self, uri: Uri) {
        self.remaining_path = uri.path().to_owned();
        self.uri = uri;
    }

    /// Replaces the method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replaces the URI and resets the remaining path to its path.
    #[must_use]
    pub fn with_uri(mut self, uri: Uri) -> Self {
        self.remaining_path = uri.path().to_owned();
        self.uri = uri;
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attaches a typed extension.
    #[must_use]
    pub fn with_extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    /// Sets the request id, e.g. when propagating one from an upstream hop.
    #[must_use]
    pub fn with_id(mut self, id: RequestId) -> Self {
        self.id = id;
        self
    }

    /// Records the outcome of resource matching.
    #[must_use]
    pub fn with_route(
        mut self,
        params: Params,
        matched_templates: Vec<String>,
        remaining_path: impl Into<String>,
    ) -> Self {
        self.params = params;
        self.matched_templates = matched_templates;
        self.remaining_path = remaining_path.into();
        self
    }
}

impl From<http::Request<Bytes>> for ContainerRequest {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let mut converted = Self::new(parts.method, parts.uri).with_body(body);
        converted.headers = parts.headers;
        converted.extensions = parts.extensions;
        converted
    }
}

impl fmt::Debug for ContainerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRequest")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("remaining_path", &self.remaining_path)
            .field("params", &self.params)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// The parts of a request that remain available after the request itself
/// has been handed to the resource method.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// Request id.
    pub id: RequestId,
    /// HTTP method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_uri_resets_remaining_path() {
        let request = ContainerRequest::get("/a/b").with_route(Params::new(), vec![], "/b");
        assert_eq!(request.remaining_path(), "/b");

        let request = request.with_uri("/c".parse().unwrap());
        assert_eq!(request.remaining_path(), "/c");
    }

    #[test]
    fn test_from_http_request() {
        let http_request = http::Request::builder()
            .method(Method::POST)
            .uri("/orders?draft=true")
            .header("content-type", "application/json")
            .body(Bytes::from_static(b"{}"))
            .unwrap();

        let request = ContainerRequest::from(http_request);
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.path(), "/orders");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body().as_ref(), b"{}");
    }

    #[test]
    fn test_head_survives_request() {
        let request = ContainerRequest::get("/x");
        let head = request.head();
        assert_eq!(head.id, request.id());
        assert_eq!(head.uri.path(), "/x");
    }

    #[test]
    fn test_each_request_has_own_closeables() {
        let a = ContainerRequest::get("/");
        let b = ContainerRequest::get("/");
        assert!(!Arc::ptr_eq(a.closeables(), b.closeables()));
    }
}
