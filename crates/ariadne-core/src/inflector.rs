//! The resource method abstraction.
//!
//! An [`Inflector`] turns a matched request into a response. Routing tables
//! map templates and methods to shared inflectors; the pipeline invokes the
//! one selected for a request on the requesting executor.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::ProcessingResult;
use crate::request::ContainerRequest;
use crate::response::ContainerResponse;

/// A boxed future that can be sent across threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Shared handle to an inflector, as stored in routing tables.
pub type SharedInflector = Arc<dyn Inflector>;

/// Transforms a request into a response.
///
/// The returned future owns everything it needs, so it can run on a
/// different executor than the one that selected it.
///
/// # Example
///
/// ```
/// use ariadne_core::{BoxFuture, ContainerRequest, ContainerResponse, Inflector, ProcessingResult};
///
/// struct Hello;
///
/// impl Inflector for Hello {
///     fn apply(&self, _request: ContainerRequest) -> BoxFuture<'static, ProcessingResult<ContainerResponse>> {
///         Box::pin(async { Ok(ContainerResponse::ok().with_text("hello")) })
///     }
/// }
/// ```
pub trait Inflector: Send + Sync + 'static {
    /// Produces the response for `request`.
    fn apply(&self, request: ContainerRequest)
        -> BoxFuture<'static, ProcessingResult<ContainerResponse>>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// An inflector backed by an async closure.
pub struct FnInflector<F> {
    name: String,
    func: F,
}

impl<F> FnInflector<F> {
    /// Wraps `func` under the given log name.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F, Fut> Inflector for FnInflector<F>
where
    F: Fn(ContainerRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProcessingResult<ContainerResponse>> + Send + 'static,
{
    fn apply(
        &self,
        request: ContainerRequest,
    ) -> BoxFuture<'static, ProcessingResult<ContainerResponse>> {
        Box::pin((self.func)(request))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Creates a [`SharedInflector`] from an async closure.
///
/// # Example
///
/// ```
/// use ariadne_core::{inflector_fn, ContainerResponse};
///
/// let get_user = inflector_fn("get_user", |request| async move {
///     let id = request.param("id").unwrap_or_default().to_owned();
///     Ok(ContainerResponse::ok().with_text(id))
/// });
/// assert_eq!(get_user.name(), "get_user");
/// ```
pub fn inflector_fn<F, Fut>(name: impl Into<String>, func: F) -> SharedInflector
where
    F: Fn(ContainerRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProcessingResult<ContainerResponse>> + Send + 'static,
{
    Arc::new(FnInflector::new(name, func))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[tokio::test]
    async fn test_fn_inflector_receives_request() {
        let echo = inflector_fn("echo", |request: ContainerRequest| async move {
            Ok(ContainerResponse::ok().with_text(request.path().to_owned()))
        });

        let response = echo.apply(ContainerRequest::get("/ping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content_length(), 5);
    }
}
