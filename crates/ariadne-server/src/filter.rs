//! Request and response filters.
//!
//! Pre-match filters run before resource matching, in ascending priority
//! order (ties keep registration order). They may rewrite the request, e.g.
//! its URI or method, or abort processing by setting a response. Response
//! filters run on the way out in descending priority order.

use std::fmt;
use std::sync::Arc;

use ariadne_core::{ContainerRequest, ContainerResponse, ProcessingError, ProcessingResult, RequestHead};
use tracing::debug;

use crate::context::{AcceptingContext, FilterContext};
use crate::stage::{Continuation, Stage};

/// Priority given to filters that do not choose one.
pub const USER_PRIORITY: i32 = 5000;

/// A filter applied to every request before matching.
pub trait PreMatchFilter: Send + Sync + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Lower priorities run first.
    fn priority(&self) -> i32 {
        USER_PRIORITY
    }

    /// Inspects or modifies the request.
    ///
    /// # Errors
    ///
    /// An error aborts processing and is handed to the exception mappers.
    fn filter(&self, ctx: &mut FilterContext) -> anyhow::Result<()>;
}

/// A pre-match filter backed by a closure.
pub struct FnFilter<F> {
    name: String,
    priority: i32,
    func: F,
}

impl<F> FnFilter<F>
where
    F: Fn(&mut FilterContext) -> anyhow::Result<()> + Send + Sync + 'static,
{
    /// Wraps `func` with the default priority.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            priority: USER_PRIORITY,
            func,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl<F> PreMatchFilter for FnFilter<F>
where
    F: Fn(&mut FilterContext) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn filter(&self, ctx: &mut FilterContext) -> anyhow::Result<()> {
        (self.func)(ctx)
    }
}

/// Runs the pre-match filters.
#[derive(Default, Clone)]
pub struct PreMatchFilterStage {
    filters: Vec<Arc<dyn PreMatchFilter>>,
}

impl PreMatchFilterStage {
    /// Creates the stage, ordering `filters` by priority.
    pub fn new(filters: impl IntoIterator<Item = Arc<dyn PreMatchFilter>>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().collect();
        filters.sort_by_key(|f| f.priority());
        Self { filters }
    }

    /// Number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if there are no filters.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Applies the filters in order.
    ///
    /// Stops at the first filter that sets a response. The returned context
    /// carries the possibly replaced request and that response.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::Filter`] naming the first filter that
    /// failed; later filters do not run.
    pub fn filter(&self, request: ContainerRequest) -> ProcessingResult<FilterContext> {
        let mut ctx = FilterContext::new(request);
        for filter in &self.filters {
            filter
                .filter(&mut ctx)
                .map_err(|e| ProcessingError::filter(filter.name(), e))?;
            if ctx.is_aborted() {
                debug!(filter = filter.name(), "Request aborted by filter");
                break;
            }
        }
        Ok(ctx)
    }
}

impl Stage for PreMatchFilterStage {
    fn name(&self) -> &'static str {
        "pre-match-filter"
    }

    fn apply(
        &self,
        request: ContainerRequest,
        _ctx: &mut AcceptingContext,
    ) -> ProcessingResult<Continuation> {
        let (request, response) = self.filter(request)?.into_parts();
        Ok(match response {
            Some(response) => Continuation::Respond(request, response),
            None => Continuation::Proceed(request),
        })
    }
}

impl fmt::Debug for PreMatchFilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|flt| (flt.name(), flt.priority())))
            .finish()
    }
}

/// A filter applied to every response before it is written.
pub trait ResponseFilter: Send + Sync + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Higher priorities run first.
    fn priority(&self) -> i32 {
        USER_PRIORITY
    }

    /// Inspects or modifies the response.
    ///
    /// # Errors
    ///
    /// An error replaces the response with the mapped failure.
    fn filter(&self, request: &RequestHead, response: &mut ContainerResponse)
        -> anyhow::Result<()>;
}

/// A response filter backed by a closure.
pub struct FnResponseFilter<F> {
    name: String,
    priority: i32,
    func: F,
}

impl<F> FnResponseFilter<F>
where
    F: Fn(&RequestHead, &mut ContainerResponse) -> anyhow::Result<()> + Send + Sync + 'static,
{
    /// Wraps `func` with the default priority.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            priority: USER_PRIORITY,
            func,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl<F> ResponseFilter for FnResponseFilter<F>
where
    F: Fn(&RequestHead, &mut ContainerResponse) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn filter(
        &self,
        request: &RequestHead,
        response: &mut ContainerResponse,
    ) -> anyhow::Result<()> {
        (self.func)(request, response)
    }
}

/// Response filters ordered for application.
#[derive(Default, Clone)]
pub struct ResponseFilterChain {
    filters: Vec<Arc<dyn ResponseFilter>>,
}

impl ResponseFilterChain {
    /// Creates the chain, highest priority first.
    pub fn new(filters: impl IntoIterator<Item = Arc<dyn ResponseFilter>>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().collect();
        filters.sort_by_key(|f| std::cmp::Reverse(f.priority()));
        Self { filters }
    }

    /// Number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if there are no filters.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Applies every filter.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::ResponseFilter`] for the first failure.
    pub fn apply(&self, request: &RequestHead, response: &mut ContainerResponse) -> ProcessingResult<()> {
        for filter in &self.filters {
            filter
                .filter(request, response)
                .map_err(|e| ProcessingError::response_filter(filter.name(), e))?;
        }
        Ok(())
    }
}

impl fmt::Debug for ResponseFilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|flt| (flt.name(), flt.priority())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, Method, StatusCode};
    use parking_lot::Mutex;

    fn recording(
        name: &'static str,
        priority: i32,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn PreMatchFilter> {
        let log = Arc::clone(log);
        Arc::new(
            FnFilter::new(name, move |_ctx: &mut FilterContext| {
                log.lock().push(name);
                Ok(())
            })
            .with_priority(priority),
        )
    }

    #[test]
    fn test_filters_run_in_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stage = PreMatchFilterStage::new([
            recording("late", 9000, &log),
            recording("user-a", USER_PRIORITY, &log),
            recording("early", 100, &log),
            recording("user-b", USER_PRIORITY, &log),
        ]);

        stage.filter(ContainerRequest::get("/")).unwrap();
        assert_eq!(*log.lock(), ["early", "user-a", "user-b", "late"]);
    }

    #[test]
    fn test_filter_can_rewrite_request() {
        let stage = PreMatchFilterStage::new([Arc::new(FnFilter::new(
            "override",
            |ctx: &mut FilterContext| {
                if let Some(method) = ctx.request().header("x-http-method-override") {
                    let method = Method::from_bytes(method.as_bytes())?;
                    ctx.request_mut().set_method(method);
                }
                Ok(())
            },
        )) as Arc<dyn PreMatchFilter>]);

        let request = ContainerRequest::new(Method::POST, "/items".parse().unwrap())
            .with_header(
                http::header::HeaderName::from_static("x-http-method-override"),
                HeaderValue::from_static("DELETE"),
            );
        let (request, response) = stage.filter(request).unwrap().into_parts();
        assert_eq!(request.method(), &Method::DELETE);
        assert!(response.is_none());
    }

    #[test]
    fn test_abort_stops_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let aborting: Arc<dyn PreMatchFilter> =
            Arc::new(FnFilter::new("deny", |ctx: &mut FilterContext| {
                ctx.set_response(ContainerResponse::new(StatusCode::FORBIDDEN));
                Ok(())
            }));
        let stage = PreMatchFilterStage::new([aborting, recording("after", USER_PRIORITY, &log)]);

        let outcome = stage
            .apply(ContainerRequest::get("/"), &mut AcceptingContext::new())
            .unwrap();
        assert!(matches!(
            outcome,
            Continuation::Respond(_, ref response) if response.status() == StatusCode::FORBIDDEN
        ));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_failure_names_filter_and_stops_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing: Arc<dyn PreMatchFilter> = Arc::new(
            FnFilter::new("auth", |_ctx: &mut FilterContext| anyhow::bail!("no token"))
                .with_priority(1),
        );
        let stage = PreMatchFilterStage::new([recording("after", 2, &log), failing]);

        let err = stage.filter(ContainerRequest::get("/")).unwrap_err();
        assert!(matches!(&err, ProcessingError::Filter { filter, .. } if filter == "auth"));
        assert!(err.is_mappable());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_response_filters_run_highest_priority_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = |name: &'static str, priority: i32| -> Arc<dyn ResponseFilter> {
            let log = Arc::clone(&log);
            Arc::new(
                FnResponseFilter::new(name, move |_: &RequestHead, _: &mut ContainerResponse| {
                    log.lock().push(name);
                    Ok(())
                })
                .with_priority(priority),
            )
        };
        let chain = ResponseFilterChain::new([make("low", 1), make("high", 10)]);

        let head = ContainerRequest::get("/").head();
        chain.apply(&head, &mut ContainerResponse::ok()).unwrap();
        assert_eq!(*log.lock(), ["high", "low"]);
    }

    #[test]
    fn test_response_filter_failure() {
        let chain = ResponseFilterChain::new([Arc::new(FnResponseFilter::new(
            "sign",
            |_: &RequestHead, _: &mut ContainerResponse| anyhow::bail!("no key"),
        )) as Arc<dyn ResponseFilter>]);

        let head = ContainerRequest::get("/").head();
        let err = chain.apply(&head, &mut ContainerResponse::ok()).unwrap_err();
        assert!(matches!(err, ProcessingError::ResponseFilter { .. }));
    }
}
