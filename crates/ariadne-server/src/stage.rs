//! The accepting stage chain.
//!
//! Stages run in a fixed order: pre-match filtering, routing, inflector
//! extraction. Each one either hands the request on or ends the chain with
//! a [`Continuation`] telling the driver what to do next.

use std::fmt;

use ariadne_core::{ContainerRequest, ContainerResponse, ProcessingResult, SharedInflector};
use tracing::debug;

use crate::context::AcceptingContext;

/// Where processing goes after a stage.
pub enum Continuation {
    /// Run the next stage.
    Proceed(ContainerRequest),
    /// Invoke the resource method.
    Invoke(ContainerRequest, SharedInflector),
    /// Skip the resource method and send this response.
    Respond(ContainerRequest, ContainerResponse),
    /// No stage produced an inflector or a response.
    Terminate(ContainerRequest),
}

impl Continuation {
    /// Returns the request carried by this continuation.
    pub const fn request(&self) -> &ContainerRequest {
        match self {
            Self::Proceed(request)
            | Self::Invoke(request, _)
            | Self::Respond(request, _)
            | Self::Terminate(request) => request,
        }
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Proceed(_) => "proceed",
            Self::Invoke(..) => "invoke",
            Self::Respond(..) => "respond",
            Self::Terminate(_) => "terminate",
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("kind", &self.label())
            .field("request", self.request())
            .finish()
    }
}

/// One step of the accepting chain.
pub trait Stage: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request.
    ///
    /// # Errors
    ///
    /// An error aborts processing of this request only.
    fn apply(
        &self,
        request: ContainerRequest,
        ctx: &mut AcceptingContext,
    ) -> ProcessingResult<Continuation>;
}

/// Stages applied in order until one stops the chain.
#[derive(Default)]
pub struct StageChain {
    stages: Vec<Box<dyn Stage>>,
}

impl StageChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn then(mut self, stage: impl Stage) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Returns the stage names in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs the stages.
    ///
    /// Returns the first continuation other than [`Continuation::Proceed`],
    /// or [`Continuation::Terminate`] if every stage proceeds.
    ///
    /// # Errors
    ///
    /// Propagates the first stage error.
    pub fn process(
        &self,
        request: ContainerRequest,
        ctx: &mut AcceptingContext,
    ) -> ProcessingResult<Continuation> {
        let mut request = request;
        for stage in &self.stages {
            let next = stage.apply(request, ctx)?;
            debug!(stage = stage.name(), outcome = next.label(), "Stage completed");
            match next {
                Continuation::Proceed(proceeding) => request = proceeding,
                stopped => return Ok(stopped),
            }
        }
        Ok(Continuation::Terminate(request))
    }
}

impl fmt::Debug for StageChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageChain")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        respond: bool,
    }

    impl Stage for Counting {
        fn name(&self) -> &'static str {
            self.name
        }

        fn apply(
            &self,
            request: ContainerRequest,
            _ctx: &mut AcceptingContext,
        ) -> ProcessingResult<Continuation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.respond {
                Ok(Continuation::Respond(request, ContainerResponse::new(StatusCode::IM_A_TEAPOT)))
            } else {
                Ok(Continuation::Proceed(request))
            }
        }
    }

    fn counting(name: &'static str, calls: &Arc<AtomicUsize>, respond: bool) -> Counting {
        Counting {
            name,
            calls: Arc::clone(calls),
            respond,
        }
    }

    #[test]
    fn test_all_proceed_terminates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = StageChain::new()
            .then(counting("a", &calls, false))
            .then(counting("b", &calls, false));

        let outcome = chain
            .process(ContainerRequest::get("/"), &mut AcceptingContext::new())
            .unwrap();
        assert!(matches!(outcome, Continuation::Terminate(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(chain.stage_names(), ["a", "b"]);
    }

    #[test]
    fn test_stop_skips_later_stages() {
        let first = Arc::new(AtomicUsize::new(0));
        let later = Arc::new(AtomicUsize::new(0));
        let chain = StageChain::new()
            .then(counting("stop", &first, true))
            .then(counting("later", &later, false));

        let outcome = chain
            .process(ContainerRequest::get("/"), &mut AcceptingContext::new())
            .unwrap();
        assert!(matches!(outcome, Continuation::Respond(_, _)));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }
}
