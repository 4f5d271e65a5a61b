//! The inflector-extraction stage.

use ariadne_core::{ContainerRequest, ProcessingResult};

use crate::context::AcceptingContext;
use crate::stage::{Continuation, Stage};

/// Turns the routing outcome into the final continuation: invoke the
/// selected inflector, or terminate when there is none.
#[derive(Debug, Clone, Copy, Default)]
pub struct InflectorExtractionStage;

impl Stage for InflectorExtractionStage {
    fn name(&self) -> &'static str {
        "inflector-extraction"
    }

    fn apply(
        &self,
        request: ContainerRequest,
        ctx: &mut AcceptingContext,
    ) -> ProcessingResult<Continuation> {
        Ok(match ctx.take_inflector() {
            Some(inflector) => Continuation::Invoke(request, inflector),
            None => Continuation::Terminate(request),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RouteResolution;
    use ariadne_core::{inflector_fn, ContainerResponse};

    #[test]
    fn test_invokes_published_inflector() {
        let mut ctx = AcceptingContext::new();
        ctx.publish(RouteResolution::Inflector(inflector_fn("show", |_| async {
            Ok(ContainerResponse::ok())
        })));

        let outcome = InflectorExtractionStage
            .apply(ContainerRequest::get("/"), &mut ctx)
            .unwrap();
        assert!(matches!(outcome, Continuation::Invoke(_, ref i) if i.name() == "show"));
    }

    #[test]
    fn test_terminates_without_inflector() {
        let mut ctx = AcceptingContext::new();
        let outcome = InflectorExtractionStage
            .apply(ContainerRequest::get("/"), &mut ctx)
            .unwrap();
        assert!(matches!(outcome, Continuation::Terminate(_)));

        ctx.publish(RouteResolution::NotFound);
        let outcome = InflectorExtractionStage
            .apply(ContainerRequest::get("/"), &mut ctx)
            .unwrap();
        assert!(matches!(outcome, Continuation::Terminate(_)));
        assert!(ctx.resolution().is_some());
    }
}
