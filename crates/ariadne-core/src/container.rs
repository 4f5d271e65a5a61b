//! Container provider registry.
//!
//! Hosting integrations register [`ContainerProvider`]s with a
//! [`ContainerFactory`]; an application asks the factory for a container of
//! a given type and receives the first one a provider agrees to build.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ProcessingError, ProcessingResult};

/// Builds containers of type `C` hosting applications of type `A`.
pub trait ContainerProvider<C, A>: Send + Sync {
    /// Creates a container for `application`.
    ///
    /// Returns `Ok(None)` if this provider does not handle the application.
    fn create_container(&self, application: &A) -> anyhow::Result<Option<C>>;

    /// Name used in logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

impl<C, A, F> ContainerProvider<C, A> for F
where
    F: Fn(&A) -> anyhow::Result<Option<C>> + Send + Sync,
{
    fn create_container(&self, application: &A) -> anyhow::Result<Option<C>> {
        self(application)
    }
}

type SharedProvider<C, A> = Arc<dyn ContainerProvider<C, A>>;

/// Ordered registry of container providers, keyed by container type.
///
/// # Example
///
/// ```
/// use ariadne_core::ContainerFactory;
///
/// struct App { name: &'static str }
/// #[derive(Debug, PartialEq)]
/// struct InMemoryContainer(&'static str);
///
/// let mut factory = ContainerFactory::<App>::new();
/// factory.register_fn(|app: &App| Ok(Some(InMemoryContainer(app.name))));
///
/// let container: InMemoryContainer = factory.create_container(&App { name: "orders" }).unwrap();
/// assert_eq!(container, InMemoryContainer("orders"));
///
/// assert!(factory.create_container::<String>(&App { name: "orders" }).is_err());
/// ```
pub struct ContainerFactory<A> {
    providers: HashMap<TypeId, Vec<Box<dyn Any + Send + Sync>>>,
    _application: std::marker::PhantomData<fn(&A)>,
}

impl<A: 'static> ContainerFactory<A> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            _application: std::marker::PhantomData,
        }
    }

    /// Appends a provider for containers of type `C`.
    pub fn register<C, P>(&mut self, provider: P) -> &mut Self
    where
        C: 'static,
        P: ContainerProvider<C, A> + 'static,
    {
        let shared: SharedProvider<C, A> = Arc::new(provider);
        self.providers
            .entry(TypeId::of::<C>())
            .or_default()
            .push(Box::new(shared));
        self
    }

    /// Appends a closure provider for containers of type `C`.
    pub fn register_fn<C, F>(&mut self, provider: F) -> &mut Self
    where
        C: 'static,
        F: Fn(&A) -> anyhow::Result<Option<C>> + Send + Sync + 'static,
    {
        self.register::<C, F>(provider)
    }

    /// Builder-style [`register_fn`](Self::register_fn).
    #[must_use]
    pub fn with_provider_fn<C, F>(mut self, provider: F) -> Self
    where
        C: 'static,
        F: Fn(&A) -> anyhow::Result<Option<C>> + Send + Sync + 'static,
    {
        self.register_fn(provider);
        self
    }

    /// Number of providers registered for `C`.
    pub fn provider_count<C: 'static>(&self) -> usize {
        self.providers.get(&TypeId::of::<C>()).map_or(0, Vec::len)
    }

    /// Creates a container of type `C` for `application`.
    ///
    /// Providers are consulted in registration order; the first container
    /// produced is returned as is. Fails with
    /// [`ProcessingError::UnsupportedContainer`] when no provider produces
    /// one and with [`ProcessingError::ContainerConstruction`] when a
    /// provider fails.
    pub fn create_container<C: 'static>(&self, application: &A) -> ProcessingResult<C> {
        let providers = self
            .providers
            .get(&TypeId::of::<C>())
            .map(Vec::as_slice)
            .unwrap_or_default();

        for provider in providers
            .iter()
            .filter_map(|p| p.downcast_ref::<SharedProvider<C, A>>())
        {
            match provider.create_container(application) {
                Ok(Some(container)) => {
                    debug!(
                        provider = provider.name(),
                        container = type_name::<C>(),
                        "Container created"
                    );
                    return Ok(container);
                }
                Ok(None) => {}
                Err(source) => {
                    return Err(ProcessingError::ContainerConstruction {
                        container_type: type_name::<C>(),
                        source,
                    })
                }
            }
        }

        Err(ProcessingError::unsupported_container::<C>())
    }
}

impl<A: 'static> Default for ContainerFactory<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for ContainerFactory<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerFactory")
            .field("container_types", &self.providers.len())
            .finish()
    }
}
