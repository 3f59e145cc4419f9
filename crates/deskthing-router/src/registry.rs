//! Handler registry keyed by route.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use deskthing_protocol::{Message, RouteKey, TypedEnvelope};

use crate::error::{HandlerError, RouterError, RouterResult};

/// Future returned by a handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// A registered handler for messages of channel `M`.
pub type Handler<M> = Arc<dyn Fn(TypedEnvelope<M>) -> HandlerFuture + Send + Sync>;

/// Wraps an async closure as a [`Handler`].
pub fn handler<M, F, Fut>(f: F) -> Handler<M>
where
    M: Message,
    F: Fn(TypedEnvelope<M>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |envelope| Box::pin(f(envelope)))
}

/// Collects handlers before they are frozen into a [`HandlerRegistry`].
pub struct RegistryBuilder<M: Message> {
    handlers: HashMap<RouteKey, Handler<M>>,
}

impl<M: Message> Default for RegistryBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> RegistryBuilder<M> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `key`.
    ///
    /// A key without request matches every request of its domain. Keys
    /// the channel vocabulary does not declare are rejected, as are
    /// duplicates.
    pub fn register(mut self, key: RouteKey, handler: Handler<M>) -> RouterResult<Self> {
        let vocabulary = M::vocabulary(key.scope);
        if !vocabulary.declares(&key.domain, key.request.as_deref()) {
            return Err(RouterError::UndeclaredRoute {
                channel: M::CHANNEL,
                key,
            });
        }
        if self.handlers.contains_key(&key) {
            return Err(RouterError::DuplicateHandler { key });
        }
        debug!(channel = %M::CHANNEL, key = %key, "Registered handler");
        self.handlers.insert(key, handler);
        Ok(self)
    }

    /// Shorthand for [`register`](Self::register) with an async closure.
    pub fn on<F, Fut>(self, key: RouteKey, f: F) -> RouterResult<Self>
    where
        F: Fn(TypedEnvelope<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register(key, handler(f))
    }

    pub fn build(self) -> HandlerRegistry<M> {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

/// Immutable route → handler table.
pub struct HandlerRegistry<M: Message> {
    handlers: HashMap<RouteKey, Handler<M>>,
}

impl<M: Message> Default for HandlerRegistry<M> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<M: Message> HandlerRegistry<M> {
    pub fn builder() -> RegistryBuilder<M> {
        RegistryBuilder::new()
    }

    /// Finds the handler for `route`: the exact key first, then the
    /// domain wildcard.
    pub fn lookup(&self, route: &RouteKey) -> Option<&Handler<M>> {
        self.handlers.get(route).or_else(|| {
            route
                .request
                .as_ref()
                .and_then(|_| self.handlers.get(&route.domain_wildcard()))
        })
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<&RouteKey> {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort();
        keys
    }
}

impl<M: Message> fmt::Debug for HandlerRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("channel", &M::CHANNEL)
            .field("keys", &self.keys())
            .finish()
    }
}
