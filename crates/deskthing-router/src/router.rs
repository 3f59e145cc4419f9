//! Validation and dispatch of envelopes to registered handlers.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use futures_util::FutureExt;
use tracing::{Instrument, debug, field, info_span, warn};

use deskthing_protocol::{
    Channel, Message, RawEnvelope, RouteKey, SchemaError, TypedEnvelope, decode_envelope, validate,
};

use crate::config::RouterConfig;
use crate::error::{HandlerError, RouterResult};
use crate::registry::HandlerRegistry;

/// Result of dispatching one envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A handler ran to completion.
    Handled,
    /// No handler was registered, or the domain/request is unknown to this
    /// host. The fallback has been notified.
    Unhandled,
    /// The envelope was recognized but its payload or correlation data is
    /// invalid.
    Rejected(SchemaError),
    /// The handler failed, timed out or panicked.
    Failed(HandlerError),
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled)
    }
}

/// Why an envelope reached the fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// Validation failed.
    Schema(SchemaError),
    /// Valid, but nothing is registered for the route.
    NoHandler(RouteKey),
}

/// What the fallback receives.
#[derive(Debug, Clone, PartialEq)]
pub struct Unrouted {
    pub channel: Channel,
    pub domain: String,
    pub request: Option<String>,
    pub source: Option<String>,
    pub reason: FallbackReason,
}

/// Callback for envelopes no handler took.
pub type Fallback = Arc<dyn Fn(&Unrouted) + Send + Sync>;

fn logging_fallback(enabled: bool) -> Fallback {
    Arc::new(move |unrouted: &Unrouted| {
        if !enabled {
            return;
        }
        match &unrouted.reason {
            FallbackReason::Schema(error) => warn!(
                channel = %unrouted.channel,
                domain = %unrouted.domain,
                request = ?unrouted.request,
                source = ?unrouted.source,
                kind = error.kind().description(),
                error = %error,
                "Dropping envelope"
            ),
            FallbackReason::NoHandler(key) => warn!(
                channel = %unrouted.channel,
                key = %key,
                source = ?unrouted.source,
                "No handler registered"
            ),
        }
    })
}

/// Routes envelopes of channel `M` to handlers.
///
/// The registry can be replaced at runtime with
/// [`swap_registry`](Self::swap_registry); in-flight dispatches keep the
/// registry they started with.
pub struct Router<M: Message> {
    config: RouterConfig,
    registry: ArcSwap<HandlerRegistry<M>>,
    fallback: Fallback,
}

impl<M: Message> Router<M> {
    pub fn new(config: RouterConfig, registry: HandlerRegistry<M>) -> Self {
        let fallback = logging_fallback(config.log_unhandled);
        Self {
            config,
            registry: ArcSwap::from_pointee(registry),
            fallback,
        }
    }

    /// Replaces the default logging fallback.
    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&Unrouted) + Send + Sync + 'static,
    {
        self.fallback = Arc::new(fallback);
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Atomically installs a new registry.
    pub fn swap_registry(&self, registry: HandlerRegistry<M>) {
        debug!(channel = %M::CHANNEL, handlers = registry.len(), "Swapping handler registry");
        self.registry.store(Arc::new(registry));
    }

    /// Validates `raw` against this router's channel.
    pub fn validate(&self, raw: RawEnvelope) -> Result<TypedEnvelope<M>, SchemaError> {
        validate::<M>(raw)
    }

    /// Decodes wire bytes with the configured size limit.
    pub fn decode_bytes(&self, data: &[u8]) -> RouterResult<RawEnvelope> {
        Ok(decode_envelope(data, self.config.max_message_size)?)
    }

    /// Validates `raw` and runs the matching handler.
    ///
    /// Never panics: handler panics and timeouts become
    /// [`DispatchOutcome::Failed`].
    pub async fn dispatch(&self, raw: RawEnvelope) -> DispatchOutcome {
        let span = info_span!(
            "dispatch",
            channel = %M::CHANNEL,
            domain = %raw.domain,
            request = ?raw.request,
            elapsed_ms = field::Empty,
        );
        let started = Instant::now();
        let outcome = self.dispatch_inner(raw).instrument(span.clone()).await;
        span.record("elapsed_ms", started.elapsed().as_millis() as u64);
        outcome
    }

    async fn dispatch_inner(&self, raw: RawEnvelope) -> DispatchOutcome {
        let domain = raw.domain.clone();
        let request = raw.request.clone();
        let source = raw.source.clone();
        let unrouted = |reason| Unrouted {
            channel: M::CHANNEL,
            domain: domain.clone(),
            request: request.clone(),
            source: source.clone(),
            reason,
        };

        let typed = match self.validate(raw) {
            Ok(typed) => typed,
            Err(error) => {
                (self.fallback)(&unrouted(FallbackReason::Schema(error.clone())));
                return if error.is_version_skew() {
                    DispatchOutcome::Unhandled
                } else {
                    DispatchOutcome::Rejected(error)
                };
            }
        };

        let registry = self.registry.load_full();
        let Some(handler) = registry.lookup(&typed.route).cloned() else {
            (self.fallback)(&unrouted(FallbackReason::NoHandler(typed.route)));
            return DispatchOutcome::Unhandled;
        };

        let timeout = self.config.handler_timeout();
        let run = AssertUnwindSafe(async move { handler(typed).await }).catch_unwind();
        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(Ok(()))) => DispatchOutcome::Handled,
            Ok(Ok(Err(error))) => {
                warn!(error = %error, "Handler failed");
                DispatchOutcome::Failed(error)
            }
            Ok(Err(panic)) => {
                let error = HandlerError::Panicked(panic_message(panic.as_ref()));
                warn!(error = %error, "Handler panicked");
                DispatchOutcome::Failed(error)
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Handler timed out");
                DispatchOutcome::Failed(HandlerError::TimedOut(timeout))
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use deskthing_protocol::{AppMessage, Scope, channels::TaskRequest};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    type Seen = Arc<Mutex<Vec<String>>>;

    fn task_add() -> RawEnvelope {
        RawEnvelope::new("task")
            .with_request("add")
            .with_source("todo")
            .with_payload(json!({"task": {"id": "t1", "steps": {}}}))
    }

    fn recording_router(seen: &Seen, unrouted: &Arc<Mutex<Vec<Unrouted>>>) -> Router<AppMessage> {
        let seen = seen.clone();
        let registry = RegistryBuilder::<AppMessage>::new()
            .on(RouteKey::new(Scope::App, "task", Some("add")), move |typed| {
                let seen = seen.clone();
                async move {
                    if let AppMessage::Task(TaskRequest::Add(add)) = typed.message {
                        seen.lock().unwrap().push(add.task.id);
                    }
                    Ok(())
                }
            })
            .unwrap()
            .on(RouteKey::wildcard(Scope::App, "agent"), |_| async { Ok(()) })
            .unwrap()
            .build();
        let unrouted = unrouted.clone();
        Router::new(RouterConfig::default(), registry)
            .with_fallback(move |u| unrouted.lock().unwrap().push(u.clone()))
    }

    #[tokio::test]
    async fn dispatches_to_exact_handler() {
        let seen = Seen::default();
        let unrouted = Arc::default();
        let router = recording_router(&seen, &unrouted);

        assert_eq!(router.dispatch(task_add()).await, DispatchOutcome::Handled);
        assert_eq!(*seen.lock().unwrap(), vec!["t1"]);
        assert!(unrouted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_request_goes_to_fallback() {
        let seen = Seen::default();
        let unrouted = Arc::default();
        let router = recording_router(&seen, &unrouted);

        let raw = RawEnvelope::new("task").with_request("bogus").with_source("todo");
        assert_eq!(router.dispatch(raw).await, DispatchOutcome::Unhandled);
        let raw = RawEnvelope::new("teleport").with_source("todo");
        assert_eq!(router.dispatch(raw).await, DispatchOutcome::Unhandled);

        let unrouted = unrouted.lock().unwrap();
        assert_eq!(unrouted.len(), 2);
        assert!(matches!(
            &unrouted[0].reason,
            FallbackReason::Schema(SchemaError::UnknownRequest { .. })
        ));
        assert!(matches!(
            &unrouted[1].reason,
            FallbackReason::Schema(SchemaError::UnknownDomain { .. })
        ));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_correlation_is_rejected() {
        let seen = Seen::default();
        let unrouted = Arc::default();
        let router = recording_router(&seen, &unrouted);

        let body = json!({"id": "m1", "role": "assistant", "content": "hi"});
        let raw = RawEnvelope::new("agent")
            .with_request("response")
            .with_source("assistant")
            .with_payload(body);

        let outcome = router.dispatch(raw.clone()).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Rejected(SchemaError::MissingCorrelationId { .. })
        ));
        assert_eq!(router.dispatch(raw.with_client_id("abc")).await, DispatchOutcome::Handled);
    }

    #[tokio::test]
    async fn client_scope_never_reaches_app_handlers() {
        let seen = Seen::default();
        let unrouted = Arc::default();
        let router = recording_router(&seen, &unrouted);

        let spoofed = task_add().with_source("client");
        assert_eq!(router.dispatch(spoofed).await, DispatchOutcome::Unhandled);
        assert!(seen.lock().unwrap().is_empty());
        assert!(matches!(
            &unrouted.lock().unwrap()[0].reason,
            FallbackReason::NoHandler(key) if key.scope == Scope::Client
        ));
    }

    #[tokio::test]
    async fn swap_registry_takes_effect() {
        let router = Router::new(RouterConfig::default(), HandlerRegistry::<AppMessage>::default())
            .with_fallback(|_| {});
        assert_eq!(router.dispatch(task_add()).await, DispatchOutcome::Unhandled);

        let registry = RegistryBuilder::new()
            .on(RouteKey::wildcard(Scope::App, "task"), |_| async { Ok(()) })
            .unwrap()
            .build();
        router.swap_registry(registry);
        assert_eq!(router.dispatch(task_add()).await, DispatchOutcome::Handled);
    }

    #[tokio::test]
    async fn handler_errors_are_reported() {
        let registry = RegistryBuilder::<AppMessage>::new()
            .on(RouteKey::wildcard(Scope::App, "task"), |_| async {
                Err(HandlerError::failed("disk full"))
            })
            .unwrap()
            .build();
        let router = Router::new(RouterConfig::default(), registry);
        assert_eq!(
            router.dispatch(task_add()).await,
            DispatchOutcome::Failed(HandlerError::Failed("disk full".into()))
        );
    }

    #[tokio::test]
    async fn handler_panic_is_contained() {
        let registry = RegistryBuilder::<AppMessage>::new()
            .on(RouteKey::wildcard(Scope::App, "task"), |typed| async move {
                if typed.domain() == "task" {
                    panic!("boom");
                }
                Ok(())
            })
            .unwrap()
            .build();
        let router = Router::new(RouterConfig::default(), registry);
        assert_eq!(
            router.dispatch(task_add()).await,
            DispatchOutcome::Failed(HandlerError::Panicked("boom".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let registry = RegistryBuilder::<AppMessage>::new()
            .on(RouteKey::wildcard(Scope::App, "task"), |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .unwrap()
            .build();
        let config = RouterConfig::default().with_handler_timeout(Duration::from_millis(100));
        let router = Router::new(config, registry);
        assert_eq!(
            router.dispatch(task_add()).await,
            DispatchOutcome::Failed(HandlerError::TimedOut(Duration::from_millis(100)))
        );
    }

    #[test]
    fn decode_bytes_honors_size_limit() {
        let router = Router::new(
            RouterConfig::default().with_max_message_size(16),
            HandlerRegistry::<AppMessage>::default(),
        );
        assert!(router.decode_bytes(br#"{"type":"ping"}"#).is_ok());
        assert!(router.decode_bytes(br#"{"type":"task","request":"add"}"#).is_err());
    }
}
