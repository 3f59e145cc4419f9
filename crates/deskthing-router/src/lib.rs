//! Handler registry, dispatch and per-sender mailboxes.
//!
//! This crate routes validated DeskThing envelopes to handlers:
//! - A [`RegistryBuilder`] collects handlers keyed by [`RouteKey`] and rejects
//!   keys the channel never produces
//! - A [`Router`] validates envelopes and dispatches them, sending anything
//!   unroutable to a fallback
//! - A [`Mailbox`] serializes delivery per sender
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use deskthing_protocol::{AppMessage, RawEnvelope, RouteKey, Scope};
//! use deskthing_router::{DispatchOutcome, RegistryBuilder, Router, RouterConfig, SenderId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = RegistryBuilder::<AppMessage>::new()
//!         .on(RouteKey::new(Scope::App, "task", Some("get")), |_| async { Ok(()) })?
//!         .build();
//!     let router = Arc::new(Router::new(RouterConfig::default(), registry));
//!
//!     let mailbox = router.bound_mailbox(SenderId::app("todo")?);
//!     let outcome = mailbox
//!         .send_and_wait(RawEnvelope::new("task").with_request("get"))
//!         .await?;
//!     assert_eq!(outcome, DispatchOutcome::Handled);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod mailbox;
mod registry;
mod router;

pub use config::RouterConfig;
pub use error::{HandlerError, RouterError, RouterResult};
pub use mailbox::{BoundMailbox, Mailbox, SenderId};
pub use registry::{Handler, HandlerFuture, HandlerRegistry, RegistryBuilder, handler};
pub use router::{DispatchOutcome, Fallback, FallbackReason, Router, Unrouted};
