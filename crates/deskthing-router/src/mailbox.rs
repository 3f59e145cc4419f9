//! Per-sender FIFO delivery.
//!
//! Each sender gets its own worker task. Envelopes from one sender are
//! dispatched in send order; a slow handler only delays its own sender.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, error, info_span, warn};

use deskthing_protocol::{AppId, Message, RawEnvelope};

use crate::error::{HandlerError, RouterError, RouterResult};
use crate::router::{DispatchOutcome, Router, panic_message};

/// Who a mailbox delivers for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SenderId {
    /// A connected client, by client id.
    Client(String),
    /// A third-party app.
    App(AppId),
}

impl SenderId {
    pub fn client(id: impl Into<String>) -> Self {
        Self::Client(id.into())
    }

    /// Fails when `id` is one of the reserved identifiers.
    pub fn app(id: impl Into<String>) -> RouterResult<Self> {
        Ok(Self::App(AppId::new(id)?))
    }

    /// Binds `raw` to this sender.
    ///
    /// App envelopes always carry the app's own id as source and never a
    /// reserved id as app. Client envelopes get the client id when they
    /// carry none.
    fn stamp(&self, mut raw: RawEnvelope) -> RawEnvelope {
        match self {
            Self::App(app) => {
                if raw.app.as_deref().is_some_and(|target| AppId::new(target).is_err()) {
                    warn!(sender = %app, app = ?raw.app, "Dropping reserved app id");
                    raw.app = None;
                }
                raw.source = Some(app.as_str().to_string());
            }
            Self::Client(id) => {
                if raw.client_id.is_none() {
                    raw.client_id = Some(id.clone());
                }
            }
        }
        raw
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(id) => write!(f, "client:{}", id),
            Self::App(app) => write!(f, "app:{}", app),
        }
    }
}

enum Job {
    Deliver {
        raw: RawEnvelope,
        reply: Option<oneshot::Sender<DispatchOutcome>>,
    },
    Close(oneshot::Sender<()>),
}

/// Handle to a sender's worker.
///
/// The worker stops once every handle is dropped or [`close`](Self::close)
/// is called; envelopes already queued are still delivered.
#[derive(Clone)]
pub struct Mailbox {
    sender: SenderId,
    tx: mpsc::Sender<Job>,
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("sender", &self.sender)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl Mailbox {
    pub fn sender(&self) -> &SenderId {
        &self.sender
    }

    /// Queues `raw`; waits only when the mailbox is full.
    pub async fn send(&self, raw: RawEnvelope) -> RouterResult<()> {
        self.enqueue(Job::Deliver { raw, reply: None }).await
    }

    /// Queues `raw` and waits for its dispatch outcome.
    pub async fn send_and_wait(&self, raw: RawEnvelope) -> RouterResult<DispatchOutcome> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(Job::Deliver {
            raw,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| self.closed())
    }

    /// Stops the worker for every handle of this mailbox.
    ///
    /// Returns once the worker has stopped accepting envelopes.
    pub async fn close(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Job::Close(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    async fn enqueue(&self, job: Job) -> RouterResult<()> {
        self.tx.send(job).await.map_err(|_| self.closed())
    }

    fn closed(&self) -> RouterError {
        RouterError::MailboxClosed {
            sender: self.sender.to_string(),
        }
    }
}

impl<M: Message> Router<M> {
    /// Spawns a FIFO worker for `sender`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn mailbox(self: &Arc<Self>, sender: SenderId) -> Mailbox {
        let (tx, mut rx) = mpsc::channel::<Job>(self.config().mailbox_capacity.max(1));
        let router = Arc::clone(self);
        let span = info_span!("mailbox", sender = %sender);

        tokio::spawn(
            async move {
                debug!("Mailbox started");
                while let Some(job) = rx.recv().await {
                    let (raw, reply) = match job {
                        Job::Deliver { raw, reply } => (raw, reply),
                        Job::Close(ack) => {
                            debug!("Closing mailbox");
                            rx.close();
                            let _ = ack.send(());
                            continue;
                        }
                    };
                    let outcome = AssertUnwindSafe(router.dispatch(raw))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| {
                            let message = panic_message(panic.as_ref());
                            error!(panic = %message, "Dispatch panicked");
                            DispatchOutcome::Failed(HandlerError::Panicked(message))
                        });
                    if let Some(reply) = reply {
                        // The caller may have stopped waiting.
                        let _ = reply.send(outcome);
                    }
                }
                debug!("Mailbox stopped");
            }
            .instrument(span),
        );

        Mailbox { sender, tx }
    }

    /// Spawns a worker and stamps every envelope with `sender` before
    /// dispatch.
    pub fn bound_mailbox(self: &Arc<Self>, sender: SenderId) -> BoundMailbox {
        BoundMailbox {
            inner: self.mailbox(sender),
        }
    }
}

/// A [`Mailbox`] that binds envelopes to its sender.
///
/// Apps cannot spoof another source through it, and client envelopes are
/// correlated with the client id.
#[derive(Debug, Clone)]
pub struct BoundMailbox {
    inner: Mailbox,
}

impl BoundMailbox {
    pub fn sender(&self) -> &SenderId {
        self.inner.sender()
    }

    pub async fn send(&self, raw: RawEnvelope) -> RouterResult<()> {
        self.inner.send(self.inner.sender.stamp(raw)).await
    }

    pub async fn send_and_wait(&self, raw: RawEnvelope) -> RouterResult<DispatchOutcome> {
        self.inner.send_and_wait(self.inner.sender.stamp(raw)).await
    }

    pub async fn close(&self) {
        self.inner.close().await;
    }
}
