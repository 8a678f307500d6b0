//! Worker runtime: lifecycle state machine, typed event dispatch, and the
//! event loop that feeds it.
//!
//! ## Core types
//!
//! - [`ServiceWorker`]: one worker generation, a [`HandlerTable`] plus a
//!   [`LifecycleState`] that gates which events it accepts.
//! - [`Registration`]: installs new generations and retires the old one.
//! - [`EventLoop`] / [`WorkerHandle`]: deliver functional events to
//!   whichever generation is active.
//! - [`ExtendableEvent`]: what handlers receive; carries the
//!   extend-lifetime registration.

mod event;
mod event_loop;
mod handlers;
mod lifecycle;
mod registration;

pub use event::{Event, EventKind, EventOutcome, ExtendableEvent, Lifetime, PendingTasks};
pub use event_loop::{EventLoop, WorkerHandle};
pub use handlers::{EventHandler, HandlerFuture, HandlerTable};
pub use lifecycle::LifecycleState;
pub use registration::Registration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::http::{Request, Response, StatusCode};
use crate::network::FetchError;
use crate::notify::NotifyError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("worker is {state}; cannot handle {event} events")]
    NotActive {
        state: LifecycleState,
        event: EventKind,
    },

    #[error("{0} is a lifecycle event and cannot be dispatched directly")]
    NotFunctional(EventKind),

    #[error("failed to precache {url}: {source}")]
    PrecacheFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to precache {url}: upstream answered {status}")]
    PrecacheStatus { url: String, status: StatusCode },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("no handler responded to the fetch event for {0}")]
    NoResponse(String),

    #[error("no active worker")]
    NoActiveWorker,

    #[error("worker event loop has shut down")]
    LoopClosed,

    #[error("extended task failed: {0}")]
    TaskFailed(String),
}

/// One worker generation.
///
/// # Examples
///
/// ```rust
/// use swcache::worker::{EventKind, EventOutcome, HandlerTable, LifecycleState, ServiceWorker};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), swcache::worker::WorkerError> {
/// let mut handlers = HandlerTable::new();
/// handlers.on(EventKind::Install, |_event| async { Ok(EventOutcome::Handled) });
///
/// let worker = ServiceWorker::new("v1", handlers);
/// worker.install().await?;
/// worker.activate().await?;
/// assert_eq!(worker.state(), LifecycleState::Activated);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ServiceWorker {
    version: String,
    handlers: HandlerTable,
    state: watch::Sender<LifecycleState>,
}

impl ServiceWorker {
    pub fn new(version: impl Into<String>, handlers: HandlerTable) -> Self {
        let (state, _) = watch::channel(LifecycleState::Parsed);
        Self {
            version: version.into(),
            handlers,
            state,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Observes state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Runs the install event. Every extended task must succeed; otherwise the
    /// worker becomes [`LifecycleState::Redundant`] and the error is returned.
    pub async fn install(&self) -> Result<(), WorkerError> {
        self.transition(LifecycleState::Installing)?;
        match self.dispatch(Event::Install).await {
            Ok(_) => self.transition(LifecycleState::Installed),
            Err(e) => {
                warn!(version = %self.version, error = %e, "install failed");
                self.retire();
                Err(e)
            }
        }
    }

    /// Runs the activate event. The worker ends up activated even if a
    /// handler failed; the failure is still reported.
    pub async fn activate(&self) -> Result<(), WorkerError> {
        self.transition(LifecycleState::Activating)?;
        let result = self.dispatch(Event::Activate).await;
        self.transition(LifecycleState::Activated)?;
        result.map(|_| ())
    }

    /// Waits until the worker is past activation, in either direction.
    pub async fn ready(&self) -> LifecycleState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| !state.is_pending_activation()).await {
            Ok(state) => *state,
            // The sender lives in `self`, so it cannot be gone while we borrow it.
            Err(_) => self.state(),
        }
    }

    /// Dispatches a functional event. Only an activated worker accepts them.
    pub async fn handle(&self, event: Event) -> Result<EventOutcome, WorkerError> {
        let kind = event.kind();
        if !kind.is_functional() {
            return Err(WorkerError::NotFunctional(kind));
        }
        let state = self.state();
        if state != LifecycleState::Activated {
            return Err(WorkerError::NotActive { state, event: kind });
        }
        self.dispatch(event).await
    }

    /// Dispatches a fetch event and returns the response a handler produced.
    pub async fn fetch(&self, request: Request) -> Result<Response, WorkerError> {
        let url = request.url().to_owned();
        match self.handle(Event::Fetch(request)).await? {
            EventOutcome::Responded(response) => Ok(response),
            EventOutcome::Handled | EventOutcome::Ignored => Err(WorkerError::NoResponse(url)),
        }
    }

    /// Marks the worker redundant. Idempotent.
    pub fn retire(&self) {
        let previous = self.state.send_replace(LifecycleState::Redundant);
        if previous != LifecycleState::Redundant {
            info!(version = %self.version, from = %previous, "worker retired");
        }
    }

    fn transition(&self, to: LifecycleState) -> Result<(), WorkerError> {
        let mut result = Ok(());
        self.state.send_if_modified(|current| {
            if current.can_transition_to(to) {
                debug!(version = %self.version, from = %current, to = %to, "lifecycle transition");
                *current = to;
                true
            } else {
                result = Err(WorkerError::InvalidTransition { from: *current, to });
                false
            }
        });
        result
    }

    /// Runs every handler for the event, then settles its extended lifetime.
    ///
    /// For fetch events the first `Responded` outcome ends handler iteration.
    /// A handler error also ends iteration; pending tasks are still awaited
    /// before it is returned.
    async fn dispatch(&self, event: Event) -> Result<EventOutcome, WorkerError> {
        let kind = event.kind();
        let (lifetime, pending) = Lifetime::channel();
        let mut outcome = EventOutcome::Ignored;
        let mut handler_result = Ok(());

        for handler in self.handlers.handlers(kind) {
            match handler(ExtendableEvent::new(event.clone(), lifetime.clone())).await {
                Ok(EventOutcome::Responded(response)) => {
                    outcome = EventOutcome::Responded(response);
                    break;
                }
                Ok(EventOutcome::Handled) => outcome = EventOutcome::Handled,
                Ok(EventOutcome::Ignored) => {}
                Err(e) => {
                    handler_result = Err(e);
                    break;
                }
            }
        }
        drop(lifetime);

        let settled = pending.settle().await;
        handler_result?;
        settled?;
        Ok(outcome)
    }
}
