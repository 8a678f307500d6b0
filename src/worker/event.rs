//! Typed worker events and the "extend lifetime" contract.
//!
//! Handlers never receive a bare [`Event`]; they get an [`ExtendableEvent`],
//! which lets them hand work to the runtime with
//! [`wait_until`](ExtendableEvent::wait_until). The dispatcher does not
//! consider the event settled until every such task, including tasks those
//! tasks register in turn, has finished.

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::WorkerError;
use crate::http::{Request, Response};
use crate::notify::NotificationClick;

/// Discriminant of an [`Event`], used to key the handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Sync,
    Push,
    NotificationClick,
}

impl EventKind {
    /// Functional events are the ones only an activated worker may receive.
    pub fn is_functional(self) -> bool {
        !matches!(self, Self::Install | Self::Activate)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Fetch => "fetch",
            Self::Sync => "sync",
            Self::Push => "push",
            Self::NotificationClick => "notificationclick",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Sync { tag: String },
    /// `data` is `None` when the push message carried no payload.
    Push { data: Option<Bytes> },
    NotificationClick(NotificationClick),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Install => EventKind::Install,
            Self::Activate => EventKind::Activate,
            Self::Fetch(_) => EventKind::Fetch,
            Self::Sync { .. } => EventKind::Sync,
            Self::Push { .. } => EventKind::Push,
            Self::NotificationClick(_) => EventKind::NotificationClick,
        }
    }
}

/// What a handler did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A fetch handler answered the request. Later handlers are skipped.
    Responded(Response),
    Handled,
    /// The handler chose not to act, e.g. a sync with a foreign tag.
    Ignored,
}

type PendingTask = JoinHandle<Result<(), WorkerError>>;

/// Registration side of the extend-lifetime contract. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Lifetime {
    tx: mpsc::UnboundedSender<PendingTask>,
}

/// Settlement side: owned by the dispatcher.
#[derive(Debug)]
pub struct PendingTasks {
    rx: mpsc::UnboundedReceiver<PendingTask>,
}

impl Lifetime {
    pub fn channel() -> (Self, PendingTasks) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, PendingTasks { rx })
    }

    /// Spawns `task` and keeps the event alive until it completes.
    pub fn extend<F>(&self, task: F)
    where
        F: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        if self.tx.send(handle).is_err() {
            warn!("event already settled; extended task runs detached");
        }
    }
}

impl PendingTasks {
    /// Awaits every registered task, including ones registered while waiting.
    ///
    /// All tasks run to completion; the first failure is returned.
    pub async fn settle(mut self) -> Result<(), WorkerError> {
        let mut first_error = None;
        while let Ok(task) = self.rx.try_recv() {
            let result = match task.await {
                Ok(result) => result,
                Err(join) => Err(WorkerError::TaskFailed(join.to_string())),
            };
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// An event as delivered to a handler.
#[derive(Debug)]
pub struct ExtendableEvent {
    event: Event,
    lifetime: Lifetime,
}

impl ExtendableEvent {
    pub fn new(event: Event, lifetime: Lifetime) -> Self {
        Self { event, lifetime }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }

    /// Keeps the worker alive until `task` settles. A failing task fails the event.
    pub fn wait_until<F>(&self, task: F)
    where
        F: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        self.lifetime.extend(task);
    }

    /// A handle for registering more work from inside an extended task.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime.clone()
    }
}
