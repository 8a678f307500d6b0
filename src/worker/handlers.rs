//! The registered-handler table.
//!
//! Handlers are stored per [`EventKind`] in registration order, type-erased
//! behind `Arc<dyn Fn(...)>` so the table can be shared without copying
//! closures.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::WorkerError;
use super::event::{EventKind, EventOutcome, ExtendableEvent};

/// Boxed future returned by every event handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<EventOutcome, WorkerError>> + Send>>;

/// Type-erased event handler.
pub type EventHandler = Arc<dyn Fn(ExtendableEvent) -> HandlerFuture + Send + Sync + 'static>;

/// Handlers keyed by event kind.
///
/// # Examples
///
/// ```rust
/// use swcache::worker::{EventKind, EventOutcome, HandlerTable};
///
/// let mut table = HandlerTable::new();
/// table.on(EventKind::Install, |_event| async { Ok(EventOutcome::Handled) });
/// assert_eq!(table.handlers(EventKind::Install).len(), 1);
/// assert!(table.handlers(EventKind::Fetch).is_empty());
/// ```
#[derive(Default, Clone)]
pub struct HandlerTable {
    handlers: HashMap<EventKind, Vec<EventHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`, after any handler already registered for it.
    pub fn on<H, F>(&mut self, kind: EventKind, handler: H)
    where
        H: Fn(ExtendableEvent) -> F + Send + Sync + 'static,
        F: Future<Output = Result<EventOutcome, WorkerError>> + Send + 'static,
    {
        let handler: EventHandler =
            Arc::new(move |event: ExtendableEvent| -> HandlerFuture { Box::pin(handler(event)) });
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Handlers for `kind`, in registration order.
    pub fn handlers(&self, kind: EventKind) -> &[EventHandler] {
        self.handlers.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self
            .handlers
            .iter()
            .map(|(kind, handlers)| (kind.as_str(), handlers.len()))
            .collect();
        f.debug_struct("HandlerTable").field("handlers", &counts).finish()
    }
}
