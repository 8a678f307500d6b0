use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{Event, EventOutcome, LifecycleState, Registration, ServiceWorker, WorkerError};
use crate::http::{Request, Response};
use crate::notify::NotificationClick;

struct Envelope {
    event: Event,
    reply: oneshot::Sender<Result<EventOutcome, WorkerError>>,
}

/// Receives typed functional events and dispatches each on its own task to
/// the registration's active worker.
///
/// Events are independent: nothing orders one request's handling relative to
/// another's. An event that arrives while a new generation is activating
/// waits for activation to finish.
pub struct EventLoop;

impl EventLoop {
    /// Spawns the loop. It stops once every [`WorkerHandle`] is dropped.
    pub fn spawn(registration: Arc<Registration>, capacity: usize) -> (WorkerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run(registration, rx));
        (WorkerHandle { tx }, task)
    }
}

async fn run(registration: Arc<Registration>, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(Envelope { event, reply }) = rx.recv().await {
        trace!(event = %event.kind(), "event received");
        let registration = Arc::clone(&registration);
        tokio::spawn(async move {
            let result = match registration.active().await {
                Some(worker) => deliver(&registration, worker, event).await,
                None => Err(WorkerError::NoActiveWorker),
            };
            // The caller may have given up waiting; nothing to do then.
            let _ = reply.send(result);
        });
    }
    debug!("worker event loop stopped");
}

/// Hands `event` to `worker` once it has settled. If it was superseded in
/// the meantime, the event follows the registration to its successor.
async fn deliver(
    registration: &Registration,
    mut worker: Arc<ServiceWorker>,
    event: Event,
) -> Result<EventOutcome, WorkerError> {
    while worker.ready().await == LifecycleState::Redundant {
        match registration.active().await {
            Some(next) if !Arc::ptr_eq(&next, &worker) => {
                trace!(from = %worker.version(), to = %next.version(), "following superseding worker");
                worker = next;
            }
            _ => break,
        }
    }
    worker.handle(event).await
}

/// Sends events to a running [`EventLoop`]. Cheap to clone.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
}

impl WorkerHandle {
    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { event, reply })
            .await
            .map_err(|_| WorkerError::LoopClosed)?;
        rx.await.map_err(|_| WorkerError::LoopClosed)?
    }

    pub async fn fetch(&self, request: Request) -> Result<Response, WorkerError> {
        let url = request.url().to_owned();
        match self.dispatch(Event::Fetch(request)).await? {
            EventOutcome::Responded(response) => Ok(response),
            EventOutcome::Handled | EventOutcome::Ignored => Err(WorkerError::NoResponse(url)),
        }
    }

    pub async fn sync(&self, tag: impl Into<String>) -> Result<EventOutcome, WorkerError> {
        self.dispatch(Event::Sync { tag: tag.into() }).await
    }

    pub async fn push(&self, data: Option<Bytes>) -> Result<EventOutcome, WorkerError> {
        self.dispatch(Event::Push { data }).await
    }

    pub async fn notification_click(
        &self,
        click: NotificationClick,
    ) -> Result<EventOutcome, WorkerError> {
        self.dispatch(Event::NotificationClick(click)).await
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;
    use crate::worker::{EventKind, ExtendableEvent, HandlerTable};

    fn echo_worker(version: &'static str) -> Arc<ServiceWorker> {
        let mut table = HandlerTable::new();
        table.on(EventKind::Fetch, move |event: ExtendableEvent| async move {
            let path = match event.event() {
                Event::Fetch(request) => request.path().to_owned(),
                _ => String::new(),
            };
            Ok(EventOutcome::Responded(
                Response::new(StatusCode::OK).body(format!("{version}:{path}")),
            ))
        });
        Arc::new(ServiceWorker::new(version, table))
    }

    #[tokio::test]
    async fn no_active_worker_is_reported() {
        let (handle, _task) = EventLoop::spawn(Arc::new(Registration::new("/")), 8);
        assert!(matches!(
            handle.fetch(Request::get("/")).await,
            Err(WorkerError::NoActiveWorker)
        ));
    }

    #[tokio::test]
    async fn events_reach_the_active_generation() {
        let registration = Arc::new(Registration::new("/"));
        registration.register(echo_worker("v1")).await.unwrap();
        let (handle, _task) = EventLoop::spawn(Arc::clone(&registration), 8);

        let response = handle.fetch(Request::get("/a")).await.unwrap();
        assert_eq!(response.text(), "v1:/a");

        registration.register(echo_worker("v2")).await.unwrap();
        let response = handle.fetch(Request::get("/b")).await.unwrap();
        assert_eq!(response.text(), "v2:/b");
    }

    #[tokio::test]
    async fn event_for_a_retired_generation_reaches_its_successor() {
        let registration = Registration::new("/");
        registration.register(echo_worker("v1")).await.unwrap();
        let stale = registration.active().await.unwrap();
        registration.register(echo_worker("v2")).await.unwrap();
        assert_eq!(stale.state(), LifecycleState::Redundant);

        let outcome = deliver(&registration, stale, Event::Fetch(Request::get("/c")))
            .await
            .unwrap();
        match outcome {
            EventOutcome::Responded(response) => assert_eq!(response.text(), "v2:/c"),
            _ => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn unregistered_scope_keeps_rejecting_retired_worker() {
        let registration = Registration::new("/");
        registration.register(echo_worker("v1")).await.unwrap();
        let stale = registration.active().await.unwrap();
        registration.unregister().await;

        let result = deliver(&registration, stale, Event::Fetch(Request::get("/"))).await;
        assert!(matches!(
            result,
            Err(WorkerError::NotActive { state: LifecycleState::Redundant, .. })
        ));
    }

    #[tokio::test]
    async fn loop_stops_when_handles_drop() {
        let (handle, task) = EventLoop::spawn(Arc::new(Registration::new("/")), 1);
        drop(handle);
        task.await.unwrap();
    }
}
