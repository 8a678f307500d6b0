//! The proxy's routes: a few `/__sw/` control endpoints that fire worker
//! events by hand, and a fallback that turns every other request into a
//! fetch event.
//!
//! | Route                                              | Effect                          |
//! |----------------------------------------------------|---------------------------------|
//! | `POST /__sw/sync?tag=<tag>`                        | sync event (configured tag by default) |
//! | `POST /__sw/push`                                  | push event; the body is the payload |
//! | `POST /__sw/notificationclick?id=<id>&action=<a>`  | notification click event        |
//! | `GET /__sw/notifications`                          | notifications currently shown   |
//! | `GET /__sw/caches`                                 | namespace names and entry counts |
//! | anything else                                      | fetch event                     |

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use super::Router;
use crate::context::Context;
use crate::notify::NotificationClick;
use crate::offline::OfflineCacheManager;
use crate::worker::{EventOutcome, WorkerError, WorkerHandle};
use crate::{Response, StatusCode};

/// Builds the proxy router around a running worker.
pub fn routes(worker: WorkerHandle, manager: Arc<OfflineCacheManager>) -> Router {
    let mut router = Router::new();

    let handle = worker.clone();
    let default_tag = manager.config().sync_tag.clone();
    router.post("/__sw/sync", move |ctx: Context| {
        let handle = handle.clone();
        let tag = ctx.query("tag").unwrap_or(default_tag.as_str()).to_owned();
        async move {
            let result = handle.sync(tag.clone()).await;
            event_response("sync", result, json!({ "tag": tag }))
        }
    });

    let handle = worker.clone();
    router.post("/__sw/push", move |ctx: Context| {
        let handle = handle.clone();
        async move {
            let body = ctx.request().body();
            let data = (!body.is_empty()).then(|| body.clone());
            let result = handle.push(data).await;
            event_response("push", result, json!({}))
        }
    });

    let handle = worker.clone();
    router.post("/__sw/notificationclick", move |ctx: Context| {
        let handle = handle.clone();
        async move {
            let notification_id = match ctx.query("id").map(str::parse::<u64>).transpose() {
                Ok(id) => id,
                Err(e) => return error_response(StatusCode::BAD_REQUEST, &format!("invalid id: {e}")),
            };
            let click = NotificationClick {
                notification_id,
                action: ctx.query("action").map(str::to_owned),
            };
            let result = handle.notification_click(click).await;
            event_response("notificationclick", result, json!({ "id": notification_id }))
        }
    });

    let center = Arc::clone(manager.notifications());
    router.get("/__sw/notifications", move |_ctx: Context| {
        let center = Arc::clone(&center);
        async move { Response::json(&center.list().await) }
    });

    let storage = Arc::clone(manager.storage());
    router.get("/__sw/caches", move |_ctx: Context| {
        let storage = Arc::clone(&storage);
        async move {
            let mut counts = BTreeMap::new();
            for name in storage.keys().await {
                let entries = storage.open(&name).await.len().await;
                counts.insert(name, entries);
            }
            Response::json(&counts)
        }
    });

    router.fallback(move |ctx: Context| {
        let worker = worker.clone();
        async move {
            let request = ctx.into_request();
            let url = request.url().to_owned();
            match worker.fetch(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(url = %url, error = %e, "fetch event failed");
                    error_response(status_for(&e), &e)
                }
            }
        }
    });

    router
}

fn event_response(
    event: &str,
    result: Result<EventOutcome, WorkerError>,
    mut details: serde_json::Value,
) -> Response {
    match result {
        Ok(outcome) => {
            let outcome = match outcome {
                EventOutcome::Responded(_) => "responded",
                EventOutcome::Handled => "handled",
                EventOutcome::Ignored => "ignored",
            };
            details["event"] = json!(event);
            details["outcome"] = json!(outcome);
            json_response(StatusCode::ACCEPTED, &details)
        }
        Err(e) => {
            warn!(event, error = %e, "event failed");
            error_response(status_for(&e), &e)
        }
    }
}

fn status_for(error: &WorkerError) -> StatusCode {
    match error {
        WorkerError::Fetch(_) | WorkerError::NoResponse(_) => StatusCode::BAD_GATEWAY,
        WorkerError::Notify(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkerError::NoActiveWorker | WorkerError::LoopClosed | WorkerError::NotActive { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, error: &dyn std::fmt::Display) -> Response {
    json_response(status, &json!({ "error": error.to_string() }))
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response {
    Response::new(status)
        .header("Content-Type", "application/json")
        .body(body.to_string())
}
