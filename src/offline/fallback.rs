//! Canned content for when neither the network nor a cache can answer.

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::http::response::{SERVED_BY_HEADER, SERVED_BY_WORKER};
use crate::http::{Response, StatusCode};

/// Paths with a dedicated offline payload.
pub const FALLBACK_PATHS: [&str; 3] = ["/api/health", "/api/courses", "/api/market/news"];

/// Marker text present in the offline page, for clients and tests.
pub const OFFLINE_PAGE_MARKER: &str = "Modo Offline";

/// Returns the offline payload for `path`, if it is one of [`FALLBACK_PATHS`].
///
/// The market news item is stamped with the current time on every call.
pub fn offline_payload(path: &str) -> Option<Value> {
    let payload = match path {
        "/api/health" => json!({
            "status": "offline",
            "message": "App is running offline",
        }),
        "/api/courses" => json!([{
            "module_id": "offline_basic",
            "title": "Contenido Offline Disponible",
            "description": "Algunos cursos están disponibles offline",
            "level": "beginner",
            "pair": "EURUSD",
            "content": "Este contenido está disponible offline para tu aprendizaje continuo.",
            "video_content": "Videos disponibles offline",
        }]),
        "/api/market/news" => json!([{
            "title": "Modo Offline Activado",
            "content": "Las noticias estarán disponibles cuando recuperes la conexión.",
            "impact": "info",
            "pairs_affected": ["OFFLINE"],
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }]),
        _ => return None,
    };
    Some(payload)
}

/// The payload for API paths without a dedicated fallback.
pub fn generic_payload() -> Value {
    json!({
        "error": "No offline data available",
        "offline": true,
    })
}

/// Synthesizes the `200` JSON response served for an API path when both the
/// network and the API namespace failed.
pub fn offline_api_response(path: &str) -> Response {
    let payload = offline_payload(path).unwrap_or_else(generic_payload);
    Response::json(&payload).header(SERVED_BY_HEADER, SERVED_BY_WORKER)
}

/// Synthesizes the self-contained offline page served for failed navigations.
pub fn offline_page() -> Response {
    Response::new(StatusCode::OK)
        .header("Content-Type", "text/html")
        .header(SERVED_BY_HEADER, SERVED_BY_WORKER)
        .body(OFFLINE_PAGE_HTML)
}

const OFFLINE_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Forex Academy - Modo Offline</title>
  <style>
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
      background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
      color: white;
      margin: 0;
      padding: 2rem;
      min-height: 100vh;
      display: flex;
      flex-direction: column;
      justify-content: center;
      align-items: center;
      text-align: center;
    }
    .offline-container {
      max-width: 400px;
      padding: 2rem;
      background: rgba(255, 255, 255, 0.1);
      border-radius: 20px;
      backdrop-filter: blur(10px);
    }
    h1 { margin-bottom: 1rem; }
    .offline-icon { font-size: 4rem; margin-bottom: 1rem; }
    .retry-btn {
      background: rgba(255, 255, 255, 0.2);
      color: white;
      border: 2px solid rgba(255, 255, 255, 0.3);
      padding: 1rem 2rem;
      border-radius: 10px;
      cursor: pointer;
      font-weight: 600;
      margin-top: 1rem;
    }
    .retry-btn:hover { background: rgba(255, 255, 255, 0.3); }
  </style>
</head>
<body>
  <div class="offline-container">
    <div class="offline-icon">📱</div>
    <h1>Forex Academy</h1>
    <h2>Modo Offline</h2>
    <p>No hay conexión a internet. Algunos contenidos están disponibles offline.</p>
    <button class="retry-btn" onclick="window.location.reload()">Intentar de nuevo</button>
  </div>
</body>
</html>
"#;
