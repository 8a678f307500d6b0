mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use swcache::Server;
use swcache::config::Config;
use swcache::middleware::{LoggerMiddleware, Pipeline};
use swcache::router::control;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use common::{FakeNetwork, Harness};

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

async fn serve(harness: &Harness) -> SocketAddr {
    let router = control::routes(harness.worker.clone(), Arc::clone(&harness.manager));
    let pipeline = Arc::new(Pipeline::new(router).with(LoggerMiddleware));
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.run(move |request| {
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.handle(request).await }
    }));
    addr
}

async fn send(addr: SocketAddr, method: &str, target: &str, extra: &str, body: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let raw = format!(
        "{method} {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n{extra}Content-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    let (head, body) = response.split_once("\r\n\r\n").unwrap();
    let mut lines = head.lines();
    let status = lines.next().unwrap().split(' ').nth(1).unwrap().parse().unwrap();
    let headers = lines
        .filter_map(|line| line.split_once(": "))
        .map(|(n, v)| (n.to_owned(), v.to_owned()))
        .collect();
    Reply {
        status,
        headers,
        body: body.to_owned(),
    }
}

#[tokio::test]
async fn api_requests_go_through_the_worker() {
    let harness = Harness::start(Config::default(), FakeNetwork::serving_defaults()).await;
    let addr = serve(&harness).await;

    let online = send(addr, "GET", "/api/health", "", "").await;
    assert_eq!(online.status, 200);
    assert_eq!(online.json()["fresh"], 1);
    assert_eq!(online.header("x-served-by"), None);

    harness.network.set_offline(true);
    let cached = send(addr, "GET", "/api/health", "", "").await;
    assert_eq!(cached.body, online.body);

    let news = send(addr, "GET", "/api/market/news", "", "").await;
    assert_eq!(news.status, 200);
    assert_eq!(news.json()["fresh"], 1);

    let synthesized = send(addr, "GET", "/api/unknown", "", "").await;
    assert_eq!(synthesized.header("x-served-by"), Some("ServiceWorker"));
    assert_eq!(synthesized.json()["offline"], true);
}

#[tokio::test]
async fn offline_failures_map_to_page_or_bad_gateway() {
    let harness = Harness::start(Config::default(), FakeNetwork::serving_defaults()).await;
    let addr = serve(&harness).await;
    harness.network.set_offline(true);

    let page = send(addr, "GET", "/lessons", "Accept: text/html\r\n", "").await;
    assert_eq!(page.status, 200);
    assert_eq!(page.header("content-type"), Some("text/html"));
    assert!(page.body.contains("Modo Offline"));

    let image = send(addr, "GET", "/static/img/chart.png", "Accept: image/png\r\n", "").await;
    assert_eq!(image.status, 502);
    assert!(image.json()["error"].is_string());
}

#[tokio::test]
async fn control_routes_fire_events() {
    let harness = Harness::start(Config::default(), FakeNetwork::serving_defaults()).await;
    let addr = serve(&harness).await;

    harness.network.reset_calls();
    let sync = send(addr, "POST", "/__sw/sync", "", "").await;
    assert_eq!(sync.status, 202);
    assert_eq!(sync.json()["outcome"], "handled");
    assert_eq!(sync.json()["tag"], "forex-data-sync");
    assert_eq!(harness.network.calls().len(), Config::default().api_manifest.len());

    let ignored = send(addr, "POST", "/__sw/sync?tag=other", "", "").await;
    assert_eq!(ignored.json()["outcome"], "ignored");

    let push = send(addr, "POST", "/__sw/push", "", r#"{"title":"GBP/JPY","priority":"high"}"#).await;
    assert_eq!(push.status, 202);

    let bad_push = send(addr, "POST", "/__sw/push", "", "nope").await;
    assert_eq!(bad_push.status, 422);

    let listed = send(addr, "GET", "/__sw/notifications", "", "").await;
    let listed = listed.json();
    assert_eq!(listed[0]["title"], "GBP/JPY");
    assert_eq!(listed[0]["require_interaction"], true);
    let id = listed[0]["id"].as_u64().unwrap();

    let click = send(
        addr,
        "POST",
        &format!("/__sw/notificationclick?id={id}&action=open"),
        "",
        "",
    )
    .await;
    assert_eq!(click.status, 202);
    assert_eq!(harness.manager.clients().list().await.len(), 1);

    let bad_click = send(addr, "POST", "/__sw/notificationclick?id=abc", "", "").await;
    assert_eq!(bad_click.status, 400);

    let caches = send(addr, "GET", "/__sw/caches", "", "").await.json();
    assert_eq!(caches["forex-academy-static-v1"], 5);
}
