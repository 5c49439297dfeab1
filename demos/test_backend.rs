//! demos/test_backend.rs
//! A backend to put behind the balancer.
//! Run: cargo run --example test_backend -- <port> [name]
//!
//! `GET /health` answers 200 while healthy and 503 otherwise;
//! `POST /health/toggle` flips the flag. Every other request sleeps
//! `DELAY_MS` (± `JITTER_MS`) and echoes what it received as JSON.

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use rand::Rng;
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::sleep;

#[derive(Clone)]
struct DemoBackend {
    name: String,
    served: Arc<AtomicU64>,
    healthy: Arc<AtomicBool>,
    delay_ms: u64,
    jitter_ms: u64,
}

fn status_only(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = status;
    resp
}

async fn handle(req: Request<Body>, state: DemoBackend) -> Result<Response<Body>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") => {
            return Ok(if state.healthy.load(Ordering::SeqCst) {
                status_only(StatusCode::OK, "OK")
            } else {
                status_only(StatusCode::SERVICE_UNAVAILABLE, "Unhealthy")
            });
        }
        (&Method::POST, "/health/toggle") => {
            let was = state.healthy.fetch_xor(true, Ordering::SeqCst);
            println!("[{}] health -> {}", state.name, !was);
            return Ok(status_only(StatusCode::OK, "toggled"));
        }
        _ => {}
    }

    let delay = state.delay_ms + rand::thread_rng().gen_range(0..=state.jitter_ms);
    if delay > 0 {
        sleep(Duration::from_millis(delay)).await;
    }

    let n = state.served.fetch_add(1, Ordering::SeqCst) + 1;
    let body = serde_json::json!({
        "backend": state.name,
        "served": n,
        "method": req.method().as_str(),
        "path": req.uri().path(),
        "query": req.uri().query(),
        "host": req.headers().get("host").and_then(|h| h.to_str().ok()),
        "delay_ms": delay,
    });

    let resp = Response::builder()
        .header("content-type", "application/json")
        .header("x-backend-name", state.name.as_str())
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| status_only(StatusCode::INTERNAL_SERVER_ERROR, "bad response"));
    Ok(resp)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port: u16 = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "8001".into())
        .parse()?;
    let name = std::env::args()
        .nth(2)
        .unwrap_or_else(|| format!("backend-{port}"));
    let env_ms = |key: &str| {
        std::env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };

    let state = DemoBackend {
        name: name.clone(),
        served: Arc::new(AtomicU64::new(0)),
        healthy: Arc::new(AtomicBool::new(true)),
        delay_ms: env_ms("DELAY_MS"),
        jitter_ms: env_ms("JITTER_MS"),
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, state.clone()))) }
    });

    println!("Demo backend '{}' on http://{}", name, addr);
    Server::bind(&addr).serve(make_svc).await?;
    Ok(())
}
