//! Ops HTTP surface: a synchronous request/response sibling of the
//! WebSocket channel, served from a plain thread.
//!
//! - GET  /status  → run-state snapshot
//! - POST /config  → hyperparameter merge (same semantics as setParams)
//! - GET  /metrics → Prometheus text format
//! - GET  /health  → liveness probe

use std::io::{Cursor, Read};

use serde_json::Value;
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::sync::{mpsc, oneshot};

use crate::metrics::EngineMetrics;
use crate::runner::SessionRequest;

type OpsResponse = Response<Cursor<Vec<u8>>>;

/// Spawn the ops server on a dedicated thread. Binding failures are logged
/// and leave the engine running without an ops surface.
pub fn start_ops_server(
    addr: &str,
    session_tx: mpsc::Sender<SessionRequest>,
    metrics: EngineMetrics,
) {
    let addr = addr.to_string();
    std::thread::spawn(move || {
        let Ok(server) = Server::http(addr.as_str()) else {
            eprintln!("ops server failed to bind {addr}");
            return;
        };
        println!("doseloop ops endpoint listening on http://{addr}");

        for mut request in server.incoming_requests() {
            let response = route(&mut request, &session_tx, &metrics);
            let _ = request.respond(response);
        }
    });
}

fn route(
    request: &mut Request,
    session_tx: &mpsc::Sender<SessionRequest>,
    metrics: &EngineMetrics,
) -> OpsResponse {
    let method = request.method().clone();
    let url = request.url().to_string();

    match (method, url.as_str()) {
        (Method::Get, "/status") => status_response(session_tx),
        (Method::Post, "/config") => config_response(request, session_tx),
        (Method::Get, "/metrics") => Response::from_string(metrics.gather()).with_header(
            Header::from_bytes(&b"Content-Type"[..], &b"text/plain; version=0.0.4"[..])
                .expect("static header"),
        ),
        (Method::Get, "/health") => Response::from_string("ok"),
        _ => Response::from_string("not found").with_status_code(404),
    }
}

fn status_response(session_tx: &mpsc::Sender<SessionRequest>) -> OpsResponse {
    let (reply, reply_rx) = oneshot::channel();
    if session_tx
        .blocking_send(SessionRequest::Status { reply })
        .is_err()
    {
        return Response::from_string("session unavailable").with_status_code(503);
    }

    match reply_rx.blocking_recv() {
        Ok(status) => match serde_json::to_string(&status) {
            Ok(body) => json_response(body),
            Err(_) => Response::from_string("serialization failed").with_status_code(500),
        },
        Err(_) => Response::from_string("session unavailable").with_status_code(503),
    }
}

fn config_response(
    request: &mut Request,
    session_tx: &mpsc::Sender<SessionRequest>,
) -> OpsResponse {
    let mut body = String::new();
    if request.as_reader().read_to_string(&mut body).is_err() {
        return Response::from_string("bad request").with_status_code(400);
    }

    // An unparseable body applies no fields and still acks, matching the
    // tolerant merge semantics of setParams.
    let params: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    let (reply, reply_rx) = oneshot::channel();
    if session_tx
        .blocking_send(SessionRequest::SetParams {
            params,
            reply: Some(reply),
        })
        .is_err()
    {
        return Response::from_string("session unavailable").with_status_code(503);
    }

    match reply_rx.blocking_recv() {
        Ok(_) => json_response(r#"{"ok":true}"#.to_string()),
        Err(_) => Response::from_string("session unavailable").with_status_code(503),
    }
}

fn json_response(body: String) -> OpsResponse {
    Response::from_string(body).with_header(
        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
            .expect("static header"),
    )
}
