//! Inbound HTTP surface
//!
//! Two endpoints, served with hyper:
//!
//! | Endpoint     | Purpose                                               |
//! |--------------|-------------------------------------------------------|
//! | `POST /bootstrap` | run the bootstrap sequence                       |
//! | `POST /notify`    | provider push: handshake echo or job emission    |
//!
//! The notification sink is deliberately thin: authenticate each entry's
//! shared secret, enqueue a job for the valid ones, and lean on the
//! provider's retry protocol when the queue is full. The notification is
//! a hint to sync, never the payload to process.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use drivetrail_core::ports::queue::{ISyncQueue, QueueError, SyncJob};
use drivetrail_sync::SubscriptionManager;

use crate::bootstrap::{BootstrapError, Bootstrapper};

/// Shared handler state
pub struct AppState {
    pub bootstrapper: Bootstrapper,
    pub manager: Arc<SubscriptionManager>,
    pub queue: Arc<dyn ISyncQueue>,
}

/// One entry of the provider's notification envelope
///
/// Decoded narrowly; everything beyond authentication and job emission is
/// ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphNotification {
    subscription_id: Option<String>,
    client_state: Option<String>,
    resource: Option<String>,
    change_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotificationEnvelope {
    #[serde(default)]
    value: Vec<GraphNotification>,
}

/// HTTP server for the bootstrap and notification endpoints
pub struct ApiServer {
    state: Arc<AppState>,
    addr: SocketAddr,
}

impl ApiServer {
    /// Creates a server bound to `endpoint`, e.g. `"127.0.0.1:8090"`
    pub fn new(state: Arc<AppState>, endpoint: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = endpoint.parse()?;
        Ok(Self { state, addr })
    }

    /// Serves until the cancellation token fires
    pub async fn run(&self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "HTTP server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, _) = result?;
                    let io = TokioIo::new(stream);
                    let state = Arc::clone(&self.state);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(req, &state).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, "HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("HTTP server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Routes a single request
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    match (req.method(), req.uri().path()) {
        (&Method::POST, "/bootstrap") => Ok(handle_bootstrap(state).await),
        (&Method::POST, "/notify") => handle_notify(req, state).await,
        _ => Ok(plain_response(StatusCode::NOT_FOUND, "Not Found")),
    }
}

async fn handle_bootstrap(state: &AppState) -> Response<Full<Bytes>> {
    match state.bootstrapper.run().await {
        Ok(report) => json_response(
            StatusCode::OK,
            serde_json::to_value(&report).unwrap_or_default(),
        ),
        Err(BootstrapError::Unauthorized(reason)) => json_response(
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": format!("credential validation failed: {reason}") }),
        ),
        Err(err) => {
            error!(error = %err, "Bootstrap failed");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": err.to_string() }),
            )
        }
    }
}

async fn handle_notify(
    req: Request<hyper::body::Incoming>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    // Validation handshake: echo the challenge, nothing else.
    if let Some(token) = query_param(req.uri().query(), "validationToken") {
        debug!("Answering subscription validation handshake");
        return Ok(plain_response(StatusCode::OK, &token));
    }

    let body = req.into_body().collect().await?.to_bytes();

    let envelope: NotificationEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, "Malformed notification body");
            return Ok(json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "malformed notification body" }),
            ));
        }
    };

    let mut accepted = 0;
    for entry in envelope.value {
        let (Some(subscription_id), Some(client_state)) =
            (entry.subscription_id, entry.client_state)
        else {
            warn!("Notification entry without subscription id or client state, dropped");
            continue;
        };

        match state
            .manager
            .authenticate(&subscription_id, &client_state)
            .await
        {
            Ok(true) => {
                let job = SyncJob {
                    subscription_id,
                    resource: entry.resource.unwrap_or_default(),
                    change_type: entry.change_type.unwrap_or_else(|| "updated".to_string()),
                    ts: chrono::Utc::now(),
                };
                match state.queue.try_enqueue(job) {
                    Ok(()) => accepted += 1,
                    Err(QueueError::Full | QueueError::Closed) => {
                        // Backpressure: the provider retries, the cursor
                        // keeps whatever this notification hinted at.
                        warn!("Sync queue full, asking provider to retry");
                        return Ok(json_response(
                            StatusCode::SERVICE_UNAVAILABLE,
                            serde_json::json!({ "error": "sync queue full, retry later" }),
                        ));
                    }
                }
            }
            // Invalid shared secret: dropped silently, no job emitted.
            Ok(false) => {}
            Err(err) => {
                warn!(error = %err, "Could not authenticate notification entry, dropped");
            }
        }
    }

    Ok(json_response(
        StatusCode::OK,
        serde_json::json!({ "accepted": accepted }),
    ))
}

/// Extracts one query parameter from a raw query string
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn plain_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
