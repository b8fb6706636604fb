//! HTTP server implementation using axum.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::{SplitStream, StreamExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use claimrace_engine::{DynEventSink, RaceEvent};
use claimrace_telemetry::encode_metrics;

use crate::config::ObserverConfig;
use crate::error::{ObserverError, ObserverResult};
use crate::service::ClaimService;
use crate::types::{ErrorBody, LoginRequest, LoginResponse};
use crate::ws_sink::WsEventSink;

// ============================================================================
// ConnectionLimiter
// ============================================================================

/// Bounds the number of concurrent observer sockets.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Reserve a slot that is released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

/// Owned slot in a [`ConnectionLimiter`].
pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

// ============================================================================
// Router
// ============================================================================

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct ObserverState {
    service: Arc<ClaimService>,
    connection_limiter: Arc<ConnectionLimiter>,
    config: ObserverConfig,
}

impl ObserverState {
    pub fn new(service: Arc<ClaimService>, config: ObserverConfig) -> Self {
        Self {
            service,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config,
        }
    }
}

/// Create the axum router.
pub fn create_router(state: ObserverState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/ws/withdraw", get(ws_handler))
        .route("/api/login", post(login))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &ObserverConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(12 * 60 * 60));

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics() -> Response {
    match encode_metrics() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn login(
    State(state): State<ObserverState>,
    body: Result<Json<LoginRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<LoginResponse>, Response> {
    let Json(request) = body.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                message: format!("invalid request body: {e}"),
            }),
        )
            .into_response()
    })?;

    state
        .service
        .account_overview(request)
        .await
        .map(Json)
        .map_err(|e| {
            debug!(error = %e, "Account overview failed");
            e.into_response()
        })
}

// ============================================================================
// Observer socket
// ============================================================================

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<ObserverState>, ws: WebSocketUpgrade) -> Response {
    let Some(guard) = state.connection_limiter.try_acquire() else {
        warn!(
            current = state.connection_limiter.current_count(),
            max = state.config.max_connections,
            "Observer connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    let connection_id = Uuid::new_v4();
    info!(
        %connection_id,
        connections = state.connection_limiter.current_count(),
        "New observer connection"
    );

    ws.on_upgrade(move |socket| {
        let span = tracing::info_span!("observer", %connection_id);
        async move {
            handle_observer(socket, state).await;
            drop(guard);
        }
        .instrument(span)
    })
}

/// Read one claim request, then stream the race to the socket.
async fn handle_observer(socket: WebSocket, state: ObserverState) {
    let (sender, mut receiver) = socket.split();
    let ws_sink = Arc::new(WsEventSink::new(sender));
    let sink: DynEventSink = ws_sink.clone();

    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let request = match tokio::time::timeout(timeout, next_text(&mut receiver)).await {
        Ok(Some(text)) => text,
        Ok(None) => {
            debug!("Observer closed before sending a request");
            return;
        }
        Err(_) => {
            sink.emit(RaceEvent::error("Invalid request: no request received"))
                .await;
            ws_sink.close().await;
            return;
        }
    };

    // Keep reading so control frames are answered; a disconnect does not
    // stop the race.
    let incoming = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
        debug!("Observer stopped reading");
    });

    let report = state.service.handle(&request, sink).await;
    if let Some(report) = report {
        info!(
            winner = ?report.winner(),
            attempts = report.total_attempts(),
            "Observer session finished"
        );
    }

    ws_sink.close().await;
    incoming.abort();
}

/// Next text frame, skipping control frames.
async fn next_text(receiver: &mut SplitStream<WebSocket>) -> Option<String> {
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
            Ok(Message::Binary(bytes)) => {
                return Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "Observer receive error");
                return None;
            }
        }
    }
    None
}

// ============================================================================
// Server
// ============================================================================

/// Serve on an already-bound listener until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: ObserverState,
    shutdown: CancellationToken,
) -> ObserverResult<()> {
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(ObserverError::Io)
}

/// Bind `0.0.0.0:port` and serve until `shutdown` is cancelled.
pub async fn run_server(
    service: Arc<ClaimService>,
    config: ObserverConfig,
    shutdown: CancellationToken,
) -> ObserverResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(port = config.port, "Starting observer server");

    serve(listener, ObserverState::new(service, config), shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use claimrace_core::Amount;
    use claimrace_engine::{RaceConfig, RaceOrchestrator};
    use claimrace_ledger::{SandboxKeyResolver, SandboxLedger};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    const MAIN: &str =
        "abandon ability able about above absent absorb abstract absurd abuse access accident";

    fn state(ledger: Arc<SandboxLedger>) -> ObserverState {
        let orchestrator =
            RaceOrchestrator::new(RaceConfig::default(), ledger.clone(), ledger.clone()).unwrap();
        let service = ClaimService::new(
            ledger,
            Arc::new(SandboxKeyResolver),
            Arc::new(orchestrator),
        );
        ObserverState::new(Arc::new(service), ObserverConfig::default())
    }

    #[test]
    fn test_connection_limiter() {
        let limiter = Arc::new(ConnectionLimiter::new(2));
        let a = limiter.try_acquire();
        let b = limiter.try_acquire();
        assert!(a.is_some() && b.is_some());
        assert!(limiter.try_acquire().is_none());

        drop(a);
        assert_eq!(limiter.current_count(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(state(Arc::new(SandboxLedger::default())));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_returns_overview() {
        let ledger = Arc::new(SandboxLedger::default());
        let address = SandboxKeyResolver::address_for(MAIN);
        ledger.fund(&address, Amount::new(dec!(10)));

        let app = create_router(state(ledger));
        let body = serde_json::json!({ "seed_phrase": MAIN }).to_string();
        let response = app
            .oneshot(
                Request::post("/api/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let overview: LoginResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(overview.wallet_address, address.to_string());
        assert!(overview.transactions.is_empty());
        assert!(overview.locked_balances.is_empty());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_phrase() {
        let app = create_router(state(Arc::new(SandboxLedger::default())));
        let response = app
            .oneshot(
                Request::post("/api/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"seed_phrase":"short"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.message, "Invalid main seed phrase");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        claimrace_telemetry::Metrics::session_rejected("invalid_request");
        let app = create_router(state(Arc::new(SandboxLedger::default())));
        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("claimrace_session_errors_total"));
    }

    #[tokio::test]
    async fn test_cors_preflight_allowed() {
        let app = create_router(state(Arc::new(SandboxLedger::default())));
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/login")
                    .header(header::ORIGIN, "https://example.org")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
