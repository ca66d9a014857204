//! # Endpoint — Write Endpoint and Read API
//!
//! Runs an Axum HTTP server in front of the [`SheetStore`]. The write path is
//! the single action-dispatching `POST /exec`; the read path serves the
//! dashboard snapshot, summary tiles and CSV export.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /exec`, `POST /` | envelope dispatch |
//! | `GET /exec` | liveness message |
//! | `GET /api/snapshot` | donor records + inventory |
//! | `GET /api/summary` | dashboard totals |
//! | `GET /api/export?days=N\|all` | CSV attachment |
//! | `GET /healthz`, `/readyz`, `/metrics` | probes and Prometheus |

mod routes_health;
mod routes_read;
mod routes_write;

pub use routes_write::execute;

use crate::config::ServerConfig;
use crate::prom_metrics;
use crate::sheet::{SheetError, SheetStore};
use anyhow::Result;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Instrument};

pub struct AppState {
    pub store: SheetStore,
    pub config: ServerConfig,
    pub prom_metrics: prom_metrics::Metrics,
}

impl AppState {
    pub fn new(store: SheetStore, config: ServerConfig) -> Arc<Self> {
        let state = AppState {
            store,
            config,
            prom_metrics: prom_metrics::Metrics::new(),
        };
        state.refresh_gauges();
        Arc::new(state)
    }

    /// Copy current sheet sizes into the Prometheus gauges.
    pub(super) fn refresh_gauges(&self) {
        match (self.store.donor_records(), self.store.inventory()) {
            (Ok(records), Ok(inventory)) => {
                self.prom_metrics.observe_sheets(records.len(), &inventory)
            }
            (Err(e), _) | (_, Err(e)) => warn!(error = %e, "cannot sample sheet gauges"),
        }
    }
}

/// HTTP status for a store failure.
pub(super) fn sheet_error_status(e: &SheetError) -> StatusCode {
    match e {
        SheetError::SheetNotFound(_) | SheetError::RowOutOfRange(_) => StatusCode::NOT_FOUND,
        SheetError::RecordMismatch { .. } => StatusCode::CONFLICT,
        SheetError::Io(_) | SheetError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Records request latency, propagates or assigns `x-request-id`, and runs the
/// request inside a `request` span.
async fn metrics_middleware(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> axum::response::Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = req.method().to_string();
    let raw_path = req.uri().path().to_string();
    let start = std::time::Instant::now();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %raw_path,
    );
    let mut response = next.run(req).instrument(span).await;

    state
        .prom_metrics
        .http_request_duration
        .get_or_create(&prom_metrics::HttpLabel {
            method,
            path: normalize_path(&raw_path).to_string(),
        })
        .observe(start.elapsed().as_secs_f64());

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

const KNOWN_PATHS: [&str; 8] = [
    "/",
    "/exec",
    "/api/snapshot",
    "/api/summary",
    "/api/export",
    "/healthz",
    "/readyz",
    "/metrics",
];

/// Collapse paths outside the route table into one label value.
fn normalize_path(path: &str) -> &str {
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    KNOWN_PATHS
        .iter()
        .find(|p| **p == trimmed)
        .copied()
        .unwrap_or("/unmatched")
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.body_limit_bytes;
    let timeout = Duration::from_secs(state.config.request_timeout_secs.max(1));

    Router::new()
        .route(
            "/exec",
            get(routes_write::handler_exec_probe).post(routes_write::handler_exec),
        )
        .route("/", axum::routing::post(routes_write::handler_exec))
        .route("/api/snapshot", get(routes_read::handler_api_snapshot))
        .route("/api/summary", get(routes_read::handler_api_summary))
        .route("/api/export", get(routes_read::handler_api_export))
        .route("/healthz", get(routes_health::handler_healthz))
        .route("/readyz", get(routes_health::handler_readyz))
        .route("/metrics", get(routes_health::handler_metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CatchPanicLayer::new())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .with_state(state)
}

/// Open the workbook named in `config` and serve until SIGINT/SIGTERM.
pub async fn run(config: ServerConfig) -> Result<()> {
    let store = SheetStore::open(&config.workbook, config.layout())?;
    let addr = format!("{}:{}", config.bind, config.port);
    let state = AppState::new(store, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("cannot bind {}: {}", addr, e))?;
    info!(addr = %addr, "endpoint running");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("endpoint shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot install SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT, shutting down");
    }
}
