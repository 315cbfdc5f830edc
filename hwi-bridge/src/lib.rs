mod adapters;
mod app;
mod domain;
mod ports;

pub use adapters::approval::{ConsoleApprover, StatusBoard};
pub use adapters::hwi::{
    Chain, HwiCliRegistry, HwiCommandError, HwiCommandRunner, HwiOutput, SystemHwiCommandRunner,
};
pub use app::auth::{
    spawn_interactive_context, AuthorizationGate, DecisionInbox, InteractiveContext,
    PendingDecision, TrustStore,
};
pub use app::dispatch::{CommandDispatcher, DispatchError};
pub use domain::bridge::{
    CommandRequest, DeviceHandle, Invocation, Operation, OperationScope, Origin,
};
pub use ports::approval::{Approver, ApproverClosed, StatusSurface};
pub use ports::registry::CommandRegistry;

use anyhow::{bail, Context};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

pub const BRIDGE_PATH: &str = "/hwi-bridge";

#[derive(Debug, Clone)]
pub struct Settings {
    pub listen: SocketAddr,
    /// `None` waits for the operator indefinitely.
    pub approval_timeout: Option<Duration>,
    pub hwi_program: String,
    pub hwi_timeout: Duration,
    pub chain: Option<Chain>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 5000)),
            approval_timeout: Some(Duration::from_secs(120)),
            hwi_program: "hwi".to_string(),
            hwi_timeout: Duration::from_secs(300),
            chain: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    gate: Arc<AuthorizationGate>,
    dispatcher: Arc<CommandDispatcher>,
    status: Arc<StatusBoard>,
}

impl AppState {
    pub fn new(
        gate: Arc<AuthorizationGate>,
        registry: Arc<dyn CommandRegistry>,
        status: Arc<StatusBoard>,
    ) -> Self {
        let dispatcher = Arc::new(CommandDispatcher::new(registry, status.clone()));
        Self {
            gate,
            dispatcher,
            status,
        }
    }

    fn gate(&self) -> Arc<AuthorizationGate> {
        self.gate.clone()
    }

    fn dispatcher(&self) -> Arc<CommandDispatcher> {
        self.dispatcher.clone()
    }
}

/// HTTP surface. CORS admits every origin; access control happens in the
/// handler through the [`AuthorizationGate`].
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route(BRIDGE_PATH, post(hwi_bridge))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    if !settings.listen.ip().is_loopback() {
        bail!(
            "refusing to listen on non-loopback address {}",
            settings.listen
        );
    }

    match which::which(&settings.hwi_program) {
        Ok(path) => info!(hwi = %path.display(), "using hwi executable"),
        Err(err) => warn!(
            hwi = %settings.hwi_program,
            %err,
            "hwi executable not found; device commands will fail until it is installed"
        ),
    }
    let registry = HwiCliRegistry::new(settings.hwi_program.clone(), settings.hwi_timeout)
        .with_chain(settings.chain);

    let (gate, inbox) = AuthorizationGate::new(settings.approval_timeout);
    let interactive = spawn_interactive_context(ConsoleApprover::stdio(), inbox)
        .context("starting approver thread")?;

    let state = AppState::new(
        Arc::new(gate),
        Arc::new(registry),
        Arc::new(StatusBoard::new()),
    );

    let listener = TcpListener::bind(settings.listen)
        .await
        .with_context(|| format!("binding {}", settings.listen))?;
    info!(
        listen = %settings.listen,
        methods = HwiCliRegistry::methods().count(),
        "hwi-bridge started"
    );

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal(interactive))
        .await?;

    Ok(())
}

async fn shutdown_signal(interactive: InteractiveContext) {
    tokio::select! {
        _ = ctrl_c() => info!("shutdown signal received"),
        _ = interactive.closed() => info!("approver closed; shutting down"),
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "active_method": state.status.current(),
    }))
}

#[derive(Debug, Deserialize)]
struct BridgeRequest {
    method: String,
    args: Vec<Value>,
}

// The body is parsed by hand: callers may post `text/plain` to skip the
// CORS preflight.
fn parse_request(body: &[u8]) -> Result<CommandRequest, BridgeError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| BridgeError::InvalidRequest)?;
    if !value.is_object() {
        return Err(BridgeError::InvalidRequest);
    }
    let request: BridgeRequest =
        serde_json::from_value(value).map_err(|_| BridgeError::InvalidRequest)?;
    Ok(CommandRequest::new(request.method, request.args))
}

async fn hwi_bridge(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, BridgeError> {
    let origin = headers
        .get(ORIGIN)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(Origin::new)
        .ok_or(BridgeError::MissingOrigin)?;

    if !state.gate().authorize(&origin).await {
        return Err(BridgeError::AccessDenied);
    }

    let request = parse_request(&body)?;
    debug!(%origin, method = %request.method, args = request.args.len(), "dispatching");
    let result = state.dispatcher().invoke(request).await?;
    Ok(Json(json!({
        "success": true,
        "result": result,
    })))
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
enum BridgeError {
    #[error("Missing Origin header")]
    MissingOrigin,
    #[error("Invalid request")]
    InvalidRequest,
    #[error("Method not found")]
    MethodNotFound,
    #[error("User denied access")]
    AccessDenied,
    #[error("Device not found or is locked")]
    DeviceUnavailable,
    #[error("{0}")]
    InvocationFailure(String),
    #[error("Internal error")]
    Internal,
}

impl BridgeError {
    fn status(&self) -> StatusCode {
        match self {
            BridgeError::MissingOrigin | BridgeError::InvalidRequest => StatusCode::BAD_REQUEST,
            BridgeError::MethodNotFound | BridgeError::DeviceUnavailable => StatusCode::NOT_FOUND,
            BridgeError::AccessDenied => StatusCode::UNAUTHORIZED,
            // Command failures are a normal answer for the calling page.
            BridgeError::InvocationFailure(_) => StatusCode::OK,
            BridgeError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DispatchError> for BridgeError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::MethodNotFound(_) => BridgeError::MethodNotFound,
            DispatchError::DeviceUnavailable { .. } => BridgeError::DeviceUnavailable,
            DispatchError::Invocation(message) => BridgeError::InvocationFailure(message),
            DispatchError::Internal(method) => {
                error!(%method, "internal failure while dispatching");
                BridgeError::Internal
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = Json(ErrorBody {
            success: false,
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
