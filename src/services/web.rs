//! Axum-based HTTP server for the Alpaca rotator API.
//!
//! Provides:
//! - GET/PUT `/api/v1/rotator/{devnum}/{member}` - Device members
//! - GET `/management/apiversions` - Supported API versions
//! - GET `/management/v1/description` - Server description
//! - GET `/management/v1/configureddevices` - Served devices
//! - GET `/setup`, `/setup/v1/rotator/{devnum}/setup` - Setup pages

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::NetworkConfig;

use super::envelope::{AlpacaReply, Envelope};
use super::management;
use super::request::{AlpacaRequest, RequestMethod};
use super::responders::{lookup, RotatorMetadata, RouteError};
use super::shared::AlpacaContext;
use super::validate::PreProcess;

type Peer = Option<ConnectInfo<SocketAddr>>;

// ============================================================================
// Device Routes
// ============================================================================

/// GET /api/v1/rotator/{devnum}/{member} - Property reads
async fn device_get(
    State(ctx): State<Arc<AlpacaContext>>,
    Path((devnum, member)): Path<(String, String)>,
    peer: Peer,
    RawQuery(query): RawQuery,
) -> AlpacaReply {
    let params = query.unwrap_or_default();
    let req = AlpacaRequest::new(RequestMethod::Get, &devnum, &member, params.as_bytes())
        .with_client(peer.map(|ConnectInfo(addr)| addr));
    dispatch(&ctx, req)
}

/// PUT /api/v1/rotator/{devnum}/{member} - Property writes and methods
///
/// Parameters arrive as an urlencoded form body.
async fn device_put(
    State(ctx): State<Arc<AlpacaContext>>,
    Path((devnum, member)): Path<(String, String)>,
    peer: Peer,
    body: Bytes,
) -> AlpacaReply {
    let req = AlpacaRequest::new(RequestMethod::Put, &devnum, &member, &body)
        .with_client(peer.map(|ConnectInfo(addr)| addr));
    dispatch(&ctx, req)
}

/// Route a device request to its validated responder.
pub fn dispatch(ctx: &AlpacaContext, req: AlpacaRequest) -> AlpacaReply {
    match lookup(&req.member, req.method) {
        Ok(responder) => {
            let handler = PreProcess::new(RotatorMetadata::MAX_DEVICE_NUMBER).wrap(responder);
            handler(ctx, req)
        }
        Err(RouteError::UnknownMember) => {
            warn!("{} {}: unknown member", req.method, req.path());
            AlpacaReply::NotFound(format!("Rotator has no member {}", req.member))
        }
        Err(RouteError::WrongMethod) => {
            warn!("{} {}: wrong method", req.method, req.path());
            AlpacaReply::MethodNotAllowed(format!(
                "Rotator member {} does not accept {}",
                req.member, req.method
            ))
        }
    }
}

// ============================================================================
// Management and Setup
// ============================================================================

fn management_request(peer: Peer, query: Option<String>) -> AlpacaRequest {
    let params = query.unwrap_or_default();
    let req = AlpacaRequest::new(RequestMethod::Get, "", "", params.as_bytes())
        .with_client(peer.map(|ConnectInfo(addr)| addr));
    info!("{} -> GET management", super::envelope::peer(&req));
    req
}

/// GET /management/apiversions
async fn api_versions(
    State(ctx): State<Arc<AlpacaContext>>,
    peer: Peer,
    RawQuery(query): RawQuery,
) -> Json<Envelope> {
    let req = management_request(peer, query);
    Json(management::api_versions(&ctx, &req))
}

/// GET /management/v1/description
async fn server_description(
    State(ctx): State<Arc<AlpacaContext>>,
    peer: Peer,
    RawQuery(query): RawQuery,
) -> Json<Envelope> {
    let req = management_request(peer, query);
    Json(management::description(&ctx, &req))
}

/// GET /management/v1/configureddevices
async fn configured_devices(
    State(ctx): State<Arc<AlpacaContext>>,
    peer: Peer,
    RawQuery(query): RawQuery,
) -> Json<Envelope> {
    let req = management_request(peer, query);
    Json(management::configured_devices(&ctx, &req))
}

async fn server_setup() -> Html<&'static str> {
    Html(management::SERVER_SETUP_HTML)
}

async fn device_setup(Path(_devnum): Path<String>) -> Html<&'static str> {
    Html(management::DEVICE_SETUP_HTML)
}

/// Fallback handler for 404
async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

// ============================================================================
// Server Builder
// ============================================================================

/// Build the Axum router with all routes
pub fn build_router(ctx: Arc<AlpacaContext>, config: &NetworkConfig) -> Router {
    let mut router = Router::new()
        // Device API
        .route(
            "/api/v1/rotator/:devnum/:member",
            get(device_get).put(device_put),
        )
        // Management API
        .route("/management/apiversions", get(api_versions))
        .route("/management/v1/description", get(server_description))
        .route("/management/v1/configureddevices", get(configured_devices))
        // Setup pages
        .route("/setup", get(server_setup))
        .route("/setup/v1/rotator/:devnum/setup", get(device_setup))
        // Fallback
        .fallback(not_found)
        .with_state(ctx)
        .layer(TraceLayer::new_for_http());

    // Add CORS if requested
    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Serve the API until `shutdown` resolves.
pub async fn run_server<F>(ctx: Arc<AlpacaContext>, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = ctx.config.network.http_addr();
    let router = build_router(Arc::clone(&ctx), &ctx.config.network);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Alpaca server listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
