//! HTTP endpoints for recording downloads and reading stats and release notes.

use anyhow::Result;
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info};

use crate::{
    aggregate::{summarize, CountrySummary},
    catalog::{latest, DerivedUpdateRecord, UpdateCatalog},
    error::ApiError,
    event::UNKNOWN_COUNTRY,
    paginate::{feed, lookup_by_id, PageRequest, UpdateFeed},
    storage::EventStore,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub events: EventStore,
    pub catalog: UpdateCatalog,
    /// Redirect target for `/api/download`.
    pub download_url: String,
    /// Link advertised by `/api/latest`.
    pub download_link: String,
}

/// Response body for the `/healthz` endpoint.
#[derive(Serialize, Deserialize)]
struct Health {
    status: String,
}

/// Response body for `/api/latest`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestInfo {
    version: String,
    download_link: String,
    last_updated: String,
}

/// Raw query parameters for `/api/updates`, parsed leniently.
#[derive(Deserialize)]
struct UpdateParams {
    page: Option<String>,
    limit: Option<String>,
}

/// Build the application router with CORS for `cors_origins` (any when empty).
pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/download", get(download))
        .route("/api/countries", get(countries))
        .route("/api/latest", get(latest_info))
        .route("/api/updates", get(updates))
        .route("/api/updates/{id}", get(update_by_id))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    let cors = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    if parsed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(parsed)
    }
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve_http(
    addr: SocketAddr,
    state: AppState,
    cors_origins: &[String],
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    let app = router(Arc::new(state), cors_origins);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

async fn healthz() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

/// Requester address: first `X-Forwarded-For` hop, else the peer address.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Country as reported by the CDN edge, else `UNKNOWN`.
fn client_country(headers: &HeaderMap) -> String {
    headers
        .get("cf-ipcountry")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_COUNTRY)
        .to_string()
}

/// Record the download, then redirect to the asset.
async fn download(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let ip = client_ip(&headers, peer);
    let country = client_country(&headers);
    // A failed write must not keep the user from their download.
    match state.events.record(&ip, &country) {
        Ok(_) => info!(%ip, %country, "download recorded"),
        Err(e) => error!(error = %e, %ip, "failed to record download"),
    }
    (
        StatusCode::FOUND,
        [(header::LOCATION, state.download_url.clone())],
    )
}

async fn countries(State(state): State<Arc<AppState>>) -> Result<Json<CountrySummary>, ApiError> {
    let events = state.events.load_all()?;
    let summary = summarize(&events);
    debug!(
        countries = summary.countries.entries().len(),
        total = summary.total_downloads,
        "country summary"
    );
    Ok(Json(summary))
}

async fn latest_info(State(state): State<Arc<AppState>>) -> Json<LatestInfo> {
    let release = latest(&state.catalog.load_all());
    Json(LatestInfo {
        version: release.version,
        download_link: state.download_link.clone(),
        last_updated: release.date,
    })
}

async fn updates(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpdateParams>,
) -> Json<UpdateFeed> {
    let req = PageRequest::from_params(params.page.as_deref(), params.limit.as_deref());
    Json(feed(&state.catalog.load_all(), req, Utc::now()))
}

async fn update_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DerivedUpdateRecord>, ApiError> {
    lookup_by_id(&state.catalog.load_all(), &id, Utc::now())
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Update not found".into()))
}
