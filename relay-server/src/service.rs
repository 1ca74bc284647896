//! HTTP routes over the room store

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use jamroom_core::network::{
    ErrorResponse, HostResponse, JoinResponse, PingResponse, ReceiveQuery, ReceiveResponse,
    RoomCode, RoomsResponse, StatusResponse, Timestamp, WireCommand,
};
use parking_lot::RwLock;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::metrics::Metrics;
use crate::store::{RoomStore, StoreError};

pub type SharedMetrics = Arc<RwLock<Metrics>>;

pub struct AppState {
    pub store: RoomStore,
    pub metrics: SharedMetrics,
    pub config: RelayConfig,
}

impl AppState {
    pub fn new(config: RelayConfig, metrics: SharedMetrics) -> Self {
        metrics.write().room_ttl_secs = config.room_ttl.as_secs();
        Self {
            store: RoomStore::new(),
            metrics,
            config,
        }
    }

    /// Lazy TTL sweep, run before every request
    fn sweep(&self) {
        let evicted = self.store.evict_expired(self.config.room_ttl);
        if !evicted.is_empty() {
            info!("Evicted {} expired room(s)", evicted.len());
        }
        let codes: Vec<String> = evicted.iter().map(|c| c.to_string()).collect();
        self.metrics.write().rooms_evicted(&codes, self.store.len());
    }

    /// Resolve a path segment to an open room
    fn lookup(&self, raw: &str) -> Result<RoomCode, ApiError> {
        match RoomCode::parse(raw) {
            Some(code) if self.store.contains(&code) => Ok(code),
            _ => Err(self.not_found(raw)),
        }
    }

    fn not_found(&self, raw: &str) -> ApiError {
        debug!("Unknown room '{}'", raw);
        self.metrics.write().room_not_found(raw);
        ApiError::RoomNotFound
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Room not found")]
    RoomNotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::RoomNotFound => StatusCode::NOT_FOUND,
        };
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/host", post(host))
        .route("/join/{code}", post(join))
        .route("/send/{code}", post(send))
        .route("/receive/{code}", get(receive))
        .route("/ping", get(ping))
        .route("/rooms", get(rooms))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn host(State(state): State<Arc<AppState>>) -> Json<HostResponse> {
    state.sweep();
    let code = state.store.create();
    info!("Room {} created", code);
    state
        .metrics
        .write()
        .room_created(code.as_str(), state.store.len());
    Json(HostResponse { room_code: code })
}

async fn join(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<JoinResponse>, ApiError> {
    state.sweep();
    let code = state.lookup(&raw)?;
    info!("Join to room {}", code);
    state.metrics.write().room_joined(code.as_str());
    Ok(Json(JoinResponse {
        status: "joined".to_string(),
        room_code: code,
    }))
}

async fn send(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Json(command): Json<WireCommand>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.sweep();
    let code = state.lookup(&raw)?;
    let tag = command.command.clone();
    // The room may have been swept between lookup and append
    state
        .store
        .append(&code, command)
        .map_err(|StoreError::RoomNotFound| state.not_found(&raw))?;

    debug!("Relayed '{}' to room {}", tag, code);
    state.metrics.write().command_relayed(code.as_str(), &tag);
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

async fn receive(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Query(query): Query<ReceiveQuery>,
) -> Result<Json<ReceiveResponse>, ApiError> {
    state.sweep();
    let code = state.lookup(&raw)?;
    let (commands, timestamp) = state
        .store
        .drain_since(&code, query.since)
        .map_err(|StoreError::RoomNotFound| state.not_found(&raw))?;

    state.metrics.write().poll_served(commands.len());
    Ok(Json(ReceiveResponse {
        commands,
        timestamp,
    }))
}

async fn ping(State(state): State<Arc<AppState>>) -> Json<PingResponse> {
    state.sweep();
    state.metrics.write().ping();
    Json(PingResponse {
        status: "alive".to_string(),
        timestamp: Timestamp::now(),
    })
}

async fn rooms(State(state): State<Arc<AppState>>) -> Json<RoomsResponse> {
    state.sweep();
    let rooms = state.store.room_codes();
    Json(RoomsResponse {
        count: rooms.len(),
        rooms,
    })
}
