pub mod config;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use fitlink_api::state::AppStateInner;
use fitlink_db::Database;
use fitlink_gateway::auth::{JwtVerifier, authenticate, bearer_token};
use fitlink_gateway::connection;
use fitlink_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    verifier: Arc<JwtVerifier>,
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

/// Full HTTP + websocket router over one shared presence registry.
pub fn app(dispatcher: Dispatcher, db: Arc<Database>, verifier: JwtVerifier) -> Router {
    let api_state = Arc::new(AppStateInner {
        db,
        verifier: verifier.clone(),
        presence: dispatcher.presence().clone(),
    });

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(ServerState {
            dispatcher,
            verifier: Arc::new(verifier),
        });

    Router::new()
        .route("/health", get(health))
        .merge(fitlink_api::router(api_state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Dispatcher wired to `db` for both message storage and notifications.
pub fn dispatcher(db: Arc<Database>) -> Dispatcher {
    Dispatcher::new(db.clone(), db)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// The credential comes from `?token=` or `Authorization: Bearer`. A bad
/// or missing one gets 401 and the socket is never upgraded.
async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = query.token.as_deref().or_else(|| bearer_token(&headers));

    let identity = match authenticate(state.verifier.as_ref(), token) {
        Ok(identity) => identity,
        Err(e) => {
            warn!("Gateway handshake rejected: {}", e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.dispatcher, identity))
}
