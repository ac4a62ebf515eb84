pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod presence;
pub mod state;

use axum::{Router, middleware::from_fn_with_state, routing::get};

use crate::state::AppState;

/// Authenticated HTTP routes. Every request needs a Bearer JWT.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/messages/unread", get(messages::unread_count))
        .route("/messages/{peer_id}", get(messages::get_conversation))
        .route("/notifications", get(notifications::list_notifications))
        .route("/presence", get(presence::online_users))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;
    use uuid::Uuid;

    use fitlink_db::Database;
    use fitlink_gateway::auth::JwtVerifier;
    use fitlink_gateway::presence::PresenceRegistry;
    use fitlink_types::api::Role;

    use crate::state::{AppState, AppStateInner};

    pub fn state() -> AppState {
        Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            verifier: JwtVerifier::new("api-test-secret"),
            presence: PresenceRegistry::new(),
        })
    }

    pub fn token(state: &AppState, user_id: Uuid) -> String {
        state
            .verifier
            .issue(user_id, Role::User, chrono::Duration::hours(1))
            .unwrap()
    }

    pub async fn get(state: &AppState, uri: &str, token: Option<&str>) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = crate::router(state.clone())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    pub fn json<T: DeserializeOwned>(body: &[u8]) -> T {
        serde_json::from_slice(body).unwrap()
    }
}
