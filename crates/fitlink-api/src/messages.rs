use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use fitlink_gateway::auth::Identity;
use fitlink_types::api::UnreadCountResponse;
use fitlink_types::models::conversation_id;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor: `createdAt` of the oldest message from the previous page.
    pub before: Option<DateTime<Utc>>,
}

fn default_limit() -> u32 {
    50
}

/// GET /messages/{peer_id} -- newest-first history between the caller and `peer_id`.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let conversation = conversation_id(identity.user_id, peer_id);
    let limit = query.limit.clamp(1, 200);

    let messages = tokio::task::spawn_blocking(move || db.get_conversation(&conversation, limit, query.before))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
        .map_err(|e| { error!("DB get_conversation error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?;

    Ok(Json(messages))
}

/// GET /messages/unread
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let unread = tokio::task::spawn_blocking(move || db.count_unread(identity.user_id))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
        .map_err(|e| { error!("DB count_unread error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?;

    Ok(Json(UnreadCountResponse { unread }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use uuid::Uuid;

    use fitlink_types::api::UnreadCountResponse;
    use fitlink_types::models::{DirectMessage, NewDirectMessage};

    use crate::test_support::{get, json, state, token};

    #[tokio::test]
    async fn history_is_visible_to_both_participants() {
        let state = state();
        let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        state
            .db
            .insert_direct_message(&NewDirectMessage::new(alice, bob, "hi bob".into(), None, None))
            .unwrap();
        state
            .db
            .insert_direct_message(&NewDirectMessage::new(bob, alice, "hi alice".into(), None, None))
            .unwrap();
        state
            .db
            .insert_direct_message(&NewDirectMessage::new(alice, carol, "hi carol".into(), None, None))
            .unwrap();

        let (status, body) = get(&state, &format!("/messages/{}", bob), Some(&token(&state, alice))).await;
        assert_eq!(status, StatusCode::OK);
        let from_alice: Vec<DirectMessage> = json(&body);

        let (_, body) = get(&state, &format!("/messages/{}", alice), Some(&token(&state, bob))).await;
        let from_bob: Vec<DirectMessage> = json(&body);

        assert_eq!(from_alice.len(), 2);
        assert_eq!(from_alice, from_bob);
        assert_eq!(from_alice[0].content, "hi alice");
    }

    #[tokio::test]
    async fn history_honours_limit() {
        let state = state();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        for i in 0..5 {
            state
                .db
                .insert_direct_message(&NewDirectMessage::new(alice, bob, format!("m{}", i), None, None))
                .unwrap();
        }

        let (_, body) = get(&state, &format!("/messages/{}?limit=2", bob), Some(&token(&state, alice))).await;
        let page: Vec<DirectMessage> = json(&body);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].content, "m4");
    }

    #[tokio::test]
    async fn malformed_peer_id_is_rejected() {
        let state = state();
        let (status, _) = get(&state, "/messages/not-a-uuid", Some(&token(&state, Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unread_count_is_per_caller() {
        let state = state();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        state
            .db
            .insert_direct_message(&NewDirectMessage::new(alice, bob, "hi".into(), None, None))
            .unwrap();

        let (_, body) = get(&state, "/messages/unread", Some(&token(&state, bob))).await;
        assert_eq!(json::<UnreadCountResponse>(&body).unread, 1);

        let (_, body) = get(&state, "/messages/unread", Some(&token(&state, alice))).await;
        assert_eq!(json::<UnreadCountResponse>(&body).unread, 0);
    }
}
