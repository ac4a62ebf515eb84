use axum::{Json, extract::State};

use fitlink_types::api::OnlineUsersResponse;

use crate::state::AppState;

/// GET /presence -- snapshot of who is connected right now.
pub async fn online_users(State(state): State<AppState>) -> Json<OnlineUsersResponse> {
    let mut user_ids: Vec<_> = state.presence.list_online().await.into_iter().collect();
    user_ids.sort();
    Json(OnlineUsersResponse { user_ids })
}
