use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, warn};

use fitlink_gateway::auth::Identity;
use fitlink_types::api::NotificationResponse;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

/// GET /notifications -- newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let limit = query.limit.clamp(1, 100);
    let rows = tokio::task::spawn_blocking(move || db.get_notifications(identity.user_id, limit))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
        .map_err(|e| { error!("DB get_notifications error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?;

    let notifications: Vec<NotificationResponse> = rows
        .into_iter()
        .filter_map(|row| {
            let id = match row.id.parse() {
                Ok(id) => id,
                Err(e) => {
                    warn!("Corrupt notification id '{}': {}", row.id, e);
                    return None;
                }
            };
            let created_at = match row.created_at.parse::<chrono::DateTime<chrono::Utc>>() {
                Ok(ts) => ts,
                Err(e) => {
                    warn!("Corrupt created_at '{}' on notification '{}': {}", row.created_at, row.id, e);
                    return None;
                }
            };

            Some(NotificationResponse {
                id,
                kind: row.kind,
                title: row.title,
                message: row.message,
                from_user_id: row.from_user_id.and_then(|u| u.parse().ok()),
                link: row.link,
                is_read: row.is_read,
                created_at,
            })
        })
        .collect();

    Ok(Json(notifications))
}
