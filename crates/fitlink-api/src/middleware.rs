use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use fitlink_gateway::auth::{authenticate, bearer_token};

use crate::state::AppState;

/// Extract and validate the JWT from the Authorization header, then hand
/// the resulting `Identity` to handlers as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let identity = authenticate(&state.verifier, bearer_token(req.headers()))
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use uuid::Uuid;

    use fitlink_gateway::auth::JwtVerifier;
    use fitlink_types::api::Role;

    use crate::test_support::{get, state, token};

    #[tokio::test]
    async fn rejects_requests_without_token() {
        let state = state();
        let (status, _) = get(&state, "/presence", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_tokens_signed_with_another_secret() {
        let state = state();
        let forged = JwtVerifier::new("someone-else")
            .issue(Uuid::new_v4(), Role::Admin, chrono::Duration::hours(1))
            .unwrap();
        let (status, _) = get(&state, "/presence", Some(&forged)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let state = state();
        let t = token(&state, Uuid::new_v4());
        let (status, _) = get(&state, "/presence", Some(&t)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
