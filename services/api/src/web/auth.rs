//! services/api/src/web/auth.rs
//!
//! Logout. Account creation and login live with the identity provider; this
//! service only consumes and revokes the `session` cookie.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::web::{middleware::session_cookie, state::AppState};

/// POST /auth/logout - Invalidate the auth session and drop the user's preference lists
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_cookie(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    // The user is looked up first so their preference store can be ended.
    if let Ok(user_id) = state.auth.validate_auth_session(auth_session_id).await {
        state.preferences.end_session(user_id).await;
        info!("User {} logged out.", user_id);
    }

    state
        .auth
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}
