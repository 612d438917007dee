use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use chrono::Utc;
use liftlog_domain::{SessionRepository, UserRepository, UserService};
use serde::Serialize;
use tracing::info;

use crate::{
    auth::AdminUser,
    error::ApiResult,
    extract::Json,
    state::SharedState,
    users::UserResponse,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users", get(get_users))
        .route("/cleanup/avatars", post(cleanup_avatars))
        .route("/cleanup/sessions", post(cleanup_sessions))
}

#[derive(Serialize, Debug, PartialEq)]
pub struct AvatarCleanupResponse {
    pub removed: Vec<String>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct SessionCleanupResponse {
    pub removed: usize,
}

async fn get_users(
    State(state): State<SharedState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state.service.get_users().await?;
    Ok(Json(
        users
            .into_iter()
            .map(|user| UserResponse::new(user, &state.config))
            .collect(),
    ))
}

/// Deletes avatar files no user refers to anymore.
async fn cleanup_avatars(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
) -> ApiResult<Json<AvatarCleanupResponse>> {
    let _cleanup = state.avatars.cleanup_guard().await;
    let referenced = state.storage.read_avatars().await?;
    let removed = state
        .avatars
        .remove_orphans(&referenced)
        .await?;
    info!(admin_id = %admin.id, removed = removed.len(), "orphaned avatars removed");
    Ok(Json(AvatarCleanupResponse { removed }))
}

async fn cleanup_sessions(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
) -> ApiResult<Json<SessionCleanupResponse>> {
    let removed = state.storage.delete_expired_sessions(Utc::now()).await?;
    info!(admin_id = %admin.id, removed, "expired sessions removed");
    Ok(Json(SessionCleanupResponse { removed }))
}
