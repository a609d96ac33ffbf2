//! User Profile Handlers

use axum::{Json, extract::State};

use crate::api::convert::repo_err;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::repository::UserRepository;
use crate::utils::{AppError, AppResult};

use shared::UserInfo;

/// GET /api/user - 当前用户资料
pub async fn profile(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<UserInfo>> {
    let repo = UserRepository::new(state.get_db());
    let stored = repo
        .find_by_id(&user.id)
        .await
        .map_err(repo_err)?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(stored.to_info()))
}
