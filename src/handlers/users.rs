use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::models::{SkillLevel, User, UserRole};
use crate::state::AppState;
use crate::store::UserStore;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    pub email: String,
    pub display_name: Option<String>,
    pub skill_level: Option<SkillLevel>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

/// PUT /api/users/:id — create or refresh the profile record for an
/// identity the auth provider vouched for. New profiles start as plain
/// users; an existing role is never overwritten here.
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpsertUserRequest>,
) -> Result<Response, AppError> {
    if request.email.trim().is_empty() {
        return Err(AppError::ValidationError("email is required".to_string()));
    }

    let now = Utc::now();
    let user = state
        .users
        .upsert(User {
            id,
            email: request.email,
            display_name: request.display_name,
            role: UserRole::User,
            skill_level: request.skill_level.unwrap_or(SkillLevel::Beginner),
            photo_url: request.photo_url,
            created_at: now,
            last_login_at: now,
        })
        .await?;

    Ok(success(user, "User profile saved").into_response())
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user = state
        .users
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{id}' was not found")))?;
    Ok(success(user, "User fetched").into_response())
}

/// GET /api/users — admin listing.
pub async fn list_users(State(state): State<AppState>) -> Result<Response, AppError> {
    let users = state.users.list().await?;
    Ok(success(users, "Users fetched").into_response())
}

/// PATCH /api/users/:id/role
pub async fn update_user_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Response, AppError> {
    let user = state
        .users
        .set_role(&id, request.role)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{id}' was not found")))?;
    Ok(success(user, "User role updated").into_response())
}
