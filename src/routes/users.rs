use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        auth::AuthenticatedUser,
        permission::{Feature, SetOverrideRequest, UserPermissions},
        user::{CreateUserRequest, UserProfile},
    },
    services::{auth::AuthService, permissions::PermissionService},
    AppState,
};

fn parse_feature(name: &str) -> Result<Feature, AppError> {
    name.parse()
        .map_err(|_| AppError::validation(format!("Unknown feature: {name}")))
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::Users).await?;
    let users = AuthService::list_users(&state.db, &user.tenant).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::Users).await?;
    let created = AuthService::create_user(&state.db, &user.tenant, &body).await?;
    tracing::info!("User {} created by {} ({})", created.id, user.user_id, user.tenant);
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /api/admin/users/{id}/permissions
pub async fn get_permissions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPermissions>, AppError> {
    // Everyone may read their own permissions; others need the users feature.
    if user_id != user.user_id {
        PermissionService::require_feature(&state.db, &user, Feature::Users).await?;
    }
    PermissionService::for_user(&state.db, &user.tenant, user_id)
        .await
        .map(Json)
}

/// PUT /api/admin/users/{id}/permissions/{feature}
pub async fn set_permission(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((user_id, feature)): Path<(Uuid, String)>,
    Json(body): Json<SetOverrideRequest>,
) -> Result<Json<UserPermissions>, AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::Users).await?;
    let feature = parse_feature(&feature)?;
    let perms =
        PermissionService::set_override(&state.db, &user.tenant, user_id, feature, body.granted).await?;
    tracing::info!(
        "Feature {feature} {} for user {user_id} by {} ({})",
        if body.granted { "granted" } else { "revoked" },
        user.user_id,
        user.tenant
    );
    Ok(Json(perms))
}

/// DELETE /api/admin/users/{id}/permissions/{feature} — back to the role default.
pub async fn clear_permission(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((user_id, feature)): Path<(Uuid, String)>,
) -> Result<Json<UserPermissions>, AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::Users).await?;
    let feature = parse_feature(&feature)?;
    PermissionService::clear_override(&state.db, &user.tenant, user_id, feature)
        .await
        .map(Json)
}
