use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        auth::AuthenticatedUser,
        permission::Feature,
        schedule::{DateOverride, OverrideListQuery, OverrideRequest, UpdateWeeklySettingsRequest, WeeklySetting},
    },
    services::{permissions::PermissionService, schedule::ScheduleService},
    AppState,
};

/// GET /api/admin/appointments/settings
pub async fn get_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<WeeklySetting>>, AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::AppointmentSettings).await?;
    ScheduleService::weekly_settings(&state.db, &user.tenant)
        .await
        .map(Json)
}

/// PUT /api/admin/appointments/settings
pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateWeeklySettingsRequest>,
) -> Result<Json<Vec<WeeklySetting>>, AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::AppointmentSettings).await?;
    let settings = ScheduleService::update_weekly_settings(&state.db, &user.tenant, &body.days).await?;
    tracing::info!("Weekly schedule updated by {} ({})", user.user_id, user.tenant);
    Ok(Json(settings))
}

pub async fn list_overrides(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<OverrideListQuery>,
) -> Result<Json<Vec<DateOverride>>, AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::AppointmentSettings).await?;
    ScheduleService::list_overrides(&state.db, &user.tenant, params.from)
        .await
        .map(Json)
}

pub async fn create_override(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<OverrideRequest>,
) -> Result<(StatusCode, Json<DateOverride>), AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::AppointmentSettings).await?;
    let created = ScheduleService::create_override(&state.db, &user.tenant, &body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_override(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<OverrideRequest>,
) -> Result<Json<DateOverride>, AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::AppointmentSettings).await?;
    ScheduleService::update_override(&state.db, &user.tenant, id, &body)
        .await
        .map(Json)
}

pub async fn delete_override(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::AppointmentSettings).await?;
    ScheduleService::delete_override(&state.db, &user.tenant, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
