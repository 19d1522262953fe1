use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::tenant::{ensure_own_tenant, CurrentTenant},
    models::{
        appointment::{
            AdminAppointment, AdminUpdateAppointmentRequest, AppointmentListQuery,
            AppointmentStatus, CreateAppointmentRequest,
        },
        auth::AuthenticatedUser,
        permission::Feature,
    },
    services::{
        appointments::AppointmentService,
        metrics::{APPOINTMENTS_COUNTER, BOOKING_CONFLICTS_COUNTER},
        notifications::{dispatch, AppointmentEvent},
        permissions::PermissionService,
    },
    AppState,
};

pub async fn list_appointments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    CurrentTenant(tenant): CurrentTenant,
    Query(params): Query<AppointmentListQuery>,
) -> Result<Json<Vec<AdminAppointment>>, AppError> {
    ensure_own_tenant(&user, &tenant)?;
    PermissionService::require_feature(&state.db, &user, Feature::Appointments).await?;
    let rows = AppointmentService::list(&state.db, &tenant.slug, &params).await?;
    Ok(Json(rows.into_iter().map(AdminAppointment::from).collect()))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    CurrentTenant(tenant): CurrentTenant,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminAppointment>, AppError> {
    ensure_own_tenant(&user, &tenant)?;
    PermissionService::require_feature(&state.db, &user, Feature::Appointments).await?;
    let appointment = AppointmentService::get_by_id(&state.db, &tenant.slug, id).await?;
    Ok(Json(appointment.into()))
}

/// Manual entry by staff (phone bookings). Opening hours are not enforced,
/// but an occupied slot still is.
pub async fn create_appointment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    CurrentTenant(tenant): CurrentTenant,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<AdminAppointment>), AppError> {
    ensure_own_tenant(&user, &tenant)?;
    PermissionService::require_feature(&state.db, &user, Feature::Appointments).await?;

    let appointment = match AppointmentService::create_admin(&state.db, &tenant.slug, &body).await {
        Ok(a) => a,
        Err(AppError::SlotUnavailable) => {
            BOOKING_CONFLICTS_COUNTER.with_label_values(&[&tenant.slug]).inc();
            return Err(AppError::SlotUnavailable);
        }
        Err(e) => return Err(e),
    };

    APPOINTMENTS_COUNTER
        .with_label_values(&[&tenant.slug, "created", "admin"])
        .inc();
    tracing::info!(
        "Appointment {} created by user {} ({})",
        appointment.id,
        user.user_id,
        tenant.slug
    );
    dispatch(state.email.clone(), AppointmentEvent::Confirmation, &tenant, &appointment, &state.config.app_base_url);

    Ok((StatusCode::CREATED, Json(appointment.into())))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    CurrentTenant(tenant): CurrentTenant,
    Path(id): Path<Uuid>,
    Json(body): Json<AdminUpdateAppointmentRequest>,
) -> Result<Json<AdminAppointment>, AppError> {
    ensure_own_tenant(&user, &tenant)?;
    PermissionService::require_feature(&state.db, &user, Feature::Appointments).await?;

    let before = AppointmentService::get_by_id(&state.db, &tenant.slug, id).await?;
    let (appointment, moved) =
        match AppointmentService::admin_update(&state.db, &tenant.slug, id, &body).await {
            Ok(r) => r,
            Err(AppError::SlotUnavailable) => {
                BOOKING_CONFLICTS_COUNTER.with_label_values(&[&tenant.slug]).inc();
                return Err(AppError::SlotUnavailable);
            }
            Err(e) => return Err(e),
        };

    let newly_cancelled = before.status() != AppointmentStatus::Cancelled
        && appointment.status() == AppointmentStatus::Cancelled;
    if newly_cancelled {
        APPOINTMENTS_COUNTER
            .with_label_values(&[&tenant.slug, "cancelled", "admin"])
            .inc();
        dispatch(state.email.clone(), AppointmentEvent::Cancellation, &tenant, &appointment, &state.config.app_base_url);
    } else if moved {
        APPOINTMENTS_COUNTER
            .with_label_values(&[&tenant.slug, "rescheduled", "admin"])
            .inc();
        dispatch(state.email.clone(), AppointmentEvent::Update, &tenant, &appointment, &state.config.app_base_url);
    }

    Ok(Json(appointment.into()))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    CurrentTenant(tenant): CurrentTenant,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ensure_own_tenant(&user, &tenant)?;
    PermissionService::require_feature(&state.db, &user, Feature::Appointments).await?;
    AppointmentService::delete(&state.db, &tenant.slug, id).await?;
    APPOINTMENTS_COUNTER
        .with_label_values(&[&tenant.slug, "deleted", "admin"])
        .inc();
    Ok(StatusCode::NO_CONTENT)
}
