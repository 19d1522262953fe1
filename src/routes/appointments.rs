//! Public booking endpoints, including customer self-service by edit token.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::{
    error::AppError,
    middleware::{
        rate_limit::{check_rate_limit, client_ip},
        tenant::CurrentTenant,
    },
    models::{
        appointment::{
            Appointment, AvailabilityQuery, AvailabilityRangeQuery, BookingConfirmation,
            CreateAppointmentRequest, DateSummary, DayAvailability, RescheduleRequest,
        },
        schedule::PublicSchedule,
    },
    services::{
        appointments::AppointmentService,
        availability::AvailabilityService,
        metrics::{APPOINTMENTS_COUNTER, BOOKING_CONFLICTS_COUNTER},
        notifications::{dispatch, AppointmentEvent},
        schedule::ScheduleService,
    },
    AppState,
};

/// GET /api/appointments/availability?date=YYYY-MM-DD
pub async fn availability(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Query(params): Query<AvailabilityQuery>,
) -> Result<Json<DayAvailability>, AppError> {
    AvailabilityService::for_date(&state.db, &tenant.slug, params.date)
        .await
        .map(Json)
}

/// GET /api/appointments/availability/range?from=…&to=…
pub async fn availability_range(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Query(params): Query<AvailabilityRangeQuery>,
) -> Result<Json<Vec<DateSummary>>, AppError> {
    AvailabilityService::for_range(&state.db, &tenant.slug, params.from, params.to)
        .await
        .map(Json)
}

/// GET /api/appointments/schedule — opening hours and announced closures.
pub async fn schedule(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<Json<PublicSchedule>, AppError> {
    ScheduleService::public_schedule(&state.db, &tenant.slug)
        .await
        .map(Json)
}

/// POST /api/appointments
pub async fn create_appointment(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    headers: HeaderMap,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<BookingConfirmation>), AppError> {
    // Rate limit: 5 bookings per hour per IP+tenant
    let rate_key = format!("rate:booking:{}:{}", tenant.slug, client_ip(&headers));
    let mut redis = state.redis.clone();
    check_rate_limit(&mut redis, &rate_key, 5, 3600).await?;

    let appointment = match AppointmentService::create_public(&state.db, &tenant.slug, &body).await {
        Ok(a) => a,
        Err(AppError::SlotUnavailable) => {
            BOOKING_CONFLICTS_COUNTER.with_label_values(&[&tenant.slug]).inc();
            return Err(AppError::SlotUnavailable);
        }
        Err(e) => return Err(e),
    };

    APPOINTMENTS_COUNTER
        .with_label_values(&[&tenant.slug, "created", "public"])
        .inc();
    tracing::info!(
        "Appointment {} booked for {} {} ({})",
        appointment.id,
        appointment.appointment_date,
        appointment.appointment_time,
        tenant.slug
    );

    dispatch(state.email.clone(), AppointmentEvent::Confirmation, &tenant, &appointment, &state.config.app_base_url);
    dispatch(state.email.clone(), AppointmentEvent::AdminNewBooking, &tenant, &appointment, &state.config.app_base_url);

    let edit_token = appointment.edit_token.clone();
    Ok((
        StatusCode::CREATED,
        Json(BookingConfirmation { appointment, edit_token }),
    ))
}

/// GET /api/appointments/{token}
pub async fn get_by_token(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Path(token): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    AppointmentService::get_by_token(&state.db, &tenant.slug, &token)
        .await
        .map(Json)
}

/// PUT /api/appointments/{token} — reschedule and/or update contact details.
pub async fn update_by_token(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Path(token): Path<String>,
    Json(body): Json<RescheduleRequest>,
) -> Result<Json<Appointment>, AppError> {
    let (appointment, moved) =
        match AppointmentService::reschedule_by_token(&state.db, &tenant.slug, &token, &body).await {
            Ok(r) => r,
            Err(AppError::SlotUnavailable) => {
                BOOKING_CONFLICTS_COUNTER.with_label_values(&[&tenant.slug]).inc();
                return Err(AppError::SlotUnavailable);
            }
            Err(e) => return Err(e),
        };

    if moved {
        APPOINTMENTS_COUNTER
            .with_label_values(&[&tenant.slug, "rescheduled", "public"])
            .inc();
        dispatch(state.email.clone(), AppointmentEvent::Update, &tenant, &appointment, &state.config.app_base_url);
    }
    Ok(Json(appointment))
}

/// DELETE /api/appointments/{token} — cancels; the row is kept.
pub async fn cancel_by_token(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Path(token): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = AppointmentService::cancel_by_token(&state.db, &tenant.slug, &token).await?;

    APPOINTMENTS_COUNTER
        .with_label_values(&[&tenant.slug, "cancelled", "public"])
        .inc();
    dispatch(state.email.clone(), AppointmentEvent::Cancellation, &tenant, &appointment, &state.config.app_base_url);
    dispatch(state.email.clone(), AppointmentEvent::AdminCancellation, &tenant, &appointment, &state.config.app_base_url);

    Ok(Json(appointment))
}
