//! Database-backed booking flows. Run with a disposable Postgres:
//!
//!   DATABASE_URL=postgres://... cargo test -- --ignored

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use sqlx::PgPool;

use homepro_api::{
    db::tenant::provision_tenant_schema,
    error::AppError,
    models::{
        appointment::{CreateAppointmentRequest, CustomerDetails, RescheduleRequest},
        schedule::OverrideRequest,
    },
    services::{
        appointments::AppointmentService, availability::AvailabilityService, clock,
        schedule::ScheduleService,
    },
};

const TENANT: &str = "acme";

async fn setup(pool: &PgPool) {
    sqlx::query("INSERT INTO tenants (slug, name) VALUES ($1, 'Acme Kozijnen')")
        .bind(TENANT)
        .execute(pool)
        .await
        .unwrap();
    provision_tenant_schema(pool, TENANT).await.unwrap();
}

/// First Tuesday at least a week away, so no slot has elapsed yet.
fn next_tuesday() -> NaiveDate {
    let mut d = clock::today() + Duration::days(7);
    while d.weekday() != Weekday::Tue {
        d += Duration::days(1);
    }
    d
}

fn booking(date: NaiveDate, time: &str) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        date,
        time: time.into(),
        customer: CustomerDetails {
            name: "Jan de Vries".into(),
            email: " Jan@Example.NL ".into(),
            phone: "06-12345678".into(),
            street: Some("Dorpsstraat 1".into()),
            postal_code: "1234ab".into(),
            city: Some("Utrecht".into()),
            remarks: None,
        },
        admin_notes: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn default_weekday_offers_hourly_slots(pool: PgPool) {
    setup(&pool).await;
    let day = AvailabilityService::for_date(&pool, TENANT, next_tuesday())
        .await
        .unwrap();
    assert!(day.is_open);
    assert_eq!(day.slot_duration_minutes, 60);
    assert_eq!(
        day.slots,
        vec!["09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00"]
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn booked_slot_disappears_and_second_booking_conflicts(pool: PgPool) {
    setup(&pool).await;
    let date = next_tuesday();

    let first = AppointmentService::create_public(&pool, TENANT, &booking(date, "10:00"))
        .await
        .unwrap();
    assert_eq!(first.customer_email, "jan@example.nl");
    assert_eq!(first.customer_phone, "0612345678");
    assert_eq!(first.customer_postal_code, "1234 AB");
    assert_eq!(first.edit_token.len(), 32);

    let day = AvailabilityService::for_date(&pool, TENANT, date).await.unwrap();
    assert!(!day.slots.contains(&"10:00".to_string()));
    assert_eq!(day.slots.len(), 7);

    let second = AppointmentService::create_public(&pool, TENANT, &booking(date, "10:00")).await;
    assert!(matches!(second, Err(AppError::SlotUnavailable)));

    // Staff entry skips opening hours but not the occupied slot.
    let manual = AppointmentService::create_admin(&pool, TENANT, &booking(date, "10:00")).await;
    assert!(matches!(manual, Err(AppError::SlotUnavailable)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn cancelling_frees_the_slot(pool: PgPool) {
    setup(&pool).await;
    let date = next_tuesday();

    let booked = AppointmentService::create_public(&pool, TENANT, &booking(date, "14:00"))
        .await
        .unwrap();
    let cancelled = AppointmentService::cancel_by_token(&pool, TENANT, &booked.edit_token)
        .await
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");

    let day = AvailabilityService::for_date(&pool, TENANT, date).await.unwrap();
    assert!(day.slots.contains(&"14:00".to_string()));

    AppointmentService::create_public(&pool, TENANT, &booking(date, "14:00"))
        .await
        .unwrap();

    // A cancelled booking can no longer be changed by the customer.
    let again = AppointmentService::cancel_by_token(&pool, TENANT, &booked.edit_token).await;
    assert!(matches!(again, Err(AppError::Validation(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn reschedule_moves_the_booking_and_keeps_the_token(pool: PgPool) {
    setup(&pool).await;
    let date = next_tuesday();

    let booked = AppointmentService::create_public(&pool, TENANT, &booking(date, "09:00"))
        .await
        .unwrap();
    let req = RescheduleRequest {
        time: Some("11:00".into()),
        ..Default::default()
    };
    let (moved, changed) =
        AppointmentService::reschedule_by_token(&pool, TENANT, &booked.edit_token, &req)
            .await
            .unwrap();
    assert!(changed);
    assert_eq!(moved.id, booked.id);
    assert_eq!(moved.edit_token, booked.edit_token);
    assert_eq!(moved.appointment_time.format("%H:%M").to_string(), "11:00");

    let day = AvailabilityService::for_date(&pool, TENANT, date).await.unwrap();
    assert!(day.slots.contains(&"09:00".to_string()));
    assert!(!day.slots.contains(&"11:00".to_string()));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn closure_override_blocks_public_bookings(pool: PgPool) {
    setup(&pool).await;
    let date = next_tuesday();

    ScheduleService::create_override(
        &pool,
        TENANT,
        &OverrideRequest {
            date,
            end_date: None,
            is_closed: true,
            open_time: None,
            close_time: None,
            reason: Some("Studiedag".into()),
            is_recurring: false,
            recurrence_day_of_week: None,
            show_on_website: true,
        },
    )
    .await
    .unwrap();

    let day = AvailabilityService::for_date(&pool, TENANT, date).await.unwrap();
    assert!(!day.is_open);
    assert_eq!(day.reason.as_deref(), Some("Studiedag"));
    assert!(day.slots.is_empty());

    let res = AppointmentService::create_public(&pool, TENANT, &booking(date, "10:00")).await;
    assert!(matches!(res, Err(AppError::SlotUnavailable)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn unknown_token_is_not_found(pool: PgPool) {
    setup(&pool).await;
    let res = AppointmentService::get_by_token(&pool, TENANT, "nope").await;
    assert!(matches!(res, Err(AppError::NotFound(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn token_lookup_returns_the_normalized_booking(pool: PgPool) {
    setup(&pool).await;
    let date = next_tuesday();
    let mut req = booking(date, "13:00");
    req.customer.name = "  Jan de Vries  ".into();
    req.customer.street = Some(" Dorpsstraat 1 ".into());
    req.customer.city = Some(" Utrecht ".into());

    let created = AppointmentService::create_public(&pool, TENANT, &req).await.unwrap();
    let fetched = AppointmentService::get_by_token(&pool, TENANT, &created.edit_token)
        .await
        .unwrap();

    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.appointment_date, date);
    assert_eq!(fetched.appointment_time.format("%H:%M").to_string(), "13:00");
    assert_eq!(fetched.customer_name, "Jan de Vries");
    assert_eq!(fetched.customer_email, "jan@example.nl");
    assert_eq!(fetched.customer_phone, "0612345678");
    assert_eq!(fetched.customer_postal_code, "1234 AB");
    assert_eq!(fetched.customer_street.as_deref(), Some("Dorpsstraat 1"));
    assert_eq!(fetched.customer_city.as_deref(), Some("Utrecht"));
    assert_eq!(fetched.status, "confirmed");
    assert_eq!(fetched.edit_token, created.edit_token);

    assert_eq!(fetched.customer_name, created.customer_name);
    assert_eq!(fetched.customer_email, created.customer_email);
    assert_eq!(fetched.customer_phone, created.customer_phone);
    assert_eq!(fetched.customer_postal_code, created.customer_postal_code);
    assert_eq!(fetched.customer_street, created.customer_street);
    assert_eq!(fetched.customer_city, created.customer_city);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn concurrent_bookings_for_one_slot_admit_exactly_one(pool: PgPool) {
    setup(&pool).await;
    let date = next_tuesday();
    let first = booking(date, "15:00");
    let mut second = booking(date, "15:00");
    second.customer.email = "piet@example.nl".into();

    // Both requests may pass the availability check; the slot index decides.
    let (a, b) = tokio::join!(
        AppointmentService::create_public(&pool, TENANT, &first),
        AppointmentService::create_public(&pool, TENANT, &second),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(AppError::SlotUnavailable)))
            .count(),
        1
    );

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tenant_acme.appointments WHERE status <> 'cancelled'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(active, 1);
}
