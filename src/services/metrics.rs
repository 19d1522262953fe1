use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Gauge, GaugeVec,
};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db::tenant::schema_name;

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref APPOINTMENTS_COUNTER: CounterVec = register_counter_vec!(
        "api_appointments_total",
        "Appointment operations by tenant, action and channel",
        &["tenant", "action", "channel"]
    ).unwrap();

    pub static ref BOOKING_CONFLICTS_COUNTER: CounterVec = register_counter_vec!(
        "api_booking_conflicts_total",
        "Bookings rejected because the slot was taken",
        &["tenant"]
    ).unwrap();

    pub static ref EMAILS_COUNTER: CounterVec = register_counter_vec!(
        "api_emails_total",
        "Notification emails by tenant, kind and outcome",
        &["tenant", "kind", "status"]
    ).unwrap();

    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "api_logins_total",
        "Login attempts by tenant and status",
        &["tenant", "status"]
    ).unwrap();

    pub static ref KNOWLEDGE_SEARCHES_COUNTER: CounterVec = register_counter_vec!(
        "api_knowledge_searches_total",
        "Chatbot context lookups by tenant",
        &["tenant"]
    ).unwrap();

    // ── Business metrics ────────────────────────────────────────────────────
    pub static ref UPCOMING_APPOINTMENTS_GAUGE: GaugeVec = register_gauge_vec!(
        "tenant_upcoming_appointments",
        "Confirmed appointments from today on, per tenant",
        &["tenant"]
    ).unwrap();

    pub static ref KNOWLEDGE_CHUNKS_GAUGE: GaugeVec = register_gauge_vec!(
        "tenant_knowledge_chunks",
        "Stored knowledge chunks per tenant",
        &["tenant"]
    ).unwrap();

    pub static ref TENANTS_GAUGE: Gauge = register_gauge!(
        "tenants_active_total",
        "Number of active tenants"
    ).unwrap();
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(pool: PgPool) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = collect(&pool).await {
                warn!("Metrics: collection failed: {}", e);
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
        }
    });
}

async fn collect(pool: &PgPool) -> anyhow::Result<()> {
    let tenants: Vec<String> =
        sqlx::query_scalar("SELECT slug FROM public.tenants WHERE is_active = TRUE")
            .fetch_all(pool)
            .await?;

    TENANTS_GAUGE.set(tenants.len() as f64);

    for slug in &tenants {
        let schema = schema_name(slug);

        let upcoming: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*)::BIGINT FROM "{schema}".appointments
               WHERE status = 'confirmed' AND appointment_date >= CURRENT_DATE"#
        ))
        .fetch_one(pool)
        .await
        .unwrap_or(0);
        UPCOMING_APPOINTMENTS_GAUGE.with_label_values(&[slug]).set(upcoming as f64);

        let chunks: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*)::BIGINT FROM "{schema}".knowledge_chunks"#
        ))
        .fetch_one(pool)
        .await
        .unwrap_or(0);
        KNOWLEDGE_CHUNKS_GAUGE.with_label_values(&[slug]).set(chunks as f64);
    }

    info!("Metrics: collected for {} tenant(s)", tenants.len());
    Ok(())
}
