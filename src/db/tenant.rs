use sqlx::PgPool;

/// Name of the partial unique index that prevents double-booking.
pub const ACTIVE_SLOT_INDEX: &str = "appointments_active_slot_key";

/// Name of the unique index on single-date overrides.
pub const SINGLE_DATE_OVERRIDE_INDEX: &str = "date_overrides_single_date_key";

/// Provision a per-tenant PostgreSQL schema with all required tables.
/// Idempotent: called when a tenant is created and again on every startup.
pub async fn provision_tenant_schema(pool: &PgPool, slug: &str) -> anyhow::Result<()> {
    let schema = schema_name(slug);

    sqlx::raw_sql(&format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""))
        .execute(pool)
        .await?;

    // --- Users ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".users (
            id            UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            email         VARCHAR(255) UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            name          VARCHAR(255) NOT NULL,
            role          TEXT NOT NULL DEFAULT 'member'
                          CHECK (role IN ('admin','editor','member')),
            is_active     BOOLEAN NOT NULL DEFAULT TRUE,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Per-user feature grants/revokes ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".user_feature_overrides (
            user_id    UUID NOT NULL REFERENCES "{schema}".users(id) ON DELETE CASCADE,
            feature    TEXT NOT NULL,
            granted    BOOLEAN NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (user_id, feature)
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Weekly settings ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".appointment_settings (
            day_of_week           SMALLINT PRIMARY KEY CHECK (day_of_week BETWEEN 0 AND 6),
            is_open               BOOLEAN NOT NULL DEFAULT FALSE,
            open_time             TIME NOT NULL DEFAULT '09:00',
            close_time            TIME NOT NULL DEFAULT '17:00',
            slot_duration_minutes INTEGER NOT NULL DEFAULT 60
        )"#
    ))
    .execute(pool)
    .await?;

    // Seed Mon–Fri 09:00–17:00, weekend closed. Existing rows are left alone.
    sqlx::raw_sql(&format!(
        r#"INSERT INTO "{schema}".appointment_settings (day_of_week, is_open)
           SELECT d, d BETWEEN 1 AND 5 FROM generate_series(0, 6) AS d
           ON CONFLICT (day_of_week) DO NOTHING"#
    ))
    .execute(pool)
    .await?;

    // --- Date overrides ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".date_overrides (
            id                     UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            date                   DATE NOT NULL,
            end_date               DATE,
            is_closed              BOOLEAN NOT NULL DEFAULT TRUE,
            open_time              TIME,
            close_time             TIME,
            reason                 TEXT,
            is_recurring           BOOLEAN NOT NULL DEFAULT FALSE,
            recurrence_day_of_week SMALLINT CHECK (recurrence_day_of_week BETWEEN 0 AND 6),
            show_on_website        BOOLEAN NOT NULL DEFAULT TRUE,
            created_at             TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CHECK (end_date IS NULL OR end_date >= date)
        )"#
    ))
    .execute(pool)
    .await?;

    sqlx::raw_sql(&format!(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS {SINGLE_DATE_OVERRIDE_INDEX}
           ON "{schema}".date_overrides (date)
           WHERE end_date IS NULL AND NOT is_recurring AND recurrence_day_of_week IS NULL"#
    ))
    .execute(pool)
    .await?;

    // --- Appointments ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".appointments (
            id                   UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            appointment_date     DATE NOT NULL,
            appointment_time     TIME NOT NULL,
            duration_minutes     INTEGER NOT NULL DEFAULT 60,
            customer_name        VARCHAR(255) NOT NULL,
            customer_email       VARCHAR(255) NOT NULL,
            customer_phone       VARCHAR(32) NOT NULL,
            customer_street      VARCHAR(255),
            customer_postal_code VARCHAR(16) NOT NULL,
            customer_city        VARCHAR(128),
            remarks              TEXT,
            status               TEXT NOT NULL DEFAULT 'confirmed'
                                 CHECK (status IN ('confirmed','cancelled','completed')),
            edit_token           VARCHAR(64) UNIQUE NOT NULL,
            admin_notes          TEXT,
            created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at           TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // At most one non-cancelled appointment per (date, time).
    sqlx::raw_sql(&format!(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS {ACTIVE_SLOT_INDEX}
           ON "{schema}".appointments (appointment_date, appointment_time)
           WHERE status <> 'cancelled'"#
    ))
    .execute(pool)
    .await?;

    sqlx::raw_sql(&format!(
        r#"CREATE INDEX IF NOT EXISTS idx_appointments_date
           ON "{schema}".appointments (appointment_date)"#
    ))
    .execute(pool)
    .await?;

    // --- Knowledge chunks (chatbot retrieval) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".knowledge_chunks (
            id           UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            source       VARCHAR(255) NOT NULL,
            chunk_index  INTEGER NOT NULL,
            content      TEXT NOT NULL,
            content_hash CHAR(64) NOT NULL,
            embedding    REAL[] NOT NULL,
            created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (source, content_hash)
        )"#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub fn schema_name(slug: &str) -> String {
    format!("tenant_{}", slug.to_lowercase().replace('-', "_"))
}
