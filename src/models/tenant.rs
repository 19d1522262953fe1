use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub contact_email: Option<String>,
    /// Receives admin notifications for new and cancelled bookings.
    pub notification_email: Option<String>,
    pub website_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub slug: String,
    pub name: String,
    pub contact_email: Option<String>,
    pub notification_email: Option<String>,
    pub website_url: Option<String>,
    /// First admin account of the tenant.
    pub admin_email: String,
    pub admin_name: String,
    pub admin_password: String,
}
