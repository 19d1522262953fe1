use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Dashboard areas that can be granted or revoked per user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Appointments,
    AppointmentSettings,
    Pages,
    Media,
    Newsletter,
    Chatbot,
    Users,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Appointments,
        Feature::AppointmentSettings,
        Feature::Pages,
        Feature::Media,
        Feature::Newsletter,
        Feature::Chatbot,
        Feature::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Appointments => "appointments",
            Feature::AppointmentSettings => "appointment_settings",
            Feature::Pages => "pages",
            Feature::Media => "media",
            Feature::Newsletter => "newsletter",
            Feature::Chatbot => "chatbot",
            Feature::Users => "users",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Feature {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown feature: {s}"))
    }
}

/// Per-user grant (`granted = true`) or revoke layered on the role defaults.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeatureOverride {
    pub user_id: Uuid,
    pub feature: String,
    pub granted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserPermissions {
    pub user_id: Uuid,
    pub role: super::user::UserRole,
    pub features: Vec<Feature>,
    pub overrides: Vec<FeatureOverride>,
}

/// Body for PUT /admin/users/{id}/permissions/{feature}.
#[derive(Debug, Deserialize)]
pub struct SetOverrideRequest {
    pub granted: bool,
}
