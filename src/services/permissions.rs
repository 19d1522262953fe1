use std::collections::BTreeSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::AppError,
    models::{
        auth::AuthenticatedUser,
        permission::{Feature, FeatureOverride, UserPermissions},
        user::UserRole,
    },
};

/// Features a role has before any per-user override.
pub fn role_defaults(role: UserRole) -> BTreeSet<Feature> {
    match role {
        UserRole::Admin => Feature::ALL.into_iter().collect(),
        UserRole::Editor => [
            Feature::Appointments,
            Feature::Pages,
            Feature::Media,
            Feature::Newsletter,
            Feature::Chatbot,
        ]
        .into_iter()
        .collect(),
        UserRole::Member => [Feature::Appointments].into_iter().collect(),
    }
}

/// Role defaults plus grants minus revokes. Admins keep every feature.
/// Overrides naming an unknown feature are ignored.
pub fn effective_features(role: UserRole, overrides: &[FeatureOverride]) -> BTreeSet<Feature> {
    let mut features = role_defaults(role);
    if role == UserRole::Admin {
        return features;
    }
    for o in overrides {
        let Ok(feature) = o.feature.parse::<Feature>() else {
            continue;
        };
        if o.granted {
            features.insert(feature);
        } else {
            features.remove(&feature);
        }
    }
    features
}

pub struct PermissionService;

impl PermissionService {
    pub async fn overrides(
        pool: &PgPool,
        tenant: &str,
        user_id: Uuid,
    ) -> Result<Vec<FeatureOverride>, AppError> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, FeatureOverride>(&format!(
            r#"SELECT user_id, feature, granted, created_at
               FROM "{schema}".user_feature_overrides
               WHERE user_id = $1
               ORDER BY feature"#
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Role and effective features of an active user.
    pub async fn for_user(pool: &PgPool, tenant: &str, user_id: Uuid) -> Result<UserPermissions, AppError> {
        let schema = schema_name(tenant);
        let role: String = sqlx::query_scalar(&format!(
            r#"SELECT role FROM "{schema}".users WHERE id = $1 AND is_active = TRUE"#
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User"))?;
        let role: UserRole = role.parse()?;

        let overrides = Self::overrides(pool, tenant, user_id).await?;
        Ok(UserPermissions {
            user_id,
            role,
            features: effective_features(role, &overrides).into_iter().collect(),
            overrides,
        })
    }

    /// 403 unless the caller currently holds `feature`.
    ///
    /// Reads the role from the database rather than the token, so demotions
    /// and revokes apply before the token expires.
    pub async fn require_feature(
        pool: &PgPool,
        user: &AuthenticatedUser,
        feature: Feature,
    ) -> Result<(), AppError> {
        let perms = match Self::for_user(pool, &user.tenant, user.user_id).await {
            Ok(p) => p,
            Err(AppError::NotFound(_)) => return Err(AppError::Unauthorized("Account is inactive")),
            Err(e) => return Err(e),
        };
        if perms.features.contains(&feature) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied"))
        }
    }

    pub async fn set_override(
        pool: &PgPool,
        tenant: &str,
        user_id: Uuid,
        feature: Feature,
        granted: bool,
    ) -> Result<UserPermissions, AppError> {
        // Surfaces a 404 for unknown users before the FK would.
        Self::for_user(pool, tenant, user_id).await?;

        let schema = schema_name(tenant);
        sqlx::query(&format!(
            r#"INSERT INTO "{schema}".user_feature_overrides (user_id, feature, granted)
               VALUES ($1, $2, $3)
               ON CONFLICT (user_id, feature) DO UPDATE SET
                   granted = EXCLUDED.granted,
                   created_at = NOW()"#
        ))
        .bind(user_id)
        .bind(feature.as_str())
        .bind(granted)
        .execute(pool)
        .await?;

        Self::for_user(pool, tenant, user_id).await
    }

    pub async fn clear_override(
        pool: &PgPool,
        tenant: &str,
        user_id: Uuid,
        feature: Feature,
    ) -> Result<UserPermissions, AppError> {
        let schema = schema_name(tenant);
        sqlx::query(&format!(
            r#"DELETE FROM "{schema}".user_feature_overrides WHERE user_id = $1 AND feature = $2"#
        ))
        .bind(user_id)
        .bind(feature.as_str())
        .execute(pool)
        .await?;

        Self::for_user(pool, tenant, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn o(feature: &str, granted: bool) -> FeatureOverride {
        FeatureOverride {
            user_id: Uuid::nil(),
            feature: feature.into(),
            granted,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn member_defaults_to_appointments_only() {
        let f = effective_features(UserRole::Member, &[]);
        assert_eq!(f.into_iter().collect::<Vec<_>>(), vec![Feature::Appointments]);
    }

    #[test]
    fn grants_add_and_revokes_remove() {
        let f = effective_features(
            UserRole::Editor,
            &[o("appointment_settings", true), o("newsletter", false)],
        );
        assert!(f.contains(&Feature::AppointmentSettings));
        assert!(!f.contains(&Feature::Newsletter));
        assert!(f.contains(&Feature::Pages));
        assert!(!f.contains(&Feature::Users));
    }

    #[test]
    fn admin_cannot_be_revoked() {
        let f = effective_features(UserRole::Admin, &[o("users", false), o("appointments", false)]);
        assert_eq!(f.len(), Feature::ALL.len());
    }

    #[test]
    fn unknown_features_are_ignored() {
        let f = effective_features(UserRole::Member, &[o("teleportation", true)]);
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn feature_names_round_trip() {
        for f in Feature::ALL {
            assert_eq!(f.as_str().parse::<Feature>().unwrap(), f);
        }
        assert!("unknown".parse::<Feature>().is_err());
    }
}
