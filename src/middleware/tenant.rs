use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    error::AppError,
    models::{auth::AuthenticatedUser, tenant::Tenant},
    AppState,
};

/// Validates that a slug only contains lowercase ASCII letters, digits and hyphens,
/// does not start or end with a hyphen, and is between 2 and 63 characters.
/// This prevents SQL injection via the tenant name used in format!() schema queries.
pub fn is_valid_slug(s: &str) -> bool {
    let len = s.len();
    (2..=63).contains(&len)
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

/// Resolves the tenant from the `X-Tenant` header or first subdomain,
/// then loads it and checks that it is active.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub Tenant);

impl FromRequestParts<AppState> for CurrentTenant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let slug = extract_slug(parts)?;

        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM public.tenants WHERE slug = $1")
            .bind(&slug)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::NotFound("Tenant"))?;

        if !tenant.is_active {
            return Err(AppError::Forbidden("Account is inactive"));
        }
        Ok(CurrentTenant(tenant))
    }
}

/// 403 when the token was issued for another tenant than the request targets.
/// Covers requests that resolve the tenant by subdomain instead of `X-Tenant`.
pub fn ensure_own_tenant(user: &AuthenticatedUser, tenant: &Tenant) -> Result<(), AppError> {
    if user.tenant != tenant.slug {
        return Err(AppError::Forbidden("Tenant mismatch"));
    }
    Ok(())
}

fn extract_slug(parts: &Parts) -> Result<String, AppError> {
    // 1. X-Tenant header
    if let Some(tenant) = parts
        .headers
        .get("X-Tenant")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase())
        .filter(|s| !s.is_empty())
    {
        if !is_valid_slug(&tenant) {
            return Err(AppError::validation("Invalid tenant identifier"));
        }
        return Ok(tenant);
    }

    // 2. Subdomain from Host header
    if let Some(host) = parts.headers.get("Host").and_then(|v| v.to_str().ok()) {
        if let Some(subdomain) = subdomain_of(host) {
            if !is_valid_slug(&subdomain) {
                return Err(AppError::validation("Invalid tenant identifier"));
            }
            return Ok(subdomain);
        }
    }

    Err(AppError::validation("Missing X-Tenant header"))
}

fn subdomain_of(host: &str) -> Option<String> {
    let domain = host.split(':').next().unwrap_or(host);
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 3 {
        return None;
    }
    let subdomain = labels[0].to_lowercase();
    (subdomain != "www" && subdomain != "api").then_some(subdomain)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::user::UserRole;

    fn tenant(slug: &str) -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            slug: slug.into(),
            name: "Acme".into(),
            contact_email: None,
            notification_email: None,
            website_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user_of(slug: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            tenant: slug.into(),
            role: UserRole::Admin,
        }
    }

    #[test]
    fn token_must_belong_to_resolved_tenant() {
        assert!(ensure_own_tenant(&user_of("acme"), &tenant("acme")).is_ok());
        assert!(matches!(
            ensure_own_tenant(&user_of("other"), &tenant("acme")),
            Err(AppError::Forbidden("Tenant mismatch"))
        ));
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("acme-bouw"));
        assert!(is_valid_slug("a1"));
        assert!(!is_valid_slug("a"));
        assert!(!is_valid_slug("-acme"));
        assert!(!is_valid_slug("acme-"));
        assert!(!is_valid_slug("Acme"));
        assert!(!is_valid_slug("acme\"; DROP"));
    }

    #[test]
    fn subdomain_is_first_label_of_three() {
        assert_eq!(subdomain_of("acme.homepro.nl"), Some("acme".into()));
        assert_eq!(subdomain_of("acme.homepro.nl:8080"), Some("acme".into()));
        assert_eq!(subdomain_of("homepro.nl"), None);
        assert_eq!(subdomain_of("www.homepro.nl"), None);
        assert_eq!(subdomain_of("api.homepro.nl"), None);
    }
}
