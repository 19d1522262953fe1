use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::error::AppError;
use crate::models::auth::{AuthenticatedUser, Claims};

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized("Invalid Authorization header format"))?;

        let secret = parts
            .extensions
            .get::<JwtSecret>()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("JWT secret not configured")))?;

        let user = decode_access_token(token, &secret.0)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token"))?;

        // Cross-tenant IDOR prevention: a token issued for one tenant is never
        // accepted on another tenant's requests.
        if let Some(x_tenant) = parts
            .headers
            .get("X-Tenant")
            .and_then(|v| v.to_str().ok())
        {
            if user.tenant != x_tenant.to_lowercase() {
                return Err(AppError::Forbidden("Tenant mismatch"));
            }
        }

        Ok(user)
    }
}

/// Extension type to carry the JWT secret through request extensions.
#[derive(Clone)]
pub struct JwtSecret(pub String);

pub fn decode_access_token(token: &str, secret: &str) -> Result<AuthenticatedUser, anyhow::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(token, &key, &validation)?;
    let claims = data.claims;

    Ok(AuthenticatedUser {
        user_id: claims.sub.parse()?,
        tenant: claims.tenant,
        role: claims.role,
    })
}
