use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, AppState};

/// Extractor that validates the `X-Super-Admin-Key` header against `config.super_admin_key`.
pub struct SuperAdminAuth;

impl FromRequestParts<AppState> for SuperAdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("X-Super-Admin-Key")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized("Missing X-Super-Admin-Key header"))?;

        if key != state.config.super_admin_key {
            return Err(AppError::Unauthorized("Invalid super-admin key"));
        }

        Ok(SuperAdminAuth)
    }
}
