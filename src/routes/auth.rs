use axum::{extract::State, Json};

use crate::{
    error::AppError,
    middleware::{rate_limit::check_rate_limit, tenant::CurrentTenant},
    models::{
        auth::AuthenticatedUser,
        user::{LoginRequest, LoginResponse, UserProfile},
    },
    services::auth::AuthService,
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    // Rate limit: 5 attempts per 15 min per email+tenant
    let rate_key = format!("rate:login:{}:{}", tenant.slug, body.email.trim().to_lowercase());
    let mut redis = state.redis.clone();
    check_rate_limit(&mut redis, &rate_key, 5, 900).await?;

    let response = AuthService::login(
        &state.db,
        &tenant,
        &body.email,
        &body.password,
        &state.config.jwt_secret,
        state.config.jwt_expiry_seconds,
    )
    .await?;
    Ok(Json(response))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserProfile>, AppError> {
    AuthService::me(&state.db, &user.tenant, user.user_id)
        .await
        .map(Json)
}
