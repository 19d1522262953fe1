use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppError,
    middleware::super_admin::SuperAdminAuth,
    models::tenant::{CreateTenantRequest, Tenant},
    services::tenants::TenantService,
    AppState,
};

// ─── Tenant registration ──────────────────────────────────────────────────────

pub async fn list_tenants(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
) -> Result<Json<Vec<Tenant>>, AppError> {
    TenantService::list(&state.db).await.map(Json)
}

pub async fn create_tenant(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
    Json(body): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<Tenant>), AppError> {
    let tenant = TenantService::create(&state.db, &body).await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}
