use sqlx::PgPool;

use crate::{
    db::tenant::{provision_tenant_schema, schema_name},
    error::{is_unique_violation, AppError},
    middleware::tenant::is_valid_slug,
    models::{
        tenant::{CreateTenantRequest, Tenant},
        user::{CreateUserRequest, UserRole},
    },
    services::{
        auth::AuthService,
        validation::{normalize_email, optional_text, required_text},
    },
};

pub struct TenantService;

impl TenantService {
    pub async fn list(pool: &PgPool) -> Result<Vec<Tenant>, AppError> {
        let tenants = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY name")
            .fetch_all(pool)
            .await?;
        Ok(tenants)
    }

    /// Registers the tenant, provisions its schema and creates its first admin.
    pub async fn create(pool: &PgPool, req: &CreateTenantRequest) -> Result<Tenant, AppError> {
        let slug = req.slug.trim().to_lowercase();
        if !is_valid_slug(&slug) {
            return Err(AppError::validation(
                "Slug must be 2-63 lowercase letters, digits or hyphens",
            ));
        }
        let name = required_text(&req.name, "Name", 255)?;
        let contact_email = req.contact_email.as_deref().map(normalize_email).transpose()?;
        let notification_email = req
            .notification_email
            .as_deref()
            .map(normalize_email)
            .transpose()?;
        let website_url = optional_text(req.website_url.as_deref(), "Website URL", 2048)?;

        let tenant = sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (slug, name, contact_email, notification_email, website_url)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(&slug)
        .bind(&name)
        .bind(&contact_email)
        .bind(&notification_email)
        .bind(&website_url)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, None) {
                AppError::Conflict(format!("Tenant '{slug}' already exists"))
            } else {
                e.into()
            }
        })?;

        provision_tenant_schema(pool, &slug).await?;

        let admin = CreateUserRequest {
            email: req.admin_email.clone(),
            name: req.admin_name.clone(),
            password: req.admin_password.clone(),
            role: UserRole::Admin,
        };
        if let Err(e) = AuthService::create_user(pool, &slug, &admin).await {
            tracing::warn!("Admin creation failed for tenant {slug}, removing tenant: {e}");
            Self::remove_registration(pool, &slug).await;
            return Err(e);
        }

        tracing::info!("Provisioned tenant {slug}");
        Ok(tenant)
    }

    /// Drops the schema and registry row so the slug can be retried.
    async fn remove_registration(pool: &PgPool, slug: &str) {
        let drop = format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", schema_name(slug));
        if let Err(e) = sqlx::raw_sql(&drop).execute(pool).await {
            tracing::warn!("Rollback of tenant {slug}: dropping schema failed: {e}");
        }
        if let Err(e) = sqlx::query("DELETE FROM tenants WHERE slug = $1")
            .bind(slug)
            .execute(pool)
            .await
        {
            tracing::warn!("Rollback of tenant {slug}: deleting registry row failed: {e}");
        }
    }
}
