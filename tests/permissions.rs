use sqlx::PgPool;

use homepro_api::{
    error::AppError,
    models::{
        auth::AuthenticatedUser,
        permission::Feature,
        tenant::CreateTenantRequest,
        user::{CreateUserRequest, UserRole},
    },
    services::{auth::AuthService, permissions::PermissionService, tenants::TenantService},
};

async fn tenant(pool: &PgPool) -> String {
    let req = CreateTenantRequest {
        slug: "Bouw-Bedrijf".into(),
        name: "Bouwbedrijf".into(),
        contact_email: None,
        notification_email: Some("planning@bouw.nl".into()),
        website_url: None,
        admin_email: "admin@bouw.nl".into(),
        admin_name: "Admin".into(),
        admin_password: "correct horse battery".into(),
    };
    TenantService::create(pool, &req).await.unwrap().slug
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn overrides_change_effective_features(pool: PgPool) {
    let slug = tenant(&pool).await;
    assert_eq!(slug, "bouw-bedrijf");

    let member = AuthService::create_user(
        &pool,
        &slug,
        &CreateUserRequest {
            email: "piet@bouw.nl".into(),
            name: "Piet".into(),
            password: "long enough pw".into(),
            role: UserRole::Member,
        },
    )
    .await
    .unwrap();
    let caller = AuthenticatedUser {
        user_id: member.id,
        tenant: slug.clone(),
        role: UserRole::Member,
    };

    PermissionService::require_feature(&pool, &caller, Feature::Appointments)
        .await
        .unwrap();
    let denied = PermissionService::require_feature(&pool, &caller, Feature::AppointmentSettings).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let perms = PermissionService::set_override(&pool, &slug, member.id, Feature::AppointmentSettings, true)
        .await
        .unwrap();
    assert!(perms.features.contains(&Feature::AppointmentSettings));
    PermissionService::require_feature(&pool, &caller, Feature::AppointmentSettings)
        .await
        .unwrap();

    let perms = PermissionService::set_override(&pool, &slug, member.id, Feature::Appointments, false)
        .await
        .unwrap();
    assert!(!perms.features.contains(&Feature::Appointments));

    let perms = PermissionService::clear_override(&pool, &slug, member.id, Feature::Appointments)
        .await
        .unwrap();
    assert!(perms.features.contains(&Feature::Appointments));
    assert_eq!(perms.overrides.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn login_issues_token_for_tenant_admin(pool: PgPool) {
    let slug = tenant(&pool).await;
    let tenant = TenantService::list(&pool).await.unwrap().remove(0);

    let res = AuthService::login(&pool, &tenant, "ADMIN@bouw.nl", "correct horse battery", "s", 60)
        .await
        .unwrap();
    assert_eq!(res.user.role, UserRole::Admin);
    assert_eq!(res.tenant_name, "Bouwbedrijf");

    let bad = AuthService::login(&pool, &tenant, "admin@bouw.nl", "wrong", "s", 60).await;
    assert!(matches!(bad, Err(AppError::Unauthorized(_))));

    let dup = TenantService::create(
        &pool,
        &CreateTenantRequest {
            slug: slug.clone(),
            name: "Again".into(),
            contact_email: None,
            notification_email: None,
            website_url: None,
            admin_email: "x@bouw.nl".into(),
            admin_name: "X".into(),
            admin_password: "correct horse battery".into(),
        },
    )
    .await;
    assert!(matches!(dup, Err(AppError::Conflict(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn failed_admin_creation_removes_the_registration(pool: PgPool) {
    let req = CreateTenantRequest {
        slug: "glas-zetter".into(),
        name: "Glaszetter".into(),
        contact_email: None,
        notification_email: None,
        website_url: None,
        admin_email: "admin@glas.nl".into(),
        admin_name: "Admin".into(),
        admin_password: "short".into(),
    };
    let res = TenantService::create(&pool, &req).await;
    assert!(matches!(res, Err(AppError::Validation(_))));

    assert!(TenantService::list(&pool).await.unwrap().is_empty());
    let schemas: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.schemata WHERE schema_name = 'tenant_glas_zetter'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(schemas, 0);

    // The slug is free again.
    let retry = CreateTenantRequest {
        admin_password: "long enough password".into(),
        ..req
    };
    TenantService::create(&pool, &retry).await.unwrap();
}
