pub mod admin_appointments;
pub mod appointments;
pub mod auth;
pub mod health;
pub mod knowledge;
pub mod metrics;
pub mod schedule;
pub mod tenants;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{middleware::auth::JwtSecret, AppState};

/// Allows the app base domain, its tenant subdomains and localhost.
fn cors_layer(base_url: String) -> CorsLayer {
    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        if o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") {
            return true;
        }
        if o == base_url {
            return true;
        }
        let Some(idx) = base_url.find("://") else {
            return false;
        };
        let after_scheme = &base_url[idx + 3..];
        let domain = after_scheme.split('/').next().unwrap_or(after_scheme);
        let domain = domain.split(':').next().unwrap_or(domain);
        o.ends_with(&format!(".{domain}"))
    });

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-tenant"),
            header::HeaderName::from_static("x-super-admin-key"),
        ]))
        .allow_origin(origin)
}

pub fn router(state: AppState) -> Router {
    let jwt_secret = JwtSecret(state.config.jwt_secret.clone());
    let cors = cors_layer(state.config.app_base_url.clone());

    let api = Router::new()
        .route("/health", get(health::health_check))
        // Public booking
        .route("/appointments", post(appointments::create_appointment))
        .route("/appointments/availability", get(appointments::availability))
        .route("/appointments/availability/range", get(appointments::availability_range))
        .route("/appointments/schedule", get(appointments::schedule))
        .route(
            "/appointments/{token}",
            get(appointments::get_by_token)
                .put(appointments::update_by_token)
                .delete(appointments::cancel_by_token),
        )
        .route("/chat/context", post(knowledge::chat_context))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Appointments dashboard
        .route(
            "/admin/appointments",
            get(admin_appointments::list_appointments).post(admin_appointments::create_appointment),
        )
        .route(
            "/admin/appointments/settings",
            get(schedule::get_settings).put(schedule::update_settings),
        )
        .route(
            "/admin/appointments/overrides",
            get(schedule::list_overrides).post(schedule::create_override),
        )
        .route(
            "/admin/appointments/overrides/{id}",
            put(schedule::update_override).delete(schedule::delete_override),
        )
        .route(
            "/admin/appointments/{id}",
            get(admin_appointments::get_appointment)
                .put(admin_appointments::update_appointment)
                .delete(admin_appointments::delete_appointment),
        )
        // Users & permissions
        .route("/admin/users", get(users::list_users).post(users::create_user))
        .route("/admin/users/{id}/permissions", get(users::get_permissions))
        .route(
            "/admin/users/{id}/permissions/{feature}",
            put(users::set_permission).delete(users::clear_permission),
        )
        // Knowledge base
        .route(
            "/admin/knowledge",
            get(knowledge::list_sources)
                .post(knowledge::ingest)
                .delete(knowledge::delete_source),
        )
        // Super-admin
        .route(
            "/super-admin/tenants",
            get(tenants::list_tenants).post(tenants::create_tenant),
        );

    Router::new()
        .nest("/api", api)
        .route("/metrics", get(metrics::metrics_handler))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Knowledge ingestion bodies carry whole documents
        .layer(DefaultBodyLimit::max(5 * 1024 * 1024))
        .with_state(state)
}
