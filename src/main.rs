use std::sync::Arc;

use redis::Client as RedisClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homepro_api::{
    config::Config,
    db, routes,
    services::{clock, email::EmailService, knowledge::EmbeddingsClient, metrics},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);
    clock::set_business_timezone(config.business_tz);
    info!("Business timezone: {}", config.business_tz);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    db::migrate_all_existing_tenants(&pool).await?;
    info!("Database connected and migrations applied");

    let redis_client = RedisClient::open(config.redis_url.as_str())?;
    let redis_conn = redis_client.get_multiplexed_async_connection().await?;
    info!("Redis connected");

    let email = EmailService::new(&config).map(Arc::new);
    if email.is_some() {
        info!("SMTP email service configured");
    } else {
        info!("SMTP not configured, appointment emails disabled");
    }

    let embeddings = EmbeddingsClient::new(&config).map(Arc::new);
    if embeddings.is_none() {
        info!("Embeddings API not configured, knowledge search disabled");
    }

    metrics::start(pool.clone());

    let state = AppState {
        db: pool,
        redis: redis_conn,
        config: config.clone(),
        email,
        embeddings,
    };

    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("homepro API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
