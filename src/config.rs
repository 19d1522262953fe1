use std::env;

use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_seconds: u64,
    pub host: String,
    pub port: u16,
    pub super_admin_key: String,
    pub app_base_url: String,
    /// Timezone the business's opening hours are expressed in.
    pub business_tz: Tz,
    // SMTP (optional)
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    // Embeddings API (optional, OpenAI-compatible)
    pub embeddings_api_key: Option<String>,
    pub embeddings_base_url: String,
    pub embeddings_model: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiry_seconds: env::var("JWT_EXPIRY_SECONDS")
                .unwrap_or_else(|_| "3600".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            super_admin_key: env::var("SUPER_ADMIN_KEY")
                .unwrap_or_else(|_| "change_this_super_admin_key".into()),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
            business_tz: business_tz()?,
            smtp_host: env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_username: env::var("SMTP_USERNAME").ok().filter(|s| !s.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|s| !s.is_empty()),
            smtp_from: env::var("SMTP_FROM").ok().filter(|s| !s.is_empty()),
            embeddings_api_key: env::var("EMBEDDINGS_API_KEY").ok().filter(|s| !s.is_empty()),
            embeddings_base_url: env::var("EMBEDDINGS_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            embeddings_model: env::var("EMBEDDINGS_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".into()),
        })
    }
}

fn business_tz() -> anyhow::Result<Tz> {
    let name = env::var("BUSINESS_TZ").unwrap_or_else(|_| "Europe/Amsterdam".into());
    name.parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("Invalid BUSINESS_TZ '{name}': {e}"))
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
