use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::{is_unique_violation, AppError},
    models::{
        auth::Claims,
        tenant::Tenant,
        user::{CreateUserRequest, LoginResponse, User, UserProfile, UserRole},
    },
    services::{
        metrics::LOGINS_COUNTER,
        validation::{normalize_email, required_text},
    },
};

pub const MIN_PASSWORD_LEN: usize = 10;

const USER_COLUMNS: &str = "id, email, password_hash, name, role, is_active, created_at";

pub struct AuthService;

impl AuthService {
    pub async fn login(
        pool: &PgPool,
        tenant: &Tenant,
        email: &str,
        password: &str,
        jwt_secret: &str,
        access_ttl: u64,
    ) -> Result<LoginResponse, AppError> {
        let schema = schema_name(&tenant.slug);
        let invalid = AppError::Unauthorized("Invalid credentials");

        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "{schema}".users
               WHERE email = $1 AND is_active = TRUE"#
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

        let Some(user) = user else {
            LOGINS_COUNTER.with_label_values(&[&tenant.slug, "failed"]).inc();
            return Err(invalid);
        };

        let valid = bcrypt::verify(password, &user.password_hash).unwrap_or(false);
        if !valid {
            LOGINS_COUNTER.with_label_values(&[&tenant.slug, "failed"]).inc();
            return Err(invalid);
        }

        let role: UserRole = user.role.parse()?;
        let access_token =
            Self::generate_access_token(user.id, role, &tenant.slug, jwt_secret, access_ttl)?;
        LOGINS_COUNTER.with_label_values(&[&tenant.slug, "success"]).inc();

        Ok(LoginResponse {
            access_token,
            user: user.into(),
            tenant_name: tenant.name.clone(),
        })
    }

    pub fn generate_access_token(
        user_id: Uuid,
        role: UserRole,
        tenant: &str,
        secret: &str,
        ttl_seconds: u64,
    ) -> anyhow::Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            tenant: tenant.to_string(),
            role,
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub async fn me(pool: &PgPool, tenant: &str, user_id: Uuid) -> Result<UserProfile, AppError> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "{schema}".users WHERE id = $1 AND is_active = TRUE"#
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .map(UserProfile::from)
        .ok_or(AppError::NotFound("User"))
    }

    pub async fn list_users(pool: &PgPool, tenant: &str) -> Result<Vec<User>, AppError> {
        let schema = schema_name(tenant);
        let users = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "{schema}".users ORDER BY name"#
        ))
        .fetch_all(pool)
        .await?;
        Ok(users)
    }

    pub async fn create_user(
        pool: &PgPool,
        tenant: &str,
        req: &CreateUserRequest,
    ) -> Result<User, AppError> {
        let email = normalize_email(&req.email)?;
        let name = required_text(&req.name, "Name", 255)?;
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let password = req.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, 12))
            .await
            .map_err(anyhow::Error::from)?
            .map_err(anyhow::Error::from)?;

        let schema = schema_name(tenant);
        sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO "{schema}".users (email, password_hash, name, role)
               VALUES ($1, $2, $3, $4)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(&email)
        .bind(&password_hash)
        .bind(&name)
        .bind(req.role.to_string())
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, None) {
                AppError::Conflict("A user with this email already exists".into())
            } else {
                e.into()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_access_token;

    #[test]
    fn access_token_round_trips_through_the_extractor_decoder() {
        let id = Uuid::new_v4();
        let token =
            AuthService::generate_access_token(id, UserRole::Editor, "acme", "secret", 60).unwrap();
        let user = decode_access_token(&token, "secret").unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.tenant, "acme");
        assert_eq!(user.role, UserRole::Editor);
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token =
            AuthService::generate_access_token(Uuid::new_v4(), UserRole::Admin, "acme", "a", 60)
                .unwrap();
        assert!(decode_access_token(&token, "b").is_err());
    }
}
