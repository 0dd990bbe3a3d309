use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use eco_core::{auth, metrics};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Pool, Sqlite};
use uuid::Uuid;

use crate::{ApiError, ApiResult, AppState};

const AUTHENTICATE_BEARER_CHALLENGE: &str = r#"Bearer realm="eco-api""#;

pub(crate) const ROLE_STUDENT: &str = "student";
pub(crate) const ROLE_ADMIN: &str = "admin";
pub(crate) const ROLES: [&str; 4] = [ROLE_STUDENT, "ngo", ROLE_ADMIN, "mess_staff"];

#[derive(Debug, Clone, FromRow)]
pub(crate) struct UserRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub volunteer_points: i64,
    pub avatar_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// User projection with the credential hash stripped.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct PublicUser {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub volunteer_points: i64,
    pub avatar_url: Option<String>,
    pub created_at: i64,
}

impl From<UserRow> for PublicUser {
    fn from(row: UserRow) -> Self {
        PublicUser {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            role: row.role,
            volunteer_points: row.volunteer_points,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub(crate) struct AuthContext {
    pub user_id: String,
    pub role: String,
}

#[derive(Deserialize)]
pub(crate) struct RegisterRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

pub(crate) async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let full_name = required_field(payload.full_name, "full_name")?;
    let email = required_field(payload.email, "email")?;
    let password = payload
        .password
        .filter(|value| !value.is_empty())
        .ok_or_else(|| validation_error("all fields are required", "password"))?;
    let role = required_field(payload.role, "role")?;

    if !email_is_valid(&email) {
        return Err(validation_error("invalid email format", "email"));
    }
    if !password_is_valid(&password) {
        return Err(validation_error(
            "password must be at least 6 characters and contain a number",
            "password",
        ));
    }
    if !ROLES.contains(&role.as_str()) {
        return Err(validation_error("unknown role", "role"));
    }

    let existing = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?;
    if existing.is_some() {
        return Err(validation_error("email already in use", "email"));
    }

    let password_hash = auth::hash_password(&password).map_err(internal_error)?;
    let user_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO users (id, full_name, email, password_hash, role) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&user_id)
    .bind(&full_name)
    .bind(&email)
    .bind(&password_hash)
    .bind(&role)
    .execute(&state.pool)
    .await?;

    let user = load_user(&state.pool, &user_id)
        .await?
        .ok_or_else(|| internal_error(anyhow::anyhow!("registered user missing")))?;
    let (token, _claims) =
        auth::issue_token(&user_id, &state.jwt_config).map_err(internal_error)?;
    metrics::inc_auth_success(crate::SERVICE_NAME);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = required_field(payload.email, "email")?;
    let password = payload
        .password
        .filter(|value| !value.is_empty())
        .ok_or_else(|| validation_error("all fields are required", "password"))?;

    if !email_is_valid(&email) {
        return Err(validation_error("invalid email format", "email"));
    }

    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?;

    let Some(user) = user else {
        metrics::inc_auth_failure(crate::SERVICE_NAME);
        return Err(invalid_credentials());
    };

    let verified = auth::verify_password(&password, &user.password_hash).map_err(internal_error)?;
    if !verified {
        metrics::inc_auth_failure(crate::SERVICE_NAME);
        return Err(invalid_credentials());
    }

    let (token, _claims) = auth::issue_token(&user.id, &state.jwt_config).map_err(internal_error)?;
    metrics::inc_auth_success(crate::SERVICE_NAME);

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

pub(crate) async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<PublicUser>> {
    let actor = require_auth(&state, &headers).await?;
    let user = load_user(&state.pool, &actor.user_id)
        .await?
        .ok_or_else(|| auth_required_error("unknown user"))?;
    Ok(Json(user.into()))
}

/// Resolves the bearer token to an authenticated actor. Every protected
/// handler calls this first and trusts the returned context.
pub(crate) async fn require_auth(state: &AppState, headers: &HeaderMap) -> ApiResult<AuthContext> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| auth_required_error("missing token"))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| auth_required_error("invalid token"))?;
    let claims = auth::verify_token(token, &state.jwt_config)
        .map_err(|err| auth_required_error(err.to_string()))?;

    let user = load_user(&state.pool, &claims.sub).await?;
    let Some(user) = user else {
        return Err(auth_required_error("unknown user"));
    };

    Ok(AuthContext {
        user_id: user.id,
        role: user.role,
    })
}

pub(crate) async fn load_user(pool: &Pool<Sqlite>, user_id: &str) -> ApiResult<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

fn auth_required_error(message: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message).with_header(
        "WWW-Authenticate",
        AUTHENTICATE_BEARER_CHALLENGE.to_string(),
    )
}

fn invalid_credentials() -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "AUTH_FAILED", "invalid credentials")
}

fn internal_error(err: anyhow::Error) -> ApiError {
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", err.to_string())
}

fn validation_error(message: &str, field: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
        .with_details(serde_json::json!({ "field": field }))
}

fn required_field(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| validation_error("all fields are required", field))
}

fn email_is_valid(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.contains(char::is_whitespace) || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    if host.is_empty() || host.contains(char::is_whitespace) {
        return false;
    }
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

fn password_is_valid(password: &str) -> bool {
    password.len() >= 6 && password.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_accepts_common_shapes() {
        assert!(email_is_valid("user@example.com"));
        assert!(email_is_valid("first.last@sub.example.org"));
    }

    #[test]
    fn email_validation_rejects_malformed_input() {
        assert!(!email_is_valid("no-at-sign"));
        assert!(!email_is_valid("@example.com"));
        assert!(!email_is_valid("user@nodot"));
        assert!(!email_is_valid("user@example.c"));
        assert!(!email_is_valid("user@example.c0m"));
        assert!(!email_is_valid("spaced user@example.com"));
    }

    #[test]
    fn password_rule_requires_length_and_digit() {
        assert!(password_is_valid("secret1"));
        assert!(password_is_valid("123456"));
        assert!(!password_is_valid("sh0rt"));
        assert!(!password_is_valid("longenoughbutnodigit"));
    }
}
