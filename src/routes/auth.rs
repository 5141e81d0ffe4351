use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::operator;
use crate::models::Operator;
use crate::state::AppState;

// ─── JWT Claims ───

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,        // operator id
    pub username: String,
    pub exp: usize,
}

// ─── Request/Response types ───

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
}

// ─── Routes ───

/// POST /api/login — exchange operator credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let username = req.username.trim().to_lowercase();

    if !state.auth_rate_limiter.check(&username) {
        tracing::warn!("Too many login attempts for {username}");
        return Err((StatusCode::TOO_MANY_REQUESTS, "Too many login attempts".into()));
    }

    let op: Operator = operator::Entity::find()
        .filter(operator::Column::Username.eq(&username))
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::UNAUTHORIZED, "Invalid username or password".into()))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&op.password_hash)
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Hash parse error".into()))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid username or password".to_string()))?;

    let token = create_jwt(&state.jwt_secret, &op.id, &op.username)?;
    tracing::info!("Operator {} logged in", op.username);

    Ok(Json(AuthResponse {
        token,
        username: op.username,
    }))
}

// ─── Operator accounts ───

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Insert a new operator and return its id.
pub async fn create_operator(db: &DatabaseConnection, username: &str, password: &str) -> anyhow::Result<String> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!("Hash error: {e}"))?;
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

    operator::ActiveModel {
        id: Set(id.clone()),
        username: Set(username.to_lowercase()),
        password_hash: Set(password_hash),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    Ok(id)
}

// ─── JWT helpers ───

pub fn create_jwt(
    secret: &str,
    operator_id: &str,
    username: &str,
) -> Result<String, (StatusCode, String)> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::days(30))
        .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Clock overflow".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: operator_id.to_string(),
        username: username.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("JWT error: {e}")))
}

pub fn extract_claims(secret: &str, headers: &HeaderMap) -> Result<Claims, (StatusCode, String)> {
    let auth = headers.get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or((StatusCode::UNAUTHORIZED, "Missing Authorization header".into()))?;

    let token = auth.strip_prefix("Bearer ")
        .ok_or((StatusCode::UNAUTHORIZED, "Invalid Authorization format".into()))?;

    decode_jwt(secret, token)
}

pub fn decode_jwt(secret: &str, token: &str) -> Result<Claims, (StatusCode, String)> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| (StatusCode::UNAUTHORIZED, format!("Invalid token: {e}")))?;

    Ok(data.claims)
}
