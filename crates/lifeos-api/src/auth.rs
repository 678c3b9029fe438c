//! Password hashing, JWT issuance and the authenticated-user extractor.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lifeos_db::SupabaseClient;

use crate::error::ApiError;
use crate::state::AppState;

/// Token lifetime.
const TOKEN_TTL_HOURS: i64 = 24;

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub exp: usize,
}

/// The authenticated caller, extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

/// Registration/login response payload.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
}

/// Auth service: argon2 hashing plus HS256 tokens.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<SupabaseClient>,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(db: Arc<SupabaseClient>, jwt_secret: String) -> Self {
        Self { db, jwt_secret }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::internal(format!("password hashing failed: {}", e)))
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    pub fn create_token(&self, user_id: Uuid, username: &str) -> Result<String, ApiError> {
        let claims = Claims {
            user_id,
            username: username.to_string(),
            exp: (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ApiError::internal(format!("token encoding failed: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))
    }

    /// Register a new account; the username must be unused.
    pub async fn register(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        if self.db.find_user_by_username(username).await?.is_some() {
            return Err(ApiError::bad_request("Username already exists"));
        }

        let password_hash = self.hash_password(password)?;
        let user = self.db.insert_user(username, &password_hash).await?;
        let token = self.create_token(user.id, &user.username)?;

        Ok(AuthResponse {
            token,
            user: PublicUser {
                id: user.id,
                username: user.username,
            },
        })
    }

    /// Verify credentials and issue a token. The same message covers an
    /// unknown username and a wrong password.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let user = self
            .db
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

        let hash = user
            .password_hash
            .as_deref()
            .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
        if !self.verify_password(password, hash) {
            return Err(ApiError::unauthorized("Invalid credentials"));
        }

        let token = self.create_token(user.id, &user.username)?;
        Ok(AuthResponse {
            token,
            user: PublicUser {
                id: user.id,
                username: user.username,
            },
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Expected bearer token"))?;

        let claims = state.auth.verify_token(token)?;
        Ok(CurrentUser {
            id: claims.user_id,
            username: claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeos_db::{RetryConfig, SupabaseConfig};

    fn service() -> AuthService {
        let db = SupabaseClient::new(SupabaseConfig {
            url: "http://127.0.0.1:9".to_string(),
            api_key: "unused".to_string(),
            timeout: std::time::Duration::from_secs(1),
            retry: RetryConfig::default(),
        })
        .unwrap();
        AuthService::new(Arc::new(db), "test-secret".to_string())
    }

    #[test]
    fn password_hash_round_trip() {
        let auth = service();
        let hash = auth.hash_password("hunter2").unwrap();
        assert!(auth.verify_password("hunter2", &hash));
        assert!(!auth.verify_password("hunter3", &hash));
    }

    #[test]
    fn token_round_trip_preserves_claims() {
        let auth = service();
        let user_id = Uuid::new_v4();
        let token = auth.create_token(user_id, "alice").unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > Utc::now().timestamp() as usize);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = service();
        let token = auth.create_token(Uuid::new_v4(), "alice").unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(auth.verify_token(&tampered).is_err());
    }
}
