/*!
 * Authentication and authorization for the cakeshop API.
 *
 * JWT (HS256) bearer tokens carry the user id and role; passwords are
 * hashed with argon2. Handlers receive the verified identity through the
 * `AuthenticatedUser` and `AdminUser` extractors, so there is no ambient
 * auth context anywhere in the request path.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::AppState;

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// Claim structure for JWT tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Subject (user ID)
    pub role: String, // User's role
    pub jti: String,  // JWT ID (unique identifier for this token)
    pub iat: i64,     // Issued at time
    pub exp: i64,     // Expiration time
    pub iss: String,  // Issuer
    pub aud: String,  // Audience
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Failed to create token: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Missing credentials")]
    MissingCredentials,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::TokenExpired | AuthError::MissingCredentials => {
                ServiceError::AuthError(err.to_string())
            }
            AuthError::TokenCreation(msg) | AuthError::Hash(msg) => ServiceError::HashError(msg),
        }
    }
}

/// Token issuance and validation.
#[derive(Debug, Clone)]
pub struct AuthService {
    jwt_secret: String,
    expiration_secs: u64,
    issuer: String,
    audience: String,
}

impl AuthService {
    pub fn new(jwt_secret: String, expiration_secs: u64, issuer: String, audience: String) -> Self {
        Self {
            jwt_secret,
            expiration_secs,
            issuer,
            audience,
        }
    }

    /// Generates a signed bearer token for the given user.
    pub fn generate_token(&self, user_id: Uuid, role: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + ChronoDuration::seconds(self.expiration_secs as i64);

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validates a bearer token and extracts its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        Ok(claims)
    }
}

/// Hashes a password with argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Verifies a password against a stored argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Verified caller identity, extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: String,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ServiceError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ServiceError::AuthError("Missing bearer token".to_string()))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.services.auth.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::AuthError("Invalid token subject".to_string()))?;

        Ok(AuthenticatedUser {
            user_id,
            role: claims.role,
        })
    }
}

/// Like `AuthenticatedUser` but rejects non-admin callers with 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ServiceError::Forbidden(
                "Admin privileges required".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> AuthService {
        AuthService::new(
            "a_test_secret_that_is_long_enough_for_hs256".to_string(),
            3600,
            "cakeshop-api".to_string(),
            "cakeshop-clients".to_string(),
        )
    }

    #[test]
    fn token_round_trip_preserves_identity() {
        let service = test_service();
        let user_id = Uuid::new_v4();

        let token = service.generate_token(user_id, ROLE_ADMIN).unwrap();
        let claims = service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, ROLE_ADMIN);
        assert_eq!(claims.iss, "cakeshop-api");
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let service = test_service();
        let other = AuthService::new(
            "a_different_secret_also_long_enough_for_hs256".to_string(),
            3600,
            "cakeshop-api".to_string(),
            "cakeshop-clients".to_string(),
        );

        let token = service.generate_token(Uuid::new_v4(), ROLE_USER).unwrap();
        assert!(matches!(
            other.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn token_with_wrong_audience_is_rejected() {
        let service = test_service();
        let other = AuthService::new(
            "a_test_secret_that_is_long_enough_for_hs256".to_string(),
            3600,
            "cakeshop-api".to_string(),
            "someone-else".to_string(),
        );

        let token = service.generate_token(Uuid::new_v4(), ROLE_USER).unwrap();
        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("sweettooth").unwrap();
        assert_ne!(hash, "sweettooth");
        assert!(verify_password("sweettooth", &hash).unwrap());
        assert!(!verify_password("salty", &hash).unwrap());
    }
}
