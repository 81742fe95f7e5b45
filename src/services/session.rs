//! Session management: JWT access tokens and rotating refresh tokens

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id as string
    pub exp: i64,    // expiry timestamp
    pub iat: i64,    // issued at
}

#[derive(Debug)]
pub enum SessionError {
    InvalidToken,
    Expired,
    DatabaseError(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidToken => write!(f, "Invalid token"),
            SessionError::Expired => write!(f, "Token expired"),
            SessionError::DatabaseError(e) => write!(f, "Database error: {}", e),
        }
    }
}

const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 10;
const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 30;

/// Create a JWT access token valid for 10 minutes
pub fn create_access_token(user_id: i64, secret: &[u8]) -> Result<String, SessionError> {
    let now = Utc::now();
    let exp = now + Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES);

    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|_| SessionError::InvalidToken)
}

/// Validate a JWT access token and return the user_id
pub fn validate_access_token(token: &str, secret: &[u8]) -> Result<i64, SessionError> {
    // Pin the algorithm to HS256 to prevent algorithm confusion attacks
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub", "iat"]);

    let token_data =
        decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::InvalidToken,
            }
        })?;

    token_data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|_| SessionError::InvalidToken)
}

fn random_token() -> String {
    // ThreadRng is not Send, so keep it out of await points
    use rand::Rng;
    let bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Create a random refresh token and store it in the database
pub async fn create_refresh_token(user_id: i64, db: &PgPool) -> Result<String, SessionError> {
    let token = random_token();
    let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(&token)
    .bind(user_id)
    .bind(expires_at)
    .execute(db)
    .await
    .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    Ok(token)
}

/// Rotate a refresh token: validate the old token, delete it, and create a new one.
/// Returns (user_id, new_refresh_token) on success.
/// Each refresh token can only be used once; the delete and insert run in a
/// transaction so a failed insert does not log the user out.
pub async fn rotate_refresh_token(
    old_token: &str,
    db: &PgPool,
) -> Result<(i64, String), SessionError> {
    let now = Utc::now();

    let mut tx = db
        .begin()
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    // DELETE .. RETURNING so concurrent requests racing on the same token
    // succeed at most once
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        DELETE FROM refresh_tokens
        WHERE id = $1 AND expires_at > $2
        RETURNING user_id
        "#,
    )
    .bind(old_token)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    let user_id = row.ok_or(SessionError::InvalidToken)?.0;

    let new_token = random_token();
    let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(&new_token)
    .bind(user_id)
    .bind(expires_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    Ok((user_id, new_token))
}

/// Delete a specific refresh token (logout from one device)
pub async fn revoke_refresh_token(token: &str, db: &PgPool) -> Result<(), SessionError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
        .bind(token)
        .execute(db)
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trip() {
        let secret = b"test-secret";
        let token = create_access_token(42, secret).unwrap();
        let user_id = validate_access_token(&token, secret).unwrap();
        assert_eq!(user_id, 42);
    }

    #[test]
    fn access_token_rejects_wrong_secret() {
        let token = create_access_token(42, b"secret-a").unwrap();
        assert!(matches!(
            validate_access_token(&token, b"secret-b"),
            Err(SessionError::InvalidToken)
        ));
    }

    #[test]
    fn random_tokens_are_distinct() {
        let a = random_token();
        let b = random_token();
        assert_ne!(a, b);
        assert!(a.len() >= 43); // 32 bytes base64url, unpadded
    }
}
