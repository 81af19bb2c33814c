use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AuthError, Result};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub uid: i64,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Signs and verifies session tokens. Expiry is judged against the stored
/// session row, so `exp` is carried but not enforced here.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, session_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            session_ttl,
        }
    }

    /// Returns the signed token and its expiry, truncated to whole seconds.
    pub fn issue(&self, user_id: i64, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>)> {
        let exp = (now + self.session_ttl).timestamp();
        let claims = Claims {
            uid: user_id,
            exp,
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign session token: {}", e)))?;

        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Session expiry out of range")))?;

        Ok((token, expires_at))
    }

    pub fn verify(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::Malformed)
    }
}
