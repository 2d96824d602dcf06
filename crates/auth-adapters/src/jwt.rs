//! HS256 JWT provider.

use chrono::{Duration, Utc};
use domains::{Actor, AuthProvider, DomainError, Result, Role};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: Role,
    iat: i64,
    exp: i64,
}

pub struct JwtAuthProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtAuthProvider {
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            ttl,
        }
    }
}

impl AuthProvider for JwtAuthProvider {
    fn verify_token(&self, token: &str) -> Result<Actor> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            DomainError::Unauthorized("invalid or expired token".into())
        })?;
        Ok(Actor {
            user_id: data.claims.sub,
            role: data.claims.role,
        })
    }

    fn issue_token(&self, actor: &Actor) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: actor.user_id,
            role: actor.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| DomainError::Internal(format!("token signing failed: {e}")))
    }
}
