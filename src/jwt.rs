use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::session::CredentialKind;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if secret.is_empty() {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;
        if exp_hours <= 0 {
            return Err(AppError::configuration("JWT_EXP_HOURS must be positive"));
        }

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_hours,
        })
    }

    pub fn max_age_seconds(&self) -> i64 {
        self.exp_hours * 3600
    }

    pub fn encode(&self, kind: CredentialKind, subject: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: subject,
            kind,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    /// Decodes a credential and checks it was issued for `expected`.
    pub fn decode(&self, expected: CredentialKind, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))?;

        if claims.kind != expected {
            return Err(AppError::token(format!(
                "expected a {} credential",
                expected.as_str()
            )));
        }
        Ok(claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub kind: CredentialKind,
    pub exp: usize,
    pub iat: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: Arc::new(b"unit-test-secret".to_vec()),
            exp_hours: 1,
        }
    }

    #[test]
    fn credential_kinds_do_not_cross() {
        let config = config();
        let subject = Uuid::new_v4();
        let client_token = config.encode(CredentialKind::Client, subject).unwrap();

        assert!(config.decode(CredentialKind::Staff, &client_token).is_err());
        assert_eq!(config.decode(CredentialKind::Client, &client_token).unwrap().sub, subject);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = config().encode(CredentialKind::Staff, Uuid::new_v4()).unwrap();
        let other = JwtConfig {
            secret: Arc::new(b"another-secret".to_vec()),
            exp_hours: 1,
        };
        assert!(matches!(other.decode(CredentialKind::Staff, &token), Err(AppError::Token(_))));
    }
}
