use bazaar_core::Principal;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Session claims issued by the user service: `{ sub, username, email, isAdmin, exp }`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub email: String,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    pub exp: usize,
}

impl Claims {
    pub fn for_principal(principal: &Principal, ttl: Duration) -> Self {
        Self {
            sub: principal.id.to_string(),
            username: principal.username.clone(),
            email: principal.email.clone(),
            is_admin: principal.is_admin,
            exp: (Utc::now() + ttl).timestamp().max(0) as usize,
        }
    }

    pub fn into_principal(self) -> Result<Principal, AppError> {
        let id = Uuid::parse_str(&self.sub).map_err(|_| {
            AppError::AuthenticationError("Not authorized, token failed".to_string())
        })?;

        let principal = Principal::new(id, self.username, self.email);
        Ok(if self.is_admin { principal.admin() } else { principal })
    }
}

pub fn issue_token(secret: &str, principal: &Principal, ttl: Duration) -> Result<String, AppError> {
    let claims = Claims::for_principal(principal, ttl);
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AppError::AuthenticationError("Not authorized, token failed".to_string())
    })
}
