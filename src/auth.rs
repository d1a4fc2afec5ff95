//! Bearer-token authentication and the internal-key guard.

use std::sync::Arc;

use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::application::run_blocking;
use crate::domain::auth::Actor;
use crate::domain::errors::DomainError;
use crate::domain::ports::UserRepository;

pub const INTERNAL_KEY_HEADER: &str = "X-Internal-Key";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Profile id.
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

pub struct Authenticator {
    decoding_key: DecodingKey,
    validation: Validation,
    users: Arc<dyn UserRepository>,
}

impl Authenticator {
    pub fn new(secret: &str, audience: Option<&str>, users: Arc<dyn UserRepository>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            users,
        }
    }

    /// Resolves the caller from the `Authorization: Bearer` header and the
    /// role stored on their profile.
    pub async fn authenticate(&self, req: &HttpRequest) -> Result<Actor, DomainError> {
        let header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthenticated("Missing authorization header"))?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| unauthenticated("Invalid authorization header"))?;

        let claims = self.verify(token)?;
        let user_id =
            Uuid::parse_str(&claims.sub).map_err(|_| unauthenticated("Invalid token subject"))?;

        let users = self.users.clone();
        let profile = run_blocking(move || users.find_by_id(user_id))
            .await?
            .ok_or_else(|| unauthenticated("Unknown user"))?;

        Ok(Actor {
            user_id: profile.id,
            role: profile.role,
        })
    }

    fn verify(&self, token: &str) -> Result<Claims, DomainError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => unauthenticated("Token expired"),
                _ => {
                    log::debug!("Rejected bearer token: {e}");
                    unauthenticated("Invalid token")
                }
            })
    }
}

/// Internal endpoints are open when no key is configured.
pub fn check_internal_key(req: &HttpRequest, expected: Option<&str>) -> Result<(), DomainError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = req
        .headers()
        .get(INTERNAL_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    match provided {
        Some(key) if keys_match(key, expected) => Ok(()),
        _ => Err(unauthenticated("Invalid internal key")),
    }
}

// Both keys tag the same label; `verify_slice` compares the tags in constant time.
fn keys_match(provided: &str, expected: &str) -> bool {
    let tag = |key: &str| {
        Hmac::<Sha256>::new_from_slice(key.as_bytes())
            .map(|mac| mac.chain_update(INTERNAL_KEY_HEADER))
    };
    match (tag(provided), tag(expected)) {
        (Ok(provided), Ok(expected)) => provided
            .verify_slice(&expected.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

fn unauthenticated(msg: &str) -> DomainError {
    DomainError::Unauthenticated(msg.to_string())
}

#[cfg(test)]
pub(crate) fn create_token(
    secret: &str,
    user_id: Uuid,
    audience: Option<&str>,
    ttl_secs: i64,
) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: user_id.to_string(),
        exp: chrono::Utc::now().timestamp() + ttl_secs,
        aud: audience.map(str::to_string),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
