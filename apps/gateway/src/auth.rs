use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// The identity resolved from a verified bearer token, attached to the
/// session for its whole lifetime. Verification runs once at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub uid: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub uid: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub algorithm: Algorithm,
    pub decoding: DecodingKey,
}

impl JwtConfig {
    /// RS256 when a public key PEM is configured, HS256 from `JWT_SECRET`
    /// otherwise.
    pub fn from_env() -> anyhow::Result<Self> {
        let public_key_pem = std::env::var("JWT_PUBLIC_KEY_PEM").unwrap_or_default();
        if !public_key_pem.is_empty() {
            return Ok(Self {
                algorithm: Algorithm::RS256,
                decoding: DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?,
            });
        }

        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());
        Ok(Self::hs256(&secret))
    }

    pub fn hs256(secret: &str) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, GatewayError> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &self.decoding,
            &Validation::new(self.algorithm),
        )
        .map_err(|_| GatewayError::Unauthorized)?;

        let id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| GatewayError::Unauthorized)?;

        Ok(Identity {
            id,
            uid: data.claims.uid,
        })
    }
}

/// Extracts the bearer credential from the handshake: the `Authorization`
/// header when present, otherwise a `token` query parameter (browser
/// WebSocket clients cannot set headers).
pub fn bearer_token<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .or(query_token)
}
