use axum::http::{HeaderMap, header};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use fitlink_types::api::{Claims, Role};

use crate::error::AuthError;

/// Who is on the other end of an authenticated connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

/// Decodes a handshake credential into an identity.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// HS256 JWTs signed with a shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Mint a token for `user_id`, valid for `ttl`.
    pub fn issue(&self, user_id: Uuid, role: Role, ttl: chrono::Duration) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            role,
            exp: (chrono::Utc::now() + ttl).timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(Identity {
            user_id: data.claims.sub,
            role: data.claims.role,
        })
    }
}

/// Token from an `Authorization: Bearer <token>` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Handshake check. Runs before the socket is upgraded, so a failure means
/// no event handler ever exists for this connection.
pub fn authenticate(verifier: &dyn TokenVerifier, token: Option<&str>) -> Result<Identity, AuthError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;
    verifier.verify(token)
}
