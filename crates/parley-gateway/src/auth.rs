use async_trait::async_trait;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use parley_types::api::Claims;
use parley_types::models::Identity;

use crate::error::GatewayError;

/// Turns a handshake token into an identity.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<Identity, GatewayError>;
}

/// Verifies HS256 tokens issued by the account endpoints.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify_token(&self, token: &str) -> Result<Identity, GatewayError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            GatewayError::InvalidToken
        })?;

        Ok(Identity::new(data.claims.sub, data.claims.username))
    }
}
