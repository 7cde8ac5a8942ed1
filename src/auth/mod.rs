mod approle;
mod jwt;
mod manager;
mod token;
mod token_info;

pub use approle::{DEFAULT_APPROLE_MOUNT, RoleCredentials};
pub use jwt::{DEFAULT_JWT_MOUNT, FederatedToken};
pub use manager::CredentialManager;
pub use token::{DirectToken, MAX_TOKEN_ATTEMPTS};
pub use token_info::{CachedToken, EXPIRY_SAFETY_MARGIN_SECS, Expiry};

use crate::VaultError;
use crate::models::SecretAuth;
use crate::transport::Transport;
use serde_json::{Map, Value};

/// The ways a client can obtain a token.
pub enum AuthStrategy {
    DirectToken(DirectToken),
    RoleCredentials(RoleCredentials),
    FederatedToken(FederatedToken),
}

impl AuthStrategy {
    /// Produce a fresh token and its lease for `transport`.
    pub async fn authenticate(&self, transport: &dyn Transport) -> Result<SecretAuth, VaultError> {
        match self {
            Self::DirectToken(strategy) => strategy.authenticate(transport).await,
            Self::RoleCredentials(strategy) => strategy.authenticate(transport).await,
            Self::FederatedToken(strategy) => strategy.authenticate(transport).await,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectToken(_) => "token",
            Self::RoleCredentials(_) => "approle",
            Self::FederatedToken(_) => "jwt",
        }
    }
}

impl From<DirectToken> for AuthStrategy {
    fn from(strategy: DirectToken) -> Self {
        Self::DirectToken(strategy)
    }
}

impl From<RoleCredentials> for AuthStrategy {
    fn from(strategy: RoleCredentials) -> Self {
        Self::RoleCredentials(strategy)
    }
}

impl From<FederatedToken> for AuthStrategy {
    fn from(strategy: FederatedToken) -> Self {
        Self::FederatedToken(strategy)
    }
}

/// Single-shot login shared by the programmatic strategies.
async fn login(
    transport: &dyn Transport,
    path: &str,
    body: Map<String, Value>,
) -> Result<SecretAuth, VaultError> {
    transport
        .login(path, body)
        .await
        .map_err(VaultError::AuthenticationFailed)?
        .ok_or_else(|| VaultError::stale_field("auth", path))
}
