//! vaultclient - Vault client with self-renewing credentials
//!
//! Authentication strategies:
//! 1. Direct token, optionally re-prompted when it turns out invalid
//! 2. AppRole (role-id + secret-id)
//! 3. JWT login with an externally issued identity token
//!
//! Every request goes through [`CredentialManager::acquire`], which hands out a
//! transport whose token is valid and renews it at most once at a time.

pub mod auth;
mod client;
pub mod clock;
mod error;
mod models;
pub mod prompt;
mod roles;
pub mod transport;

pub use auth::{AuthStrategy, CredentialManager};
pub use client::{VaultClient, VaultClientBuilder};
pub use error::{TransportError, VaultError};
pub use models::{JwtBoundClaims, JwtRoleConfig, KvSecret, Policy, SecretAuth, VaultResponse};
pub use transport::{MemoryTransport, Transport};
