mod memory;

pub use memory::{MemoryTransport, Operation, RecordedRequest};

use crate::error::TransportError;
use crate::models::{SecretAuth, VaultResponse};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub const LOOKUP_SELF_PATH: &str = "auth/token/lookup-self";

/// Connection to a single secrets-store endpoint.
///
/// The bearer token lives on the transport and is attached to every request.
/// Implementations are shared behind `Arc`, so the token uses interior
/// mutability; only the credential manager is expected to change it.
#[async_trait]
pub trait Transport: Send + Sync {
    fn token(&self) -> String;

    fn set_token(&self, token: &str);

    /// `auth/token/lookup-self` for the current token. `data.ttl` carries the
    /// remaining lifetime in seconds.
    async fn lookup_self(&self) -> Result<VaultResponse, TransportError>;

    /// Logical read. `Ok(None)` when nothing exists at `path`.
    async fn read(&self, path: &str) -> Result<Option<VaultResponse>, TransportError>;

    async fn write(
        &self,
        path: &str,
        body: Map<String, Value>,
    ) -> Result<Option<VaultResponse>, TransportError>;

    async fn list(&self, path: &str) -> Result<Option<VaultResponse>, TransportError>;

    async fn delete(&self, path: &str) -> Result<(), TransportError>;

    /// Write-style login; yields the `auth` block of the response when present.
    async fn login(
        &self,
        path: &str,
        body: Map<String, Value>,
    ) -> Result<Option<SecretAuth>, TransportError> {
        Ok(self.write(path, body).await?.and_then(|response| response.auth))
    }
}
