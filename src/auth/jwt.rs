use super::login;
use crate::VaultError;
use crate::models::SecretAuth;
use crate::transport::Transport;
use serde_json::{Map, Value};
use std::path::Path;

pub const DEFAULT_JWT_MOUNT: &str = "auth/jwt";

/// Login with an externally issued identity token (CI job token, service account JWT).
pub struct FederatedToken {
    jwt: String,
    role: String,
    login_path: String,
}

impl FederatedToken {
    pub fn new(mount: &str, role: impl Into<String>, jwt: impl Into<String>) -> Self {
        Self {
            jwt: jwt.into(),
            role: role.into(),
            login_path: format!("{}/login", mount.trim_end_matches('/')),
        }
    }

    /// Read the JWT once from a mounted token file.
    pub fn from_jwt_file(
        mount: &str,
        role: impl Into<String>,
        jwt_path: impl AsRef<Path>,
    ) -> Result<Self, VaultError> {
        let jwt_path = jwt_path.as_ref();
        let jwt = std::fs::read_to_string(jwt_path).map_err(|e| {
            VaultError::Configuration(format!(
                "Failed to read JWT from {}: {}",
                jwt_path.display(),
                e
            ))
        })?;
        Ok(Self::new(mount, role, jwt.trim()))
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub(crate) async fn authenticate(&self, transport: &dyn Transport) -> Result<SecretAuth, VaultError> {
        let mut body = Map::new();
        body.insert("jwt".to_string(), Value::String(self.jwt.clone()));
        body.insert("role".to_string(), Value::String(self.role.clone()));

        login(transport, &self.login_path, body).await
    }
}
