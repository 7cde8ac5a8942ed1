use super::login;
use crate::VaultError;
use crate::models::SecretAuth;
use crate::transport::Transport;
use serde_json::{Map, Value};

pub const DEFAULT_APPROLE_MOUNT: &str = "auth/approle";

/// AppRole login with a role-id / secret-id pair.
pub struct RoleCredentials {
    role_id: String,
    secret_id: String,
    login_path: String,
}

impl RoleCredentials {
    pub fn new(role_id: impl Into<String>, secret_id: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
            secret_id: secret_id.into(),
            login_path: format!("{}/login", DEFAULT_APPROLE_MOUNT),
        }
    }

    pub fn with_mount(mut self, mount: &str) -> Self {
        self.login_path = format!("{}/login", mount.trim_end_matches('/'));
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub(crate) async fn authenticate(&self, transport: &dyn Transport) -> Result<SecretAuth, VaultError> {
        let mut body = Map::new();
        body.insert("role_id".to_string(), Value::String(self.role_id.clone()));
        body.insert("secret_id".to_string(), Value::String(self.secret_id.clone()));

        login(transport, &self.login_path, body).await
    }
}
