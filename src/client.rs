use crate::auth::{
    AuthStrategy, CredentialManager, DEFAULT_APPROLE_MOUNT, DEFAULT_JWT_MOUNT, DirectToken,
    FederatedToken, RoleCredentials,
};
use crate::clock::{Clock, SystemClock};
use crate::error::VaultError;
use crate::models::KvSecret;
use crate::prompt::Prompter;
use crate::transport::Transport;
use serde_json::{Map, Value};
use std::sync::Arc;

pub struct VaultClientBuilder {
    strategy: Option<AuthStrategy>,
    app_role_mount: String,
    jwt_mount: String,
    clock: Arc<dyn Clock>,
}

impl Default for VaultClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultClientBuilder {
    pub fn new() -> Self {
        Self {
            strategy: None,
            app_role_mount: DEFAULT_APPROLE_MOUNT.to_string(),
            jwt_mount: DEFAULT_JWT_MOUNT.to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.strategy = Some(DirectToken::new(token).into());
        self
    }

    pub fn token_prompt(mut self, token: impl Into<String>, prompter: Arc<dyn Prompter>) -> Self {
        self.strategy = Some(DirectToken::with_prompter(token, prompter).into());
        self
    }

    pub fn app_role(mut self, role_id: impl Into<String>, secret_id: impl Into<String>) -> Self {
        self.strategy = Some(RoleCredentials::new(role_id, secret_id).into());
        self
    }

    pub fn jwt(mut self, mount: &str, role: impl Into<String>, jwt: impl Into<String>) -> Self {
        self.strategy = Some(FederatedToken::new(mount, role, jwt).into());
        self
    }

    pub fn strategy(mut self, strategy: impl Into<AuthStrategy>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// Mount used for AppRole administration.
    pub fn app_role_mount(mut self, mount: impl Into<String>) -> Self {
        self.app_role_mount = mount.into();
        self
    }

    /// Mount used for JWT role administration.
    pub fn jwt_mount(mut self, mount: impl Into<String>) -> Self {
        self.jwt_mount = mount.into();
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fill in the strategy from the process environment unless one was set.
    pub fn from_env(self) -> Self {
        self.from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if self.strategy.is_none() {
            self.strategy = strategy_from_vars(&var);
        }
        if let Some(mount) = var("VAULT_APPROLE_MOUNT") {
            self.app_role_mount = mount;
        }
        if let Some(mount) = var("VAULT_JWT_MOUNT") {
            self.jwt_mount = mount;
        }
        self
    }

    /// Build the client and authenticate once so bad credentials fail here.
    pub async fn build(self, transport: Arc<dyn Transport>) -> Result<VaultClient, VaultError> {
        let strategy = self.strategy.ok_or_else(|| {
            VaultError::Configuration("no authentication method configured".to_string())
        })?;

        let manager = CredentialManager::new(transport, Arc::new(strategy)).with_clock(self.clock);
        manager.acquire().await?;
        tracing::info!(strategy = manager.strategy().kind(), "Connected to Vault");

        Ok(VaultClient {
            manager: Arc::new(manager),
            app_role_mount: self.app_role_mount,
            jwt_mount: self.jwt_mount,
        })
    }
}

/// `VAULT_TOKEN` wins, then an AppRole pair, then a JWT with its role.
fn strategy_from_vars(var: &impl Fn(&str) -> Option<String>) -> Option<AuthStrategy> {
    if let Some(token) = var("VAULT_TOKEN") {
        return Some(DirectToken::new(token).into());
    }
    if let (Some(role_id), Some(secret_id)) = (var("VAULT_ROLE_ID"), var("VAULT_SECRET_ID")) {
        let mount = var("VAULT_APPROLE_MOUNT").unwrap_or_else(|| DEFAULT_APPROLE_MOUNT.to_string());
        return Some(RoleCredentials::new(role_id, secret_id).with_mount(&mount).into());
    }
    if let (Some(jwt), Some(role)) = (var("VAULT_JWT"), var("VAULT_JWT_ROLE")) {
        let mount = var("VAULT_JWT_MOUNT").unwrap_or_else(|| DEFAULT_JWT_MOUNT.to_string());
        return Some(FederatedToken::new(&mount, role, jwt).into());
    }
    None
}

/// Secrets-store client; every call first obtains an authenticated transport.
#[derive(Clone)]
pub struct VaultClient {
    pub(crate) manager: Arc<CredentialManager>,
    pub(crate) app_role_mount: String,
    pub(crate) jwt_mount: String,
}

impl VaultClient {
    pub fn builder() -> VaultClientBuilder {
        VaultClientBuilder::new()
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.manager
    }

    /// Same strategy against another endpoint. Authentication happens on first use.
    pub fn switch_vault(&self, transport: Arc<dyn Transport>) -> VaultClient {
        VaultClient {
            manager: Arc::new(self.manager.with_transport(transport)),
            app_role_mount: self.app_role_mount.clone(),
            jwt_mount: self.jwt_mount.clone(),
        }
    }

    pub async fn load_secret(&self, path: &str) -> Result<Option<KvSecret>, VaultError> {
        let vt = self.manager.acquire().await?;
        let path = kv_path(path, "data");

        let Some(response) = vt.read(&path).await? else {
            return Ok(None);
        };
        KvSecret::from_response(response, &path)
            .map(Some)
            .map_err(|field| VaultError::stale_field(field, &path))
    }

    pub async fn list_secrets(&self, path: &str) -> Result<Vec<String>, VaultError> {
        let vt = self.manager.acquire().await?;
        let path = kv_path(path, "metadata");

        let response = vt
            .list(&path)
            .await?
            .ok_or_else(|| VaultError::NotFound { path: path.clone() })?;
        let keys = response
            .data
            .get("keys")
            .and_then(Value::as_array)
            .ok_or_else(|| VaultError::stale_field("keys", &path))?;

        Ok(keys
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    pub async fn write_secret(&self, path: &str, data: Map<String, Value>) -> Result<(), VaultError> {
        let vt = self.manager.acquire().await?;
        let path = kv_path(path, "data");

        let mut payload = Map::new();
        payload.insert("data".to_string(), Value::Object(data));
        vt.write(&path, payload).await?;
        Ok(())
    }

    /// Removes the secret with all of its versions.
    pub async fn delete_secret(&self, path: &str) -> Result<(), VaultError> {
        let vt = self.manager.acquire().await?;
        vt.delete(&kv_path(path, "metadata")).await?;
        Ok(())
    }

    /// Raw field of a logical path. `None` when nothing exists at `path`.
    pub async fn read_value(&self, path: &str, field: &str) -> Result<Option<Value>, VaultError> {
        let vt = self.manager.acquire().await?;

        let Some(mut response) = vt.read(path).await? else {
            return Ok(None);
        };
        response
            .data
            .remove(field)
            .map(Some)
            .ok_or_else(|| VaultError::stale_field(field, path))
    }
}

/// `mount/rest` → `mount/<segment>/rest` for KV v2.
fn kv_path(path: &str, segment: &str) -> String {
    let path = path.trim_start_matches('/');
    match path.split_once('/') {
        Some((mount, rest)) => format!("{}/{}/{}", mount, segment, rest),
        None => format!("{}/{}", path, segment),
    }
}
