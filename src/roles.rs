//! Administrative calls: AppRole issuance, JWT roles and policies.

use crate::client::VaultClient;
use crate::error::VaultError;
use crate::models::{JwtBoundClaims, JwtRoleConfig, Policy, VaultResponse};
use serde_json::{Map, Value};

fn string_field(response: Option<VaultResponse>, field: &str, path: &str) -> Result<String, VaultError> {
    response
        .as_ref()
        .and_then(|r| r.data.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| VaultError::stale_field(field, path))
}

impl VaultClient {
    /// Create (or overwrite) an AppRole and issue its first credentials.
    ///
    /// Returns `(role_id, secret_id)`. The steps are not transactional: when
    /// minting the secret-id fails the role stays configured and
    /// [`create_secret_id`](Self::create_secret_id) can be retried on its own.
    pub async fn create_app_role(
        &self,
        role_name: &str,
        ttl: &str,
        max_ttl: &str,
        policies: &[&str],
    ) -> Result<(String, String), VaultError> {
        let vt = self.manager.acquire().await?;

        let path = format!("{}/role/{}", self.app_role_mount, role_name);
        let mut args = Map::new();
        args.insert("token_ttl".to_string(), Value::from(ttl));
        args.insert("token_max_ttl".to_string(), Value::from(max_ttl));
        args.insert("policies".to_string(), Value::from(policies.join(",")));
        vt.write(&path, args).await?;
        tracing::info!(role = %role_name, "AppRole configured");

        let role_id = self.request_role_id(role_name).await?;
        let secret_id = self.create_secret_id(role_name).await?;
        Ok((role_id, secret_id))
    }

    pub async fn request_role_id(&self, role_name: &str) -> Result<String, VaultError> {
        let vt = self.manager.acquire().await?;
        let path = format!("{}/role/{}/role-id", self.app_role_mount, role_name);

        let response = vt.read(&path).await?;
        string_field(response, "role_id", &path)
    }

    pub async fn create_secret_id(&self, role_name: &str) -> Result<String, VaultError> {
        let vt = self.manager.acquire().await?;
        let path = format!("{}/role/{}/secret-id", self.app_role_mount, role_name);

        let response = vt.write(&path, Map::new()).await?;
        string_field(response, "secret_id", &path)
    }

    pub async fn write_jwt_role(&self, role_name: &str, config: &JwtRoleConfig) -> Result<(), VaultError> {
        let vt = self.manager.acquire().await?;
        let path = format!("{}/role/{}", self.jwt_mount, role_name);

        let args = match serde_json::to_value(config)? {
            Value::Object(args) => args,
            _ => Map::new(),
        };
        vt.write(&path, args).await?;
        Ok(())
    }

    /// Bound claims of a JWT role; a missing role reads as empty claims.
    pub async fn read_jwt_role_claims(&self, role_name: &str) -> Result<JwtBoundClaims, VaultError> {
        let path = format!("{}/role/{}", self.jwt_mount, role_name);
        match self.read_value(&path, "bound_claims").await? {
            Some(claims) => Ok(serde_json::from_value(claims)?),
            None => Ok(JwtBoundClaims::default()),
        }
    }

    pub async fn list_policies(&self) -> Result<Vec<Policy>, VaultError> {
        let vt = self.manager.acquire().await?;

        let response = vt.read("sys/policy").await?;
        let names: Vec<String> = response
            .as_ref()
            .and_then(|r| r.data.get("policies"))
            .and_then(Value::as_array)
            .ok_or_else(|| VaultError::stale_field("policies", "sys/policy"))?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        let mut policies = Vec::with_capacity(names.len());
        for name in names {
            let path = format!("sys/policy/{}", name);
            let rules = string_field(vt.read(&path).await?, "rules", &path)?;
            policies.push(Policy { name, rules });
        }
        Ok(policies)
    }
}
