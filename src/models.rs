use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Generic response envelope returned by the store for logical requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub auth: Option<SecretAuth>,
}

impl VaultResponse {
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn with_auth(auth: SecretAuth) -> Self {
        Self {
            auth: Some(auth),
            ..Self::default()
        }
    }
}

/// Authentication block of a login response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretAuth {
    pub client_token: String,
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub policies: Vec<String>,
}

impl SecretAuth {
    pub fn new(client_token: impl Into<String>, lease_duration: u64) -> Self {
        Self {
            client_token: client_token.into(),
            lease_duration,
            ..Self::default()
        }
    }
}

/// KV v2 secret: the stored key/value pairs plus version metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct KvSecret {
    pub data: Map<String, Value>,
    pub metadata: Map<String, Value>,
}

impl KvSecret {
    /// Split a KV v2 read into its blocks. The error names the missing block.
    pub(crate) fn from_response(mut response: VaultResponse, path: &str) -> Result<Self, &'static str> {
        let Some(Value::Object(data)) = response.data.remove("data") else {
            return Err("data");
        };
        let Some(Value::Object(metadata)) = response.data.remove("metadata") else {
            tracing::debug!(path = %path, "KV response without metadata block");
            return Err("metadata");
        };
        Ok(Self { data, metadata })
    }

    /// String value stored under `key`.
    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Resolve a key by unique prefix. Ambiguous or absent prefixes yield `None`.
    pub fn get_item_fuzzy(&self, prefix: &str) -> Option<(&str, &str)> {
        let mut candidates = self.data.keys().filter(|k| k.starts_with(prefix));
        let key = candidates.next()?;
        if candidates.next().is_some() {
            return None;
        }
        self.get_item(key).map(|value| (key.as_str(), value))
    }

    pub fn version(&self) -> Option<u64> {
        self.metadata.get("version").and_then(Value::as_u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub rules: String,
}

/// Role configuration for the JWT auth backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtRoleConfig {
    pub role_type: String,
    pub policies: Vec<String>,
    pub token_ttl: String,
    pub token_explicit_max_ttl: String,
    pub user_claim: String,
    pub bound_claims: JwtBoundClaims,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtBoundClaims {
    #[serde(default)]
    pub user_email: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_id: Vec<String>,
    #[serde(default)]
    pub ref_protected: String,
    #[serde(default)]
    pub ref_type: String,
    #[serde(default, rename = "ref")]
    pub refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kv(data: Value) -> KvSecret {
        KvSecret {
            data: data.as_object().cloned().unwrap(),
            metadata: json!({"version": 3}).as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_login_response_deserialize() {
        let raw = r#"{
            "request_id": "abc",
            "lease_duration": 0,
            "data": null,
            "auth": {
                "client_token": "s.abc",
                "accessor": "acc",
                "policies": ["default", "deploy"],
                "lease_duration": 3600,
                "renewable": true
            }
        }"#;
        let response: VaultResponse = serde_json::from_str(raw).unwrap();
        assert!(response.data.is_empty());
        let auth = response.auth.unwrap();
        assert_eq!(auth.client_token, "s.abc");
        assert_eq!(auth.lease_duration, 3600);
        assert_eq!(auth.policies, vec!["default", "deploy"]);
    }

    #[test]
    fn test_kv_secret_requires_data_and_metadata() {
        let full = VaultResponse::with_data(
            json!({"data": {"user": "admin"}, "metadata": {"version": 1}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let secret = KvSecret::from_response(full, "secret/data/app").unwrap();
        assert_eq!(secret.get_item("user"), Some("admin"));
        assert_eq!(secret.version(), Some(1));

        let no_meta = VaultResponse::with_data(
            json!({"data": {"user": "admin"}}).as_object().cloned().unwrap(),
        );
        assert_eq!(
            KvSecret::from_response(no_meta, "secret/data/app").unwrap_err(),
            "metadata"
        );

        let no_data = VaultResponse::with_data(
            json!({"metadata": {"version": 1}}).as_object().cloned().unwrap(),
        );
        assert_eq!(
            KvSecret::from_response(no_data, "secret/data/app").unwrap_err(),
            "data"
        );
    }

    #[test]
    fn test_get_item_ignores_non_string_values() {
        let secret = kv(json!({"port": 5432, "host": "db"}));
        assert_eq!(secret.get_item("host"), Some("db"));
        assert_eq!(secret.get_item("port"), None);
        assert_eq!(secret.version(), Some(3));
    }

    #[test]
    fn test_get_item_fuzzy_unique_prefix() {
        let secret = kv(json!({"password": "p4ss", "port": "5432", "username": "admin"}));
        assert_eq!(secret.get_item_fuzzy("pa"), Some(("password", "p4ss")));
        assert_eq!(secret.get_item_fuzzy("u"), Some(("username", "admin")));
        assert_eq!(secret.get_item_fuzzy("p"), None);
        assert_eq!(secret.get_item_fuzzy("x"), None);
    }

    #[test]
    fn test_bound_claims_field_names() {
        let claims = JwtBoundClaims {
            user_email: vec!["dev@example.com".into()],
            refs: vec!["main".into()],
            ref_type: "branch".into(),
            ref_protected: "true".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["ref"], json!(["main"]));
        assert!(value.get("user_id").is_none());
        assert!(value.get("namespace_id").is_none());

        let back: JwtBoundClaims = serde_json::from_value(value).unwrap();
        assert_eq!(back, claims);
    }
}
