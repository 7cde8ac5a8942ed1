use crate::VaultError;
use crate::models::SecretAuth;
use crate::prompt::Prompter;
use crate::transport::{LOOKUP_SELF_PATH, Transport};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Lookups allowed before giving up on a direct token.
pub const MAX_TOKEN_ATTEMPTS: u32 = 3;

/// Pre-supplied token, optionally replaced interactively when it turns out invalid.
pub struct DirectToken {
    token: Mutex<String>,
    prompter: Option<Arc<dyn Prompter>>,
}

impl DirectToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(token.into()),
            prompter: None,
        }
    }

    pub fn with_prompter(token: impl Into<String>, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            token: Mutex::new(token.into()),
            prompter: Some(prompter),
        }
    }

    /// Last token that was supplied or accepted.
    pub fn current_token(&self) -> String {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn remember(&self, token: &str) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = token.to_string();
    }

    pub(crate) async fn authenticate(&self, transport: &dyn Transport) -> Result<SecretAuth, VaultError> {
        let mut token = self.current_token();
        if transport.token() != token {
            transport.set_token(&token);
        }

        let mut attempt = 0;
        let lookup = loop {
            attempt += 1;
            match transport.lookup_self().await {
                Ok(lookup) => break lookup,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Token lookup failed");
                    if attempt >= MAX_TOKEN_ATTEMPTS {
                        return Err(VaultError::TokenAcquisitionFailed(format!(
                            "no valid token after {} attempts",
                            attempt
                        )));
                    }
                }
            }

            token = self.prompt().await?;
            self.remember(&token);
            transport.set_token(&token);
        };

        let ttl = lookup
            .data
            .get("ttl")
            .and_then(Value::as_u64)
            .ok_or_else(|| VaultError::stale_field("ttl", LOOKUP_SELF_PATH))?;
        let renewable = lookup
            .data
            .get("renewable")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(SecretAuth {
            client_token: token,
            lease_duration: ttl,
            renewable,
            policies: Vec::new(),
        })
    }

    async fn prompt(&self) -> Result<String, VaultError> {
        let prompter = self
            .prompter
            .clone()
            .ok_or_else(|| VaultError::TokenAcquisitionFailed("no prompter set".to_string()))?;

        tracing::info!("Prompting for a new token");
        tokio::task::spawn_blocking(move || prompter.prompt())
            .await
            .map_err(|e| VaultError::TokenAcquisitionFailed(format!("prompt task failed: {}", e)))?
            .map_err(|e| VaultError::TokenAcquisitionFailed(e.to_string()))
    }
}
