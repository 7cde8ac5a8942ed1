//! In-memory transport for tests and embedding.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{LOOKUP_SELF_PATH, Transport};
use crate::error::TransportError;
use crate::models::{SecretAuth, VaultResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    LookupSelf,
    Read,
    Write,
    List,
    Delete,
}

/// A request as seen by the store, with the token it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub operation: Operation,
    pub path: String,
    pub token: String,
}

struct LoginRule {
    credentials: Map<String, Value>,
    lease_duration: u64,
}

#[derive(Default)]
struct MemoryState {
    token: String,
    /// Valid tokens and the ttl lookup-self reports for them.
    tokens: HashMap<String, u64>,
    logins: HashMap<String, LoginRule>,
    write_responses: HashMap<String, Map<String, Value>>,
    entries: BTreeMap<String, Map<String, Value>>,
    failures: HashMap<String, TransportError>,
    requests: Vec<RecordedRequest>,
    issued: u64,
}

/// Fake secrets store keeping tokens, login rules and logical entries in memory.
///
/// Writes to a path registered with [`on_login`](Self::on_login) behave like a
/// login endpoint: matching credentials mint a fresh token with the configured
/// lease, anything else is refused with a 400. Other writes are stored as-is
/// unless a canned response was registered with [`on_write`](Self::on_write).
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
    latency: Mutex<Option<Duration>>,
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `token` as valid with the given lookup ttl (seconds).
    pub fn add_token(&self, token: &str, ttl: u64) {
        self.state().tokens.insert(token.to_string(), ttl);
    }

    pub fn revoke_token(&self, token: &str) {
        self.state().tokens.remove(token);
    }

    pub fn on_login(&self, path: &str, credentials: Value, lease_duration: u64) {
        self.state().logins.insert(
            path.to_string(),
            LoginRule {
                credentials: into_object(credentials),
                lease_duration,
            },
        );
    }

    pub fn on_write(&self, path: &str, response: Value) {
        self.state()
            .write_responses
            .insert(path.to_string(), into_object(response));
    }

    pub fn insert(&self, path: &str, data: Value) {
        self.state().entries.insert(path.to_string(), into_object(data));
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.state().entries.get(path).cloned().map(Value::Object)
    }

    /// Make every request touching `path` fail with `error`.
    pub fn fail(&self, path: &str, error: TransportError) {
        self.state().failures.insert(path.to_string(), error);
    }

    pub fn recover(&self, path: &str) {
        self.state().failures.remove(path);
    }

    /// Delay applied to lookups and writes, to widen race windows in tests.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = Some(latency);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    pub fn count(&self, operation: Operation, path: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| r.operation == operation && r.path == path)
            .count()
    }

    pub fn lookup_count(&self) -> usize {
        self.count(Operation::LookupSelf, LOOKUP_SELF_PATH)
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Record the request and report any injected failure for its path.
    fn begin(&self, operation: Operation, path: &str) -> Result<MutexGuard<'_, MemoryState>, TransportError> {
        let mut state = self.state();
        let token = state.token.clone();
        state.requests.push(RecordedRequest {
            operation,
            path: path.to_string(),
            token,
        });
        if let Some(error) = state.failures.get(path).cloned() {
            return Err(error);
        }
        Ok(state)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn token(&self) -> String {
        self.state().token.clone()
    }

    fn set_token(&self, token: &str) {
        self.state().token = token.to_string();
    }

    async fn lookup_self(&self) -> Result<VaultResponse, TransportError> {
        self.delay().await;
        let state = self.begin(Operation::LookupSelf, LOOKUP_SELF_PATH)?;
        let ttl = state
            .tokens
            .get(&state.token)
            .copied()
            .ok_or_else(|| TransportError::status(403, "permission denied"))?;

        let mut data = Map::new();
        data.insert("id".to_string(), Value::String(state.token.clone()));
        data.insert("ttl".to_string(), Value::from(ttl));
        Ok(VaultResponse::with_data(data))
    }

    async fn read(&self, path: &str) -> Result<Option<VaultResponse>, TransportError> {
        let state = self.begin(Operation::Read, path)?;
        Ok(state.entries.get(path).cloned().map(VaultResponse::with_data))
    }

    async fn write(
        &self,
        path: &str,
        body: Map<String, Value>,
    ) -> Result<Option<VaultResponse>, TransportError> {
        self.delay().await;
        let mut state = self.begin(Operation::Write, path)?;

        if let Some(rule) = state.logins.get(path) {
            if rule.credentials != body {
                return Err(TransportError::status(400, "invalid credentials"));
            }
            let lease_duration = rule.lease_duration;
            state.issued += 1;
            let token = format!("mem.{}", state.issued);
            state.tokens.insert(token.clone(), lease_duration);
            return Ok(Some(VaultResponse::with_auth(SecretAuth::new(
                token,
                lease_duration,
            ))));
        }

        if let Some(response) = state.write_responses.get(path) {
            return Ok(Some(VaultResponse::with_data(response.clone())));
        }

        state.entries.insert(path.to_string(), body);
        Ok(None)
    }

    async fn list(&self, path: &str) -> Result<Option<VaultResponse>, TransportError> {
        let state = self.begin(Operation::List, path)?;
        let prefix = format!("{}/", path.trim_end_matches('/'));

        let keys: BTreeSet<String> = state
            .entries
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(|rest| match rest.split_once('/') {
                Some((dir, _)) => format!("{}/", dir),
                None => rest.to_string(),
            })
            .collect();
        if keys.is_empty() {
            return Ok(None);
        }

        let mut data = Map::new();
        data.insert(
            "keys".to_string(),
            Value::Array(keys.into_iter().map(Value::String).collect()),
        );
        Ok(Some(VaultResponse::with_data(data)))
    }

    async fn delete(&self, path: &str) -> Result<(), TransportError> {
        let mut state = self.begin(Operation::Delete, path)?;
        state.entries.remove(path);
        Ok(())
    }
}
