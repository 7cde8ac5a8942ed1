use super::token_info::validate;
use super::{AuthStrategy, CachedToken, Expiry};
use crate::VaultError;
use crate::clock::{Clock, SystemClock};
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owns the token for one endpoint and renews it on demand.
///
/// The lock covers the whole check → renew → re-check sequence, so concurrent
/// callers queue behind a single renewal and then see its result.
pub struct CredentialManager {
    transport: Arc<dyn Transport>,
    strategy: Arc<AuthStrategy>,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<CachedToken>>,
}

impl CredentialManager {
    pub fn new(transport: Arc<dyn Transport>, strategy: Arc<AuthStrategy>) -> Self {
        Self {
            transport,
            strategy,
            clock: Arc::new(SystemClock),
            cached: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Manager for another endpoint sharing this one's strategy, with an empty cache.
    pub fn with_transport(&self, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            strategy: Arc::clone(&self.strategy),
            clock: Arc::clone(&self.clock),
            cached: Mutex::new(None),
        }
    }

    pub fn strategy(&self) -> &Arc<AuthStrategy> {
        &self.strategy
    }

    pub async fn expires_at(&self) -> Option<Expiry> {
        self.cached.lock().await.as_ref().map(|cached| cached.expires_at)
    }

    /// Transport carrying a token that is valid at the moment of return.
    pub async fn acquire(&self) -> Result<Arc<dyn Transport>, VaultError> {
        let mut cached = self.cached.lock().await;

        if validate(cached.as_ref(), self.clock.now()).is_ok() {
            return Ok(Arc::clone(&self.transport));
        }

        let renewal = self.renew(&mut cached).await;

        // Checked once more whatever the renewal outcome; only a second
        // failure is reported.
        match validate(cached.as_ref(), self.clock.now()) {
            Ok(()) => Ok(Arc::clone(&self.transport)),
            Err(reason) => match renewal {
                Err(e) => {
                    tracing::warn!(strategy = self.strategy.kind(), error = %e, "Token renewal failed");
                    Err(e)
                }
                Ok(()) => {
                    tracing::warn!(strategy = self.strategy.kind(), reason, "Renewed token unusable");
                    Err(VaultError::TokenExpired)
                }
            },
        }
    }

    async fn renew(&self, cached: &mut Option<CachedToken>) -> Result<(), VaultError> {
        *cached = None;

        tracing::info!(strategy = self.strategy.kind(), "Authenticating");
        let auth = self.strategy.authenticate(self.transport.as_ref()).await?;
        if auth.client_token.is_empty() {
            return Err(VaultError::stale_field("client_token", "auth"));
        }

        self.transport.set_token(&auth.client_token);
        let expires_at = Expiry::from_lease(self.clock.now(), auth.lease_duration);
        *cached = Some(CachedToken::new(auth.client_token, expires_at));

        tracing::debug!(lease_duration = auth.lease_duration, "Token renewed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{DirectToken, FederatedToken, RoleCredentials};
    use crate::clock::FixedClock;
    use crate::transport::{MemoryTransport, Operation};
    use crate::TransportError;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    const LOGIN: &str = "auth/approle/login";

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 5, 12, 0, 0).unwrap()
    }

    fn approle_setup(lease: u64) -> (Arc<MemoryTransport>, Arc<FixedClock>, CredentialManager) {
        let transport = Arc::new(MemoryTransport::new());
        transport.on_login(LOGIN, json!({"role_id": "r", "secret_id": "s"}), lease);
        let clock = Arc::new(FixedClock::new(start()));
        let manager = CredentialManager::new(
            transport.clone(),
            Arc::new(RoleCredentials::new("r", "s").into()),
        )
        .with_clock(clock.clone());
        (transport, clock, manager)
    }

    fn logins(transport: &MemoryTransport) -> usize {
        transport.count(Operation::Write, LOGIN)
    }

    #[tokio::test]
    async fn test_cached_token_skips_strategy() {
        let (transport, clock, manager) = approle_setup(60);

        manager.acquire().await.unwrap();
        for _ in 0..5 {
            clock.advance(Duration::seconds(10));
            manager.acquire().await.unwrap();
        }
        assert_eq!(logins(&transport), 1);
    }

    #[tokio::test]
    async fn test_expiry_is_lease_minus_margin() {
        let (transport, _clock, manager) = approle_setup(60);

        let handle = manager.acquire().await.unwrap();
        assert_eq!(
            manager.expires_at().await,
            Some(Expiry::At(start() + Duration::seconds(55)))
        );
        assert_eq!(handle.token(), "mem.1");
        assert_eq!(transport.token(), "mem.1");
    }

    #[tokio::test]
    async fn test_expired_token_renewed_once_per_acquire() {
        let (transport, clock, manager) = approle_setup(60);

        manager.acquire().await.unwrap();
        clock.advance(Duration::seconds(55));
        manager.acquire().await.unwrap();
        assert_eq!(logins(&transport), 2);
        assert_eq!(transport.token(), "mem.2");

        manager.acquire().await.unwrap();
        assert_eq!(logins(&transport), 2);
    }

    #[tokio::test]
    async fn test_failed_renewal_leaves_no_credential() {
        let (transport, clock, manager) = approle_setup(60);
        manager.acquire().await.unwrap();
        assert!(manager.expires_at().await.is_some());

        clock.advance(Duration::seconds(60));
        transport.fail(LOGIN, TransportError::status(500, "internal error"));

        let Err(err) = manager.acquire().await else {
            panic!("acquire should fail");
        };
        assert!(matches!(err, VaultError::AuthenticationFailed(_)));
        assert_eq!(manager.expires_at().await, None);
        assert_eq!(logins(&transport), 2);

        transport.recover(LOGIN);
        manager.acquire().await.unwrap();
        assert_eq!(logins(&transport), 3);
    }

    #[tokio::test]
    async fn test_lease_shorter_than_margin_is_reported() {
        let (transport, _clock, manager) = approle_setup(3);

        let Err(err) = manager.acquire().await else {
            panic!("acquire should fail");
        };
        assert!(matches!(err, VaultError::TokenExpired));
        assert_eq!(logins(&transport), 1);
    }

    #[tokio::test]
    async fn test_zero_lease_is_cached_forever() {
        let transport = Arc::new(MemoryTransport::new());
        transport.add_token("s.root", 0);
        let clock = Arc::new(FixedClock::new(start()));
        let manager = CredentialManager::new(
            transport.clone(),
            Arc::new(DirectToken::new("s.root").into()),
        )
        .with_clock(clock.clone());

        manager.acquire().await.unwrap();
        clock.advance(Duration::days(365));
        manager.acquire().await.unwrap();

        assert_eq!(manager.expires_at().await, Some(Expiry::Never));
        assert_eq!(transport.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_revoked_token_served_until_expiry() {
        let transport = Arc::new(MemoryTransport::new());
        transport.add_token("s.app", 60);
        let clock = Arc::new(FixedClock::new(start()));
        let manager = CredentialManager::new(
            transport.clone(),
            Arc::new(DirectToken::new("s.app").into()),
        )
        .with_clock(clock.clone());

        manager.acquire().await.unwrap();
        transport.revoke_token("s.app");

        // Still valid locally: handed out without asking the store.
        let vt = manager.acquire().await.unwrap();
        assert_eq!(vt.token(), "s.app");
        assert_eq!(transport.lookup_count(), 1);

        clock.advance(Duration::seconds(55));
        let Err(err) = manager.acquire().await else {
            panic!("acquire should fail");
        };
        assert!(matches!(err, VaultError::TokenAcquisitionFailed(_)));
        assert_eq!(transport.lookup_count(), 2);
        assert_eq!(manager.expires_at().await, None);
    }

    #[tokio::test]
    async fn test_switched_manager_shares_strategy_not_cache() {
        let (transport, _clock, manager) = approle_setup(60);
        manager.acquire().await.unwrap();

        let other = Arc::new(MemoryTransport::new());
        other.on_login(LOGIN, json!({"role_id": "r", "secret_id": "s"}), 120);
        let switched = manager.with_transport(other.clone());

        assert!(Arc::ptr_eq(manager.strategy(), switched.strategy()));
        assert_eq!(switched.expires_at().await, None);

        switched.acquire().await.unwrap();
        assert_eq!(logins(&other), 1);
        assert_eq!(logins(&transport), 1);
        assert_eq!(
            switched.expires_at().await,
            Some(Expiry::At(start() + Duration::seconds(115)))
        );
    }

    #[tokio::test]
    async fn test_federated_login_without_auth_block() {
        let transport = Arc::new(MemoryTransport::new());
        let manager = CredentialManager::new(
            transport.clone(),
            Arc::new(FederatedToken::new("auth/jwt", "ci", "eyJ.bad").into()),
        );

        let Err(err) = manager.acquire().await else {
            panic!("acquire should fail");
        };
        // No login rule registered: the write is stored, no auth block comes back.
        assert!(matches!(err, VaultError::StaleCredentialField { ref field, .. } if field == "auth"));
        assert_eq!(transport.count(Operation::Write, "auth/jwt/login"), 1);
    }
}
