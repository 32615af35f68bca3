//! Access token lifecycle: lazy login, caching, invalidation and revocation.

use crate::backend::SecretBackend;
use crate::config::AuthMethod;
use crate::credential::CredentialProvider;
use crate::error::{Result, SignerError, TransportKind};
use futures::future::{BoxFuture, FutureExt, Shared};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A backend access token.
///
/// The value is wrapped so that `Debug` output never shows it.
#[derive(Debug)]
pub struct AccessToken {
    value: SecretString,
    issued_at: Instant,
    ttl: Option<Duration>,
    source: AuthMethod,
    renewable: bool,
}

impl AccessToken {
    /// Create a token issued now. `ttl` of `None` means the backend reported
    /// no expiry.
    pub fn new(value: impl Into<String>, ttl: Option<Duration>, source: AuthMethod) -> Self {
        Self {
            value: SecretString::new(value.into()),
            issued_at: Instant::now(),
            ttl,
            source,
            renewable: false,
        }
    }

    pub fn with_renewable(mut self, renewable: bool) -> Self {
        self.renewable = renewable;
        self
    }

    /// The token value. Callers must not log or persist it.
    pub fn value(&self) -> &SecretString {
        &self.value
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn source(&self) -> AuthMethod {
        self.source
    }

    pub fn renewable(&self) -> bool {
        self.renewable
    }

    /// `None` when the token never expires.
    pub fn expires_at(&self) -> Option<Instant> {
        self.ttl.and_then(|ttl| self.issued_at.checked_add(ttl))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|exp| exp <= Instant::now())
    }

    /// Whether the token may still be handed out from cache, keeping `margin`
    /// of lifetime in reserve. The reserve never exceeds half the lifetime.
    fn is_usable(&self, margin: Duration) -> bool {
        match (self.ttl, self.expires_at()) {
            (Some(ttl), Some(exp)) => exp > Instant::now() + effective_margin(ttl, margin),
            _ => true,
        }
    }
}

fn effective_margin(ttl: Duration, margin: Duration) -> Duration {
    margin.min(ttl / 2)
}

type LoginOutcome = Result<Arc<AccessToken>>;
type PendingLogin = Shared<BoxFuture<'static, LoginOutcome>>;

/// Caches one access token and serializes logins.
///
/// Cloning is cheap; clones share the cache.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    credentials: Arc<dyn CredentialProvider>,
    backend: Arc<dyn SecretBackend>,
    renew_margin: Duration,
    slot: Mutex<TokenSlot>,
}

#[derive(Default)]
struct TokenSlot {
    current: Option<Arc<AccessToken>>,
    pending: Option<PendingLogin>,
}

impl TokenManager {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        backend: Arc<dyn SecretBackend>,
        renew_margin: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                credentials,
                backend,
                renew_margin,
                slot: Mutex::new(TokenSlot::default()),
            }),
        }
    }

    /// Return a usable token, logging in if the cache is empty or stale.
    ///
    /// Concurrent callers share a single in-flight login. The login runs as
    /// its own task, so dropping this future only abandons the wait.
    pub async fn get_token(&self) -> Result<Arc<AccessToken>> {
        let pending = {
            let mut slot = self.inner.slot.lock().await;
            if let Some(token) = &slot.current {
                if token.is_usable(self.inner.renew_margin) {
                    return Ok(token.clone());
                }
                debug!("cached token expired or near expiry");
                slot.current = None;
            }
            match &slot.pending {
                Some(pending) => {
                    debug!("joining in-flight login");
                    pending.clone()
                }
                None => {
                    let pending = start_login(&self.inner);
                    slot.pending = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Drop the cached token if it is still `stale`.
    ///
    /// A token obtained by a newer login is left alone.
    pub async fn invalidate(&self, stale: &Arc<AccessToken>) {
        let mut slot = self.inner.slot.lock().await;
        match &slot.current {
            Some(current) if Arc::ptr_eq(current, stale) => {
                slot.current = None;
                debug!("cached token invalidated");
            }
            _ => debug!("invalidate ignored; token already replaced"),
        }
    }

    /// Remove the cached token and revoke it on the backend.
    pub async fn revoke(&self) -> Result<()> {
        let token = self.inner.slot.lock().await.current.take();
        match token {
            Some(token) => {
                self.inner.backend.revoke(&token).await?;
                info!("backend token revoked");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn start_login(inner: &Arc<Inner>) -> PendingLogin {
    let task = tokio::spawn(inner.clone().login());
    async move {
        task.await.unwrap_or_else(|e| {
            Err(SignerError::Transport {
                endpoint: "login".to_string(),
                kind: TransportKind::Request,
                reason: format!("login task did not complete: {e}"),
            })
        })
    }
    .boxed()
    .shared()
}

impl Inner {
    async fn login(self: Arc<Self>) -> LoginOutcome {
        let outcome = match self.credentials.resolve() {
            Ok(credential) => self.backend.authenticate(&credential).await.map(Arc::new),
            Err(e) => Err(e),
        };

        let mut slot = self.slot.lock().await;
        slot.pending = None;
        match &outcome {
            Ok(token) => {
                if let Some(ttl) = token.ttl().filter(|ttl| *ttl / 2 < self.renew_margin) {
                    warn!(
                        ttl_secs = ttl.as_secs(),
                        renew_margin_secs = self.renew_margin.as_secs(),
                        "token lifetime is under twice the renewal margin; renewing at half its lifetime"
                    );
                }
                info!(
                    method = %token.source(),
                    ttl_secs = token.ttl().map(|t| t.as_secs()),
                    renewable = token.renewable(),
                    "obtained backend token"
                );
                slot.current = Some(token.clone());
            }
            Err(e) => warn!(error = %e, "backend login failed"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::testing::MockBackend;
    use std::sync::atomic::Ordering;

    fn manager(backend: &Arc<MockBackend>, margin: Duration) -> TokenManager {
        TokenManager::new(
            Arc::new(Credential::app_role("r1", "s1")),
            backend.clone(),
            margin,
        )
    }

    #[tokio::test]
    async fn test_get_token_returns_unexpired_token() {
        let backend = Arc::new(MockBackend::new());
        let tokens = manager(&backend, Duration::ZERO);

        let token = tokens.get_token().await.unwrap();
        assert!(!token.is_expired());
        assert!(token.expires_at().unwrap() > Instant::now());
        assert_eq!(token.source(), AuthMethod::AppRole);
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let backend = Arc::new(MockBackend::new());
        let tokens = manager(&backend, Duration::from_secs(30));

        let first = tokens.get_token().await.unwrap();
        let second = tokens.get_token().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_login() {
        let backend = Arc::new(MockBackend::new().with_login_delay(Duration::from_millis(50)));
        let tokens = manager(&backend, Duration::from_secs(30));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let tokens = tokens.clone();
                tokio::spawn(async move { tokens.get_token().await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        let first = results[0].as_ref().unwrap().as_ref().unwrap().clone();
        for result in results {
            let token = result.unwrap().unwrap();
            assert!(Arc::ptr_eq(&first, &token));
        }
        assert_eq!(backend.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_abort_login() {
        let backend = Arc::new(MockBackend::new().with_login_delay(Duration::from_millis(100)));
        let tokens = manager(&backend, Duration::from_secs(30));

        let abandoned = tokio::time::timeout(Duration::from_millis(10), tokens.get_token()).await;
        assert!(abandoned.is_err());

        let token = tokens.get_token().await.unwrap();
        assert!(!token.is_expired());
        assert_eq!(backend.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_login() {
        let backend = Arc::new(MockBackend::new());
        let tokens = manager(&backend, Duration::from_secs(30));

        let first = tokens.get_token().await.unwrap();
        tokens.invalidate(&first).await;
        let second = tokens.get_token().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(backend.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_invalidate_keeps_fresh_token() {
        let backend = Arc::new(MockBackend::new());
        let tokens = manager(&backend, Duration::from_secs(30));

        let stale = tokens.get_token().await.unwrap();
        tokens.invalidate(&stale).await;
        let fresh = tokens.get_token().await.unwrap();

        // A late invalidate from a caller still holding the old token.
        tokens.invalidate(&stale).await;
        let again = tokens.get_token().await.unwrap();

        assert!(Arc::ptr_eq(&fresh, &again));
        assert_eq!(backend.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_triggers_login() {
        let backend = Arc::new(MockBackend::new().with_ttl(Some(Duration::from_secs(60))));
        let tokens = manager(&backend, Duration::ZERO);

        let first = tokens.get_token().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(first.is_expired());

        let second = tokens.get_token().await.unwrap();
        assert!(!second.is_expired());
        assert_eq!(backend.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_margin_replaces_token_early() {
        let backend = Arc::new(MockBackend::new().with_ttl(Some(Duration::from_secs(60))));
        let tokens = manager(&backend, Duration::from_secs(30));

        tokens.get_token().await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;
        tokens.get_token().await.unwrap();
        assert_eq!(backend.logins.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(15)).await;
        tokens.get_token().await.unwrap();
        assert_eq!(backend.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_lived_token_is_cached_for_half_its_ttl() {
        let backend = Arc::new(MockBackend::new().with_ttl(Some(Duration::from_secs(10))));
        let tokens = manager(&backend, Duration::from_secs(30));

        let first = tokens.get_token().await.unwrap();
        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(1)).await;
            let token = tokens.get_token().await.unwrap();
            assert!(Arc::ptr_eq(&first, &token));
        }
        assert_eq!(backend.logins.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let renewed = tokens.get_token().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &renewed));
        assert_eq!(backend.logins.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_effective_margin_is_capped_at_half_ttl() {
        let margin = Duration::from_secs(30);
        assert_eq!(effective_margin(Duration::from_secs(3600), margin), margin);
        assert_eq!(
            effective_margin(Duration::from_secs(10), margin),
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn test_panicked_login_is_not_an_auth_failure() {
        struct PanickingBackend;

        #[async_trait::async_trait]
        impl SecretBackend for PanickingBackend {
            async fn authenticate(&self, _credential: &Credential) -> Result<AccessToken> {
                panic!("backend blew up");
            }

            async fn invoke(
                &self,
                _path: &str,
                _token: &AccessToken,
                _payload: &serde_json::Value,
            ) -> Result<serde_json::Value> {
                Ok(serde_json::Value::Null)
            }

            async fn revoke(&self, _token: &AccessToken) -> Result<()> {
                Ok(())
            }
        }

        let tokens = TokenManager::new(
            Arc::new(Credential::app_role("r1", "s1")),
            Arc::new(PanickingBackend),
            Duration::ZERO,
        );

        let err = tokens.get_token().await.unwrap_err();
        assert!(!err.is_auth_failure());
        assert!(matches!(
            err,
            SignerError::Transport {
                kind: TransportKind::Request,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_expiring_token_stays_cached() {
        let backend = Arc::new(MockBackend::new().with_ttl(None));
        let tokens = manager(&backend, Duration::from_secs(30));

        tokens.get_token().await.unwrap();
        tokio::time::advance(Duration::from_secs(86_400)).await;
        let token = tokens.get_token().await.unwrap();

        assert!(token.expires_at().is_none());
        assert_eq!(backend.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_login_is_not_cached() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_next_login(SignerError::Auth {
            endpoint: "auth/approle/login".to_string(),
            reason: "invalid role or secret ID".to_string(),
        });
        let tokens = manager(&backend, Duration::from_secs(30));

        let err = tokens.get_token().await.unwrap_err();
        assert!(err.is_auth_failure());

        tokens.get_token().await.unwrap();
        assert_eq!(backend.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_credential_error_skips_backend() {
        struct Unconfigured;
        impl CredentialProvider for Unconfigured {
            fn resolve(&self) -> Result<Credential> {
                Err(SignerError::Config("no credentials configured".to_string()))
            }
        }

        let backend = Arc::new(MockBackend::new());
        let tokens = TokenManager::new(Arc::new(Unconfigured), backend.clone(), Duration::ZERO);

        let err = tokens.get_token().await.unwrap_err();
        assert!(matches!(err, SignerError::Config(_)));
        assert_eq!(backend.logins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_revoke_clears_cache() {
        let backend = Arc::new(MockBackend::new());
        let tokens = manager(&backend, Duration::from_secs(30));

        tokens.revoke().await.unwrap();
        assert_eq!(backend.revokes.load(Ordering::SeqCst), 0);

        tokens.get_token().await.unwrap();
        tokens.revoke().await.unwrap();
        assert_eq!(backend.revokes.load(Ordering::SeqCst), 1);

        tokens.get_token().await.unwrap();
        assert_eq!(backend.logins.load(Ordering::SeqCst), 2);
    }
}
