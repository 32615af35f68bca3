//! In-memory backend used by unit tests.

use crate::backend::SecretBackend;
use crate::credential::Credential;
use crate::error::{Result, SignerError};
use crate::token::AccessToken;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Counts calls and replays scripted failures; succeeds by default.
pub(crate) struct MockBackend {
    pub logins: AtomicUsize,
    pub invokes: AtomicUsize,
    pub revokes: AtomicUsize,
    login_delay: Duration,
    ttl: Option<Duration>,
    login_failures: Mutex<VecDeque<SignerError>>,
    responses: Mutex<VecDeque<Result<Value>>>,
    pub requests: Mutex<Vec<(String, Value)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            logins: AtomicUsize::new(0),
            invokes: AtomicUsize::new(0),
            revokes: AtomicUsize::new(0),
            login_delay: Duration::ZERO,
            ttl: Some(Duration::from_secs(3600)),
            login_failures: Mutex::new(VecDeque::new()),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = delay;
        self
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn fail_next_login(&self, err: SignerError) {
        self.login_failures.lock().unwrap().push_back(err);
    }

    /// Queue the outcome of the next `invoke`. Once the queue is empty every
    /// call answers with a signed transaction.
    pub fn respond_with(&self, response: Result<Value>) {
        self.responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl SecretBackend for MockBackend {
    async fn authenticate(&self, credential: &Credential) -> Result<AccessToken> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }
        if let Some(err) = self.login_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(AccessToken::new(format!("tok-{n}"), self.ttl, credential.kind()))
    }

    async fn invoke(&self, path: &str, _token: &AccessToken, payload: &Value) -> Result<Value> {
        self.invokes.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), payload.clone()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "data": { "signed_transaction": "0xdeadbeef" } })))
    }

    async fn revoke(&self, _token: &AccessToken) -> Result<()> {
        self.revokes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
