//! Transaction signing through the backend.

use crate::backend::SecretBackend;
use crate::config::SignerConfig;
use crate::credential::ConfiguredCredentials;
use crate::error::{Result, SignerError};
use crate::openbao::{OpenBaoClient, SignTransactionRequest, SignTransactionResponse};
use crate::token::{AccessToken, TokenManager};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Authorization failures tolerated per call, counting the first attempt.
const MAX_AUTH_ATTEMPTS: usize = 2;

/// A transaction to sign with a named key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    /// Key name or address known to the backend.
    pub key_identifier: String,
    /// Hex-encoded unsigned transaction.
    pub raw_transaction: String,
}

impl SigningRequest {
    pub fn new(key_identifier: impl Into<String>, raw_transaction: impl Into<String>) -> Self {
        Self {
            key_identifier: key_identifier.into(),
            raw_transaction: raw_transaction.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.key_identifier.trim().is_empty() {
            return Err(SignerError::Validation(
                "key identifier must not be empty".to_string(),
            ));
        }
        if self.raw_transaction.trim().is_empty() {
            return Err(SignerError::Validation(
                "raw transaction must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A signed transaction as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningResult {
    /// Hex-encoded signed transaction.
    pub signed_transaction: String,
}

/// Signs transactions on behalf of callers without exposing the backend
/// token.
///
/// Cloning is cheap; clones share the token cache.
#[derive(Clone)]
pub struct SigningGateway {
    tokens: TokenManager,
    backend: Arc<dyn SecretBackend>,
    sign_path: String,
}

impl SigningGateway {
    pub fn new(tokens: TokenManager, backend: Arc<dyn SecretBackend>, sign_path: &str) -> Self {
        Self {
            tokens,
            backend,
            sign_path: sign_path.trim_matches('/').to_string(),
        }
    }

    /// Wire an OpenBao-backed gateway from configuration.
    ///
    /// Reads credential files but performs no network I/O; the first login
    /// happens on the first signing call.
    pub fn from_config(config: &SignerConfig) -> Result<Self> {
        config.validate()?;
        let credentials = Arc::new(ConfiguredCredentials::new(config.auth.clone())?);
        let backend: Arc<dyn SecretBackend> = Arc::new(OpenBaoClient::new(config)?);
        let tokens = TokenManager::new(credentials, backend.clone(), config.renew_margin());
        Ok(Self::new(tokens, backend, &config.sign_path))
    }

    /// Token manager shared by this gateway.
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Sign `request`.
    ///
    /// An authorization failure invalidates the token and the call is retried
    /// once with a fresh login. Transport and backend errors are returned
    /// as-is; retrying a signature is left to the caller.
    pub async fn sign(&self, request: &SigningRequest) -> Result<SigningResult> {
        request.validate()?;

        let payload = serde_json::to_value(SignTransactionRequest {
            key_name: request.key_identifier.trim(),
            raw_transaction: request.raw_transaction.trim(),
        })
        .map_err(|e| SignerError::protocol(&self.sign_path, e))?;

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            let (used, outcome) = self.try_sign(&payload).await;
            match outcome {
                Ok(response) => break response,
                Err(err) if err.is_auth_failure() => {
                    if let Some(token) = &used {
                        self.tokens.invalidate(token).await;
                    }
                    if attempt >= MAX_AUTH_ATTEMPTS {
                        return Err(err);
                    }
                    warn!(
                        error = %err,
                        key = %request.key_identifier,
                        "authorization failed; re-authenticating once"
                    );
                }
                Err(err) => return Err(err),
            }
        };

        let signed = self.extract(response)?;
        info!(
            key = %request.key_identifier,
            attempts = attempt,
            "transaction signed"
        );
        Ok(signed)
    }

    /// Sign `raw_transaction` with `key_identifier`, returning the signed hex.
    pub async fn sign_transaction(
        &self,
        key_identifier: &str,
        raw_transaction: &str,
    ) -> Result<String> {
        self.sign(&SigningRequest::new(key_identifier, raw_transaction))
            .await
            .map(|result| result.signed_transaction)
    }

    /// One token lookup plus one signing call. Returns the token that was used,
    /// if any, so an authorization failure can invalidate exactly that token.
    async fn try_sign(&self, payload: &Value) -> (Option<Arc<AccessToken>>, Result<Value>) {
        let token = match self.tokens.get_token().await {
            Ok(token) => token,
            Err(err) => return (None, Err(err)),
        };
        debug!(path = %self.sign_path, "submitting signing request");
        let outcome = self.backend.invoke(&self.sign_path, &token, payload).await;
        (Some(token), outcome)
    }

    fn extract(&self, response: Value) -> Result<SigningResult> {
        let decoded = SignTransactionResponse::from_value(response)
            .map_err(|e| SignerError::protocol(&self.sign_path, e))?;

        if let Some(warnings) = decoded.warnings.as_ref().filter(|w| !w.is_empty()) {
            warn!(warnings = ?warnings, "backend returned warnings");
        }

        let signed_transaction = decoded.data.signed_transaction;
        if signed_transaction.trim().is_empty() {
            return Err(SignerError::protocol(
                &self.sign_path,
                "signed_transaction is empty",
            ));
        }
        Ok(SigningResult { signed_transaction })
    }
}
