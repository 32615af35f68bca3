//! Configuration structures for the signing gateway.

use crate::error::{Result, SignerError};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    /// OpenBao/Vault server address (e.g., "https://openbao.internal:8200").
    #[serde(default = "default_address")]
    pub address: String,

    /// Enterprise namespace sent as `X-Vault-Namespace`.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Optional CA certificate file for TLS verification.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,

    /// Request timeout in milliseconds, applied to every backend call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// A cached token is replaced once it is this close to expiry.
    #[serde(default = "default_renew_margin_secs")]
    pub token_renew_margin_secs: u64,

    /// Path of the transaction-signing endpoint, relative to `/v1/`.
    #[serde(default = "default_sign_path")]
    pub sign_path: String,

    /// Credential configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            namespace: None,
            ca_file: None,
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            token_renew_margin_secs: default_renew_margin_secs(),
            sign_path: default_sign_path(),
            auth: AuthConfig::default(),
        }
    }
}

impl SignerConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SignerError::io(path, e))?;
        serde_json::from_str(&raw)
            .map_err(|e| SignerError::Config(format!("invalid config file {path:?}: {e}")))
    }

    /// Reject values that would make every request fail.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(SignerError::Config("address must not be empty".to_string()));
        }
        if !self.address.starts_with("http://") && !self.address.starts_with("https://") {
            return Err(SignerError::Config(format!(
                "address must be an http(s) URL, got {:?}",
                self.address
            )));
        }
        if self.timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(SignerError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.sign_path.trim_matches('/').is_empty() {
            return Err(SignerError::Config("sign_path must not be empty".to_string()));
        }
        self.auth.select_method()?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn renew_margin(&self) -> Duration {
        Duration::from_secs(self.token_renew_margin_secs)
    }
}

/// Authentication mechanism used to obtain a backend token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Static role id + secret id pair.
    AppRole,
    /// Kubernetes service-account token exchange.
    Kubernetes,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::AppRole => f.write_str("approle"),
            AuthMethod::Kubernetes => f.write_str("kubernetes"),
        }
    }
}

/// Credential sources. Every field is optional; `select_method` decides which
/// mechanism the combination amounts to.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Force a mechanism instead of inferring it from the fields present.
    #[serde(default)]
    pub method: Option<AuthMethod>,

    /// AppRole role_id, inline.
    #[serde(default)]
    pub role_id: Option<String>,

    /// Path to file containing the AppRole role_id.
    #[serde(default)]
    pub role_id_file: Option<PathBuf>,

    /// AppRole secret_id, inline.
    #[serde(default)]
    pub secret_id: Option<SecretString>,

    /// Path to file containing the AppRole secret_id.
    #[serde(default)]
    pub secret_id_file: Option<PathBuf>,

    /// Backend role bound to the Kubernetes service account.
    #[serde(default)]
    pub kubernetes_role: Option<String>,

    /// Mounted service-account token.
    #[serde(default = "default_kubernetes_token_path")]
    pub kubernetes_token_path: PathBuf,

    /// Mount point of the AppRole auth method.
    #[serde(default = "default_approle_mount")]
    pub approle_mount: String,

    /// Mount point of the Kubernetes auth method.
    #[serde(default = "default_kubernetes_mount")]
    pub kubernetes_mount: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: None,
            role_id: None,
            role_id_file: None,
            secret_id: None,
            secret_id_file: None,
            kubernetes_role: None,
            kubernetes_token_path: default_kubernetes_token_path(),
            approle_mount: default_approle_mount(),
            kubernetes_mount: default_kubernetes_mount(),
        }
    }
}

impl AuthConfig {
    fn has_role_id(&self) -> bool {
        self.role_id.as_deref().is_some_and(|s| !s.trim().is_empty()) || self.role_id_file.is_some()
    }

    fn has_secret_id(&self) -> bool {
        self.secret_id
            .as_ref()
            .is_some_and(|s| !s.expose_secret().trim().is_empty())
            || self.secret_id_file.is_some()
    }

    fn has_kubernetes_role(&self) -> bool {
        self.kubernetes_role
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }

    /// Decide which mechanism this configuration selects.
    ///
    /// An explicit `method` wins. Otherwise AppRole is chosen whenever both a
    /// role id and a secret id are present, even if a Kubernetes role is
    /// configured as well; Kubernetes is used only when AppRole is incomplete.
    pub fn select_method(&self) -> Result<AuthMethod> {
        match self.method {
            Some(AuthMethod::AppRole) => {
                if !self.has_role_id() || !self.has_secret_id() {
                    return Err(SignerError::Config(
                        "approle authentication requires role_id and secret_id".to_string(),
                    ));
                }
                Ok(AuthMethod::AppRole)
            }
            Some(AuthMethod::Kubernetes) => {
                if !self.has_kubernetes_role() {
                    return Err(SignerError::Config(
                        "kubernetes authentication requires kubernetes_role".to_string(),
                    ));
                }
                Ok(AuthMethod::Kubernetes)
            }
            None if self.has_role_id() && self.has_secret_id() => {
                if self.has_kubernetes_role() {
                    warn!(
                        "both AppRole and Kubernetes credentials configured; AppRole takes precedence"
                    );
                }
                Ok(AuthMethod::AppRole)
            }
            None if self.has_kubernetes_role() => Ok(AuthMethod::Kubernetes),
            None => Err(SignerError::Config(
                "no credentials configured: set role_id and secret_id, or kubernetes_role"
                    .to_string(),
            )),
        }
    }
}

// Default value functions for serde
fn default_address() -> String {
    "https://127.0.0.1:8200".to_string()
}

fn default_timeout_ms() -> u64 {
    5000 // 5 seconds
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_renew_margin_secs() -> u64 {
    30
}

fn default_sign_path() -> String {
    "x3na-transactions/sign-transaction".to_string()
}

fn default_kubernetes_token_path() -> PathBuf {
    PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token")
}

fn default_approle_mount() -> String {
    "approle".to_string()
}

fn default_kubernetes_mount() -> String {
    "kubernetes".to_string()
}
