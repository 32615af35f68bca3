//! Credential resolution: turns configuration into login material.

use crate::config::{AuthConfig, AuthMethod};
use crate::error::{Result, SignerError};
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use tracing::{debug, info};

/// Raw authentication material for one login mechanism.
#[derive(Debug, Clone)]
pub enum Credential {
    /// AppRole role id + secret id.
    AppRole {
        role_id: String,
        secret_id: SecretString,
    },
    /// Backend role name + Kubernetes service-account JWT.
    Kubernetes { role: String, jwt: SecretString },
}

impl Credential {
    pub fn app_role(role_id: impl Into<String>, secret_id: impl Into<String>) -> Self {
        Credential::AppRole {
            role_id: role_id.into(),
            secret_id: SecretString::new(secret_id.into()),
        }
    }

    pub fn kubernetes(role: impl Into<String>, jwt: impl Into<String>) -> Self {
        Credential::Kubernetes {
            role: role.into(),
            jwt: SecretString::new(jwt.into()),
        }
    }

    pub fn kind(&self) -> AuthMethod {
        match self {
            Credential::AppRole { .. } => AuthMethod::AppRole,
            Credential::Kubernetes { .. } => AuthMethod::Kubernetes,
        }
    }
}

/// Source of login material for the token manager.
pub trait CredentialProvider: Send + Sync {
    /// Return the credential to log in with.
    fn resolve(&self) -> Result<Credential>;
}

/// A fixed credential. Mostly useful for tests and embedding.
impl CredentialProvider for Credential {
    fn resolve(&self) -> Result<Credential> {
        Ok(self.clone())
    }
}

/// Credential provider backed by [`AuthConfig`].
///
/// Every [`resolve`](CredentialProvider::resolve) reloads the material, so a
/// rotated secret-id file or projected service-account token is picked up by
/// the next login. Construction loads once to fail fast on a bad setup.
pub struct ConfiguredCredentials {
    config: AuthConfig,
}

impl ConfiguredCredentials {
    /// Select the mechanism and check that its material can be loaded.
    pub fn new(config: AuthConfig) -> Result<Self> {
        let credential = load_credential(&config)?;
        info!(method = %credential.kind(), "credential source selected");
        Ok(Self { config })
    }
}

impl CredentialProvider for ConfiguredCredentials {
    fn resolve(&self) -> Result<Credential> {
        load_credential(&self.config)
    }
}

/// Build the credential selected by `config`.
pub fn load_credential(config: &AuthConfig) -> Result<Credential> {
    match config.select_method()? {
        AuthMethod::AppRole => {
            let role_id = match (&config.role_id, &config.role_id_file) {
                (Some(inline), _) if !inline.trim().is_empty() => inline.trim().to_string(),
                (_, Some(path)) => read_trimmed(path, "role_id")?,
                _ => return Err(SignerError::Config("role_id not configured".to_string())),
            };
            let secret_id = match (&config.secret_id, &config.secret_id_file) {
                (Some(inline), _) if !inline.expose_secret().trim().is_empty() => {
                    inline.expose_secret().trim().to_string()
                }
                (_, Some(path)) => read_trimmed(path, "secret_id")?,
                _ => return Err(SignerError::Config("secret_id not configured".to_string())),
            };
            Ok(Credential::app_role(role_id, secret_id))
        }
        AuthMethod::Kubernetes => {
            let role = config
                .kubernetes_role
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| SignerError::Config("kubernetes_role not configured".to_string()))?;
            let jwt = read_trimmed(&config.kubernetes_token_path, "service account token")?;
            Ok(Credential::kubernetes(role, jwt))
        }
    }
}

/// Read a single-value credential file, trimming surrounding whitespace.
fn read_trimmed(path: &Path, what: &str) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| SignerError::io(path, e))?;
    let value = content.trim();
    if value.is_empty() {
        return Err(SignerError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{what} file is empty")),
        ));
    }
    debug!(path = ?path, "loaded {}", what);
    Ok(value.to_string())
}
