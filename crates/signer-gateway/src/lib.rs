//! Credential broker and transaction-signing gateway for OpenBao/Vault.
//!
//! This crate authenticates to a secret-management backend, keeps the
//! resulting token to itself, and signs blockchain transactions with keys held
//! by the backend. It supports:
//! - AppRole and Kubernetes service-account authentication
//! - Token caching with expiry checks, single-flight login and invalidation
//! - A signing gateway that re-authenticates once on an authorization failure
//!
//! # Example
//!
//! ```no_run
//! use usg_signer_gateway::{SignerConfig, SigningGateway, SigningRequest};
//!
//! # async fn example() -> usg_signer_gateway::Result<()> {
//! let mut config = SignerConfig {
//!     address: "https://openbao.internal:8200".to_string(),
//!     ..Default::default()
//! };
//! config.auth.role_id = Some("r1".to_string());
//! config.auth.secret_id = Some(secrecy::SecretString::new("s1".to_string()));
//!
//! let gateway = SigningGateway::from_config(&config)?;
//! let signed = gateway.sign(&SigningRequest::new("0xKEY", "0xRAW")).await?;
//! println!("{}", signed.signed_transaction);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod openbao;
pub mod token;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use backend::SecretBackend;
pub use config::{AuthConfig, AuthMethod, SignerConfig};
pub use credential::{ConfiguredCredentials, Credential, CredentialProvider};
pub use error::{Result, SignerError, TransportKind};
pub use gateway::{SigningGateway, SigningRequest, SigningResult};
pub use openbao::OpenBaoClient;
pub use token::{AccessToken, TokenManager};

