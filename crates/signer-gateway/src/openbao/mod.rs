//! OpenBao/Vault backend.
//!
//! This module provides the HTTP implementation of [`crate::SecretBackend`]
//! for OpenBao (or HashiCorp Vault). It supports:
//! - AppRole and Kubernetes authentication
//! - Authenticated writes to secrets-engine endpoints (transaction signing)
//! - Token self-revocation

mod auth;
mod client;
mod models;

pub use client::OpenBaoClient;
pub use models::{
    ApiResponse, AuthInfo, ErrorBody, SignTransactionRequest, SignTransactionResponse,
    SignedTransactionData,
};
