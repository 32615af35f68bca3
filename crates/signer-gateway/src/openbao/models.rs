//! Wire records exchanged with the OpenBao HTTP API.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic OpenBao API response wrapper.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
    #[serde(default)]
    pub auth: Option<AuthInfo>,
}

/// Authentication info from a login response.
///
/// Fields are optional so a response without token material can be reported
/// as a failed login rather than a decode error.
#[derive(Debug, Deserialize)]
pub struct AuthInfo {
    #[serde(default)]
    pub client_token: Option<SecretString>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ErrorBody {
    /// Best-effort human readable message from a failed response body.
    pub fn message(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
            _ if body.trim().is_empty() => "empty response body".to_string(),
            _ => body.trim().to_string(),
        }
    }
}

/// Body of a transaction-signing request.
#[derive(Debug, Serialize)]
pub struct SignTransactionRequest<'a> {
    pub key_name: &'a str,
    pub raw_transaction: &'a str,
}

/// Data section of a transaction-signing response.
#[derive(Debug, Deserialize)]
pub struct SignedTransactionData {
    pub signed_transaction: String,
}

/// Full transaction-signing response. `data` is required.
#[derive(Debug, Deserialize)]
pub struct SignTransactionResponse {
    pub data: SignedTransactionData,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

impl SignTransactionResponse {
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}
