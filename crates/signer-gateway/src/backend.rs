//! Transport abstraction over the secret-management service.

use crate::credential::Credential;
use crate::error::Result;
use crate::token::AccessToken;
use async_trait::async_trait;
use serde_json::Value;

/// Request/response exchanges against the secret-management API.
///
/// Implementations hold no token state of their own: the token to use is
/// passed in on every call and must never be logged or persisted.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Exchange credential material for an access token.
    async fn authenticate(&self, credential: &Credential) -> Result<AccessToken>;

    /// Write `payload` to `path` with `token` and return the response body.
    async fn invoke(&self, path: &str, token: &AccessToken, payload: &Value) -> Result<Value>;

    /// Revoke `token` on the backend.
    async fn revoke(&self, token: &AccessToken) -> Result<()>;
}
