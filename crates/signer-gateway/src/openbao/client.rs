//! OpenBao HTTP client.

use crate::backend::SecretBackend;
use crate::config::SignerConfig;
use crate::credential::Credential;
use crate::error::{Result, SignerError};
use crate::openbao::auth::AuthMounts;
use crate::openbao::models::{ApiResponse, ErrorBody};
use crate::token::AccessToken;
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const REVOKE_SELF_PATH: &str = "auth/token/revoke-self";

/// OpenBao HTTP client.
///
/// Stateless with respect to tokens: every authenticated call receives the
/// token from the caller. Request and connect timeouts from the configuration
/// apply to every call.
pub struct OpenBaoClient {
    http: Client,
    address: String,
    namespace: Option<String>,
    mounts: AuthMounts,
}

impl OpenBaoClient {
    /// Create a new OpenBao client with the given configuration.
    pub fn new(config: &SignerConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(4);

        // Configure TLS if CA file is provided
        if let Some(ref ca_path) = config.ca_file {
            let ca_cert = std::fs::read(ca_path).map_err(|e| SignerError::io(ca_path, e))?;
            let cert = reqwest::Certificate::from_pem(&ca_cert).map_err(|e| {
                SignerError::Config(format!("failed to parse CA certificate {ca_path:?}: {e}"))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| SignerError::Config(format!("failed to build HTTP client: {e}")))?;

        let client = Self {
            http,
            address: config.address.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone().filter(|ns| !ns.is_empty()),
            mounts: AuthMounts::from_config(&config.auth),
        };

        info!(
            address = %client.address,
            timeout_ms = config.timeout_ms,
            "OpenBao client configured"
        );

        Ok(client)
    }

    /// Get the base address.
    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.http.post(self.url(path));
        match &self.namespace {
            Some(ns) => request.header(NAMESPACE_HEADER, ns),
            None => request,
        }
    }

    /// Send a request and return its status and body text.
    async fn execute(&self, endpoint: &str, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request
            .send()
            .await
            .map_err(|e| SignerError::transport(endpoint, &e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SignerError::transport(endpoint, &e))?;
        debug!(endpoint = %endpoint, status = status.as_u16(), "OpenBao request completed");
        Ok((status, text))
    }

    /// POST `payload` to `path` with `token`, mapping statuses to errors.
    async fn write(&self, path: &str, token: &AccessToken, payload: &Value) -> Result<Value> {
        let endpoint = path.trim_start_matches('/');
        let mut token_header = HeaderValue::from_str(token.value().expose_secret())
            .map_err(|_| SignerError::protocol(endpoint, "token is not a valid header value"))?;
        token_header.set_sensitive(true);

        let request = self.post(endpoint).header(TOKEN_HEADER, token_header).json(payload);
        let (status, text) = self.execute(endpoint, request).await?;

        match status {
            StatusCode::NO_CONTENT => Ok(Value::Null),
            s if s.is_success() => {
                serde_json::from_str(&text).map_err(|e| SignerError::protocol(endpoint, e))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SignerError::Auth {
                endpoint: endpoint.to_string(),
                reason: ErrorBody::message(&text),
            }),
            s => Err(SignerError::Backend {
                endpoint: endpoint.to_string(),
                status: s.as_u16(),
                message: ErrorBody::message(&text),
            }),
        }
    }
}

#[async_trait]
impl SecretBackend for OpenBaoClient {
    async fn authenticate(&self, credential: &Credential) -> Result<AccessToken> {
        let login = self.mounts.login_request(credential);
        let endpoint = login.path.as_str();

        let request = self.post(endpoint).json(&login.body);
        let (status, text) = self.execute(endpoint, request).await?;

        match status {
            s if s.is_success() => {}
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SignerError::Auth {
                    endpoint: endpoint.to_string(),
                    reason: ErrorBody::message(&text),
                });
            }
            s => {
                return Err(SignerError::Backend {
                    endpoint: endpoint.to_string(),
                    status: s.as_u16(),
                    message: ErrorBody::message(&text),
                });
            }
        }

        let api_response: ApiResponse<Value> =
            serde_json::from_str(&text).map_err(|e| SignerError::protocol(endpoint, e))?;

        let auth = api_response.auth.ok_or_else(|| SignerError::Auth {
            endpoint: endpoint.to_string(),
            reason: "no auth info in response".to_string(),
        })?;

        let client_token = auth
            .client_token
            .filter(|t| !t.expose_secret().is_empty())
            .ok_or_else(|| SignerError::Auth {
                endpoint: endpoint.to_string(),
                reason: "response contains no client token".to_string(),
            })?;

        let ttl = match auth.lease_duration {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        debug!(
            endpoint = %endpoint,
            method = %credential.kind(),
            policies = ?auth.policies,
            lease_duration_secs = auth.lease_duration,
            "authenticated with OpenBao"
        );

        Ok(
            AccessToken::new(client_token.expose_secret().clone(), ttl, credential.kind())
                .with_renewable(auth.renewable),
        )
    }

    async fn invoke(&self, path: &str, token: &AccessToken, payload: &Value) -> Result<Value> {
        self.write(path, token, payload).await
    }

    async fn revoke(&self, token: &AccessToken) -> Result<()> {
        self.write(REVOKE_SELF_PATH, token, &Value::Object(Default::default()))
            .await
            .map(|_| ())
    }
}
