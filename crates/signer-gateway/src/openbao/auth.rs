//! Login requests for the supported auth methods.

use crate::config::AuthConfig;
use crate::credential::Credential;
use secrecy::ExposeSecret;
use serde::Serialize;

/// Mount points of the auth methods on the backend.
#[derive(Debug, Clone)]
pub(crate) struct AuthMounts {
    approle: String,
    kubernetes: String,
}

/// JSON body of a login call.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum LoginBody<'a> {
    AppRole {
        role_id: &'a str,
        secret_id: &'a str,
    },
    Kubernetes {
        role: &'a str,
        jwt: &'a str,
    },
}

/// A login call: where to send it and what to send.
#[derive(Debug)]
pub(crate) struct LoginRequest<'a> {
    pub(crate) path: String,
    pub(crate) body: LoginBody<'a>,
}

impl AuthMounts {
    pub(crate) fn new(approle: &str, kubernetes: &str) -> Self {
        Self {
            approle: approle.trim_matches('/').to_string(),
            kubernetes: kubernetes.trim_matches('/').to_string(),
        }
    }

    pub(crate) fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.approle_mount, &config.kubernetes_mount)
    }

    /// Build the login call for `credential`.
    pub(crate) fn login_request<'a>(&self, credential: &'a Credential) -> LoginRequest<'a> {
        match credential {
            Credential::AppRole { role_id, secret_id } => LoginRequest {
                path: format!("auth/{}/login", self.approle),
                body: LoginBody::AppRole {
                    role_id,
                    secret_id: secret_id.expose_secret(),
                },
            },
            Credential::Kubernetes { role, jwt } => LoginRequest {
                path: format!("auth/{}/login", self.kubernetes),
                body: LoginBody::Kubernetes {
                    role,
                    jwt: jwt.expose_secret(),
                },
            },
        }
    }
}

impl Default for AuthMounts {
    fn default() -> Self {
        Self::new("approle", "kubernetes")
    }
}
