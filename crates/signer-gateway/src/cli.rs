use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::path::PathBuf;
use usg_signer_gateway::{AuthMethod, Result, SignerConfig};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// JSON structured logging for log aggregation.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MethodArg {
    Approle,
    Kubernetes,
}

impl From<MethodArg> for AuthMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Approle => AuthMethod::AppRole,
            MethodArg::Kubernetes => AuthMethod::Kubernetes,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "usg-signer",
    version,
    about = "Sign transactions with keys held by OpenBao/Vault"
)]
pub struct Args {
    /// JSON configuration file; flags and environment override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// OpenBao/Vault address.
    #[arg(long, env = "VAULT_ADDR", global = true)]
    pub address: Option<String>,

    /// Namespace sent as X-Vault-Namespace.
    #[arg(long, env = "VAULT_NAMESPACE", global = true)]
    pub namespace: Option<String>,

    /// Extra CA bundle (PEM) for the backend's TLS certificate.
    #[arg(long, env = "VAULT_CACERT", global = true)]
    pub ca_file: Option<PathBuf>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Force an authentication method instead of inferring it.
    #[arg(long, value_enum, global = true)]
    pub auth_method: Option<MethodArg>,

    /// AppRole role_id.
    #[arg(long, env = "VAULT_ROLE_ID", global = true)]
    pub role_id: Option<String>,

    /// AppRole secret_id.
    #[arg(long, env = "VAULT_SECRET_ID", hide_env_values = true, global = true)]
    pub secret_id: Option<String>,

    /// Backend role for Kubernetes authentication.
    #[arg(long, env = "VAULT_K8S_ROLE", global = true)]
    pub kubernetes_role: Option<String>,

    /// Service-account token file for Kubernetes authentication.
    #[arg(long, env = "VAULT_K8S_TOKEN_PATH", global = true)]
    pub kubernetes_token_path: Option<PathBuf>,

    /// Signing endpoint path relative to /v1/.
    #[arg(long, env = "VAULT_SIGN_PATH", global = true)]
    pub sign_path: Option<String>,

    /// Log output format: text or json.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign a raw transaction and print the signed transaction.
    Sign {
        /// Key name or address the backend signs with.
        #[arg(long)]
        key_name: String,

        /// Hex-encoded unsigned transaction.
        #[arg(long)]
        raw_transaction: String,

        /// Leave the session token valid on exit instead of revoking it.
        #[arg(long)]
        keep_token: bool,
    },
    /// Validate configuration and credential selection, then exit.
    CheckConfig,
}

impl Args {
    /// Merge the optional config file with flag and environment overrides.
    pub fn signer_config(&self) -> Result<SignerConfig> {
        let mut config = match &self.config {
            Some(path) => SignerConfig::from_file(path)?,
            None => SignerConfig::default(),
        };

        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = Some(namespace.clone());
        }
        if let Some(ca_file) = &self.ca_file {
            config.ca_file = Some(ca_file.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(sign_path) = &self.sign_path {
            config.sign_path = sign_path.clone();
        }

        let auth = &mut config.auth;
        if let Some(method) = self.auth_method {
            auth.method = Some(method.into());
        }
        if let Some(role_id) = &self.role_id {
            auth.role_id = Some(role_id.clone());
        }
        if let Some(secret_id) = &self.secret_id {
            auth.secret_id = Some(SecretString::new(secret_id.clone()));
        }
        if let Some(role) = &self.kubernetes_role {
            auth.kubernetes_role = Some(role.clone());
        }
        if let Some(path) = &self.kubernetes_token_path {
            auth.kubernetes_token_path = path.clone();
        }

        Ok(config)
    }
}
