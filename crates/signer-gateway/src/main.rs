use crate::cli::{Args, Command, LogFormat};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use usg_signer_gateway::credential::load_credential;
use usg_signer_gateway::{SigningGateway, SigningRequest};

fn init_logging(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_format)?;

    let config = args
        .signer_config()
        .context("failed to load configuration")?;

    match args.command {
        Command::CheckConfig => {
            config.validate().context("invalid configuration")?;
            let credential = load_credential(&config.auth).context("failed to load credentials")?;
            println!(
                "configuration valid: {} authentication against {}",
                credential.kind(),
                config.address
            );
        }
        Command::Sign {
            key_name,
            raw_transaction,
            keep_token,
        } => {
            let gateway = SigningGateway::from_config(&config)
                .context("failed to initialize signing gateway")?;

            let request = SigningRequest::new(key_name, raw_transaction);
            let outcome = gateway.sign(&request).await;

            if !keep_token {
                if let Err(err) = gateway.tokens().revoke().await {
                    warn!(error = %err, "failed to revoke session token");
                }
            }

            let signed = outcome.context("failed to sign transaction")?;
            info!(key = %request.key_identifier, "signing complete");
            println!("Signed transaction: {}", signed.signed_transaction);
        }
    }

    Ok(())
}

mod cli;
