//! zabbix-init - one-shot provisioning of a Zabbix server
//!
//! Configuration comes from the environment, optionally pre-loaded from
//! `zabbix-init-config.local.env` / `zabbix-init-config.env`. Exit code 0 on
//! success, 1 on any fatal failure.

use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use zabbix_init::{config, ReconcileReport, Reconciler, Settings, ZabbixApi};

async fn run() -> Result<ReconcileReport> {
    config::load_env_file().context("Failed to load env file")?;
    let settings = Settings::from_env().context("Invalid configuration")?;
    info!(
        "Provisioning host '{}' on {}",
        settings.hostname,
        settings.api_endpoint()
    );
    if settings.allow_insecure_tls {
        warn!("TLS certificate verification is disabled (ZABBIX_INSECURE_TLS)");
    }

    let api = ZabbixApi::new(&settings).context("Failed to create API client")?;
    let report = Reconciler::new(api, &settings)
        .run()
        .await
        .context("Provisioning failed")?;
    Ok(report)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("zabbix_init=info")),
        )
        .init();

    match run().await {
        Ok(report) => {
            info!(
                "Done: {} created, {} updated, {} unchanged, {} warning(s)",
                report.created.len(),
                report.updated.len(),
                report.unchanged.len(),
                report.warnings.len()
            );
            if report.is_noop() {
                info!("Nothing to do, the server was already provisioned");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
