//! CloudOps Controller
//!
//! Reconciles managed cloud resources against the provider gateway:
//! - Vpc, Subnet, SecurityGroup, InternetGateway: network resources
//! - IamRole, RolePolicyAttachment: identity resources
//! - KubernetesCluster: control plane plus worker pool, provisioned in stages
//!
//! Resources reference each other through attribute references that are resolved
//! before provisioning. Connection details are published to Secrets.

mod adapters;
mod backoff;
mod config;
mod connecter;
mod controller;
mod error;
mod metrics;
mod server;
#[cfg(test)]
mod test_utils;
mod watcher;

use std::sync::Arc;

use config::ControllerConfig;
use controller::Controller;
use error::ControllerError;
use server::ServerState;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    // kube and reqwest both use rustls; ring is the provider compiled in
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting CloudOps Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", config.namespace);
    info!(
        "  Requeue: short {:?}, long {:?}",
        config.requeue.short_wait, config.requeue.long_wait
    );
    info!("  Pass timeout: {:?}", config.pass_timeout);
    info!("  Concurrency per kind: {}", config.concurrency);
    info!(
        "  Gateway endpoint override: {}",
        config.endpoint_override.as_deref().unwrap_or("none")
    );

    metrics::register_metrics().map_err(|e| ControllerError::Server(e.to_string()))?;

    let server_state = Arc::new(ServerState::default());
    let port = config.metrics_port;
    let probe_state = server_state.clone();
    tokio::spawn(async move {
        if let Err(e) = server::start_server(port, probe_state).await {
            error!("HTTP server failed: {}", e);
        }
    });

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    let signal_state = server_state.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal, stopping watchers");
        signal_state.mark_not_ready();
        signal_token.cancel();
    });

    let controller = Controller::new(config, shutdown).await?;
    server_state.mark_ready();
    controller.run().await?;

    info!("CloudOps Controller stopped");
    Ok(())
}
