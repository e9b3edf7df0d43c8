//! `resthost serve` -- run the configured services until Ctrl+C.

use std::path::Path;
use std::sync::Arc;

use resthost_core::LogSink;
use resthost_server::{read_host_config, ServiceHost};

use crate::console::ConsoleSink;
use crate::{controllers, CliError};

pub async fn run(config_path: &Path, service: Option<&str>) -> Result<(), CliError> {
    let config = read_host_config(config_path)?;
    let sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(ConsoleSink)];
    let mut host = ServiceHost::new(&config, &controllers::provisioner()?, sinks)?;

    host.start(service).await?;
    for running in host.services().iter().filter(|s| s.is_listening()) {
        for addr in running.local_addrs() {
            tracing::info!("[{}] Listening on http://{}/", running.name(), addr);
        }
    }

    shutdown_signal().await;
    host.stop(service)?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
