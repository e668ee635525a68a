use std::path::Path;
use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{error, info};

use hnc_webhook::{
    Config, Forest, KubeServerClient, Validator, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH,
    default_type_syncers, run_hierarchy_mirror, run_namespace_mirror, run_object_mirror,
    run_webhook_server,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install the TLS crypto provider before any TLS operations
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider and no provider is available".into());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hnc_webhook=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    info!("Starting hnc-webhook");

    let config = Config::from_env()?;
    info!(
        excluded = ?config.excluded_namespaces,
        managed_labels = config.managed_labels.len(),
        managed_annotations = config.managed_annotations.len(),
        "Loaded configuration"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let syncers = default_type_syncers();
    let mut forest = Forest::new();
    forest.set_excluded_namespaces(config.excluded_namespaces.iter().cloned());
    for syncer in &syncers {
        forest.add_type_syncer(syncer.clone());
    }
    let forest = forest.shared();

    let namespace_handle = tokio::spawn(run_namespace_mirror(client.clone(), forest.clone()));
    let hierarchy_handle = tokio::spawn(run_hierarchy_mirror(client.clone(), forest.clone()));
    let mut object_mirrors = JoinSet::new();
    for syncer in syncers {
        object_mirrors.spawn(run_object_mirror(client.clone(), forest.clone(), syncer.gvk));
    }

    // Start webhook server if TLS certificates are available
    let webhook_handle =
        if Path::new(WEBHOOK_CERT_PATH).exists() && Path::new(WEBHOOK_KEY_PATH).exists() {
            info!("TLS certificates found, starting webhook server");
            let validator = Validator::new(
                forest.clone(),
                Arc::new(KubeServerClient::new(client.clone())),
                Arc::new(config),
            );
            Some(tokio::spawn(async move {
                if let Err(e) = run_webhook_server(validator, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH).await {
                    error!("Webhook server error: {}", e);
                }
            }))
        } else {
            info!(
                "TLS certificates not found at {} and {}, webhook server disabled",
                WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH
            );
            None
        };

    // Create a future that monitors the webhook handle (if it exists)
    let webhook_future = async {
        if let Some(handle) = webhook_handle {
            if let Err(e) = handle.await {
                error!("Webhook server task panicked: {}", e);
            }
        } else {
            // No webhook server, wait forever
            std::future::pending::<()>().await;
        }
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = namespace_handle => {
            if let Err(e) = result {
                error!("Namespace mirror task panicked: {}", e);
            }
        }
        result = hierarchy_handle => {
            if let Err(e) = result {
                error!("Hierarchy mirror task panicked: {}", e);
            }
        }
        Some(result) = object_mirrors.join_next() => {
            if let Err(e) = result {
                error!("Object mirror task panicked: {}", e);
            }
        }
        _ = webhook_future => {
            // Webhook server exited (either panic or normal exit)
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, shutting down");
        }
    }

    info!("hnc-webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
