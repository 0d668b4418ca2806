//! Recipe Service - Main Entry Point

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use recipe_service::{
    Config, PgConnector, RecipeWorkflow, router,
    shutdown::{ShutdownCoordinator, run_with_graceful_shutdown},
};
use rust_common::{TracingConfig, init_tracing};
use tokio::net::TcpListener;
use tracing::info;
use vault_pki_client::VaultClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    init_tracing(
        &TracingConfig::default()
            .with_service_name("recipe-service")
            .with_log_level(&config.log_level)
            .with_json_output(config.log_json),
    );

    info!("Starting Recipe Service");
    config.warn_on_misconfiguration();

    let issuer = VaultClient::new(config.vault.clone());
    let connector = PgConnector::new(config.database.clone());
    let workflow = RecipeWorkflow::new(
        Arc::new(issuer),
        Arc::new(connector),
        config.identity_request(),
    )
    .with_material_dir(&config.material_dir)
    .with_issue_timeout(config.issue_timeout);

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
    info!(addr = %listener.local_addr()?, "Recipe Service listening");

    let coordinator = ShutdownCoordinator::new();
    let server = axum::serve(listener, router(Arc::new(workflow)))
        .with_graceful_shutdown(coordinator.subscribe().recv())
        .into_future();

    run_with_graceful_shutdown(server, coordinator, config.shutdown_timeout).await?;

    info!("Recipe Service stopped");
    Ok(())
}
