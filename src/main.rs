// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use appgw_ingress::{
    azure::{attach_route_table, wait_for_gateway, ArmGatewayClient, GatewayClient},
    cache::{
        handlers::{spawn_informers, EventHandler},
        ResourceCache, SnapshotSource, StoreWriters,
    },
    config::ControllerConfig,
    constants::CONTROLLER_NAME,
    controller_errors::{ControllerError, ErrorCode},
    events::{run_periodic_reconcile, ControllerEvent, EventBus},
    http_server::{self, HealthState},
    reconciler::Reconciler,
    recorder::{EventPublisher, KubeEventPublisher},
    status::KubeIngressStatusClient,
    worker::{run_worker, WorkerSettings},
};
use clap::Parser;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

/// Why the controller stopped serving.
enum Stopped {
    Signal,
    Worker(Result<Result<(), ControllerError>, JoinError>),
    Server(Result<Result<()>, JoinError>),
}

fn main() -> Result<()> {
    // Process-wide rustls crypto provider for the ARM client; already set is fine
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("appgw-ingress")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// `EnvFilter` directive: `RUST_LOG` when set, otherwise derived from the verbosity level.
fn log_directive(rust_log: Option<String>, config: &ControllerConfig) -> String {
    rust_log
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| config.log_filter().to_string())
}

fn init_tracing(config: &ControllerConfig) {
    // Format: timestamp file:line LEVEL message
    //
    // RUST_LOG overrides APPGW_VERBOSITY_LEVEL; RUST_LOG_FORMAT=json switches to JSON lines
    let env_filter =
        tracing_subscriber::EnvFilter::new(log_directive(std::env::var("RUST_LOG").ok(), config));
    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

/// Fail when an explicitly watched namespace does not exist.
async fn ensure_namespaces_exist(
    client: &Client,
    namespaces: &[String],
) -> Result<(), ControllerError> {
    let api: Api<Namespace> = Api::all(client.clone());
    for namespace in namespaces {
        let found = api.get_opt(namespace).await.map_err(|e| {
            ControllerError::with_inner(
                ErrorCode::NoSuchNamespace,
                format!("Unable to look up watched namespace {namespace}"),
                e,
            )
        })?;
        if found.is_none() {
            return Err(ControllerError::new(
                ErrorCode::NoSuchNamespace,
                format!("Watched namespace {namespace} does not exist"),
            ));
        }
        debug!(namespace = %namespace, "Watched namespace exists");
    }
    Ok(())
}

/// Resolve on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Unable to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}

async fn async_main() -> Result<()> {
    let config = Arc::new(ControllerConfig::parse());
    init_tracing(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Application Gateway Ingress Controller"
    );
    let coordinates = config
        .validate()
        .context("Invalid controller configuration")?;
    debug!(gateway = %coordinates.resource_id(), "Configuration validated");
    if config.enable_istio {
        warn!("Istio integration requested but not supported, only Ingress resources are watched");
    }

    let health = Arc::new(HealthState::new());
    let mut server = tokio::spawn(http_server::start_server(
        config.http_service_port,
        Arc::clone(&health),
    ));

    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("Unable to create Kubernetes client")?;
    ensure_namespaces_exist(&client, &config.watch_namespaces()).await?;

    let arm: Arc<dyn GatewayClient> = Arc::new(ArmGatewayClient::new(&config, &coordinates)?);
    let gateway = wait_for_gateway(
        arm.as_ref(),
        config.startup_retry_attempts,
        Duration::from_secs(config.startup_retry_interval_seconds),
    )
    .await
    .with_context(|| format!("Unable to reach Application Gateway {}", coordinates.resource_id()))?;
    info!(
        gateway = %coordinates.resource_id(),
        state = gateway.operational_state().unwrap_or("unknown"),
        "Application Gateway reachable"
    );
    if let Some(route_table) = &config.route_table_id {
        if let Err(e) = attach_route_table(arm.as_ref(), &gateway, route_table).await {
            warn!(error = %e, "Unable to associate gateway subnet with route table");
        }
    }
    health.set_ready(true);

    let writers = StoreWriters::new();
    let stores = writers.stores();
    let cache = Arc::new(ResourceCache::new(stores.clone()));
    let bus = Arc::new(EventBus::default());
    let handler = Arc::new(EventHandler::new(
        Arc::clone(&cache),
        Arc::clone(&bus),
        Arc::clone(&config),
    ));
    let informers = spawn_informers(&client, writers, &handler, &config);

    info!("Waiting for informers to sync");
    stores
        .wait_until_ready()
        .await
        .context("Informer stopped before its initial sync")?;
    info!("Informers synced");

    let publisher: Arc<dyn EventPublisher> = Arc::new(KubeEventPublisher::new(
        client.clone(),
        CONTROLLER_NAME,
        config.pod_name.clone(),
    ));
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&config),
        &coordinates,
        Arc::clone(&cache) as Arc<dyn SnapshotSource>,
        arm,
        Arc::new(KubeIngressStatusClient::new(client.clone())),
        publisher,
    ));

    // Startup sync
    bus.push(ControllerEvent::periodic());
    let periodic = tokio::spawn(run_periodic_reconcile(
        Arc::clone(&bus),
        Duration::from_secs(config.reconcile_period_seconds),
    ));
    let mut worker = tokio::spawn(run_worker(
        Arc::clone(&bus),
        reconciler,
        WorkerSettings::default(),
    ));

    let stopped = tokio::select! {
        () = shutdown_signal() => Stopped::Signal,
        joined = &mut worker => Stopped::Worker(joined),
        joined = &mut server => Stopped::Server(joined),
    };

    let result = match stopped {
        Stopped::Signal => {
            info!("Shutting down, finishing in-flight reconcile");
            bus.close();
            match worker.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::new(e)),
                Err(e) => Err(anyhow::Error::new(e).context("Worker task panicked")),
            }
        }
        Stopped::Worker(Ok(Ok(()))) => Err(anyhow::anyhow!("Worker exited unexpectedly without error")),
        Stopped::Worker(Ok(Err(e))) => {
            error!(code = e.code.as_str(), "CRITICAL: Worker stopped on a fatal error");
            Err(anyhow::Error::new(e).context("Gateway update failed"))
        }
        Stopped::Worker(Err(e)) => Err(anyhow::Error::new(e).context("Worker task panicked")),
        Stopped::Server(joined) => {
            bus.close();
            match joined {
                Ok(Ok(())) => Err(anyhow::anyhow!("HTTP server exited unexpectedly without error")),
                Ok(Err(e)) => Err(e.context("HTTP server stopped")),
                Err(e) => Err(anyhow::Error::new(e).context("HTTP server task panicked")),
            }
        }
    };

    periodic.abort();
    for informer in informers {
        informer.abort();
    }
    info!("Application Gateway Ingress Controller stopped");
    result
}
