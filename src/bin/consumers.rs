//! OAuth consumer registry server binary.
//!
//! Loads configuration, wires the identity gate, both protection layers and the
//! registry, then serves the consumer endpoints until interrupted.

use anyhow::Result;
use consumers::{
    config::Config,
    consumers::{
        HttpIdentityGate, IdentityGate, LocalSecretEncryptor, RegistrationService,
        RemoteSecretEncryptor, SecretProtector,
    },
    http::{AppState, build_router},
    storage::{create_storage_backend, parse_storage_backend},
};
use std::{env, sync::Arc};

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "consumers=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    let version = consumers::config::version()?;

    env::args().for_each(|arg| {
        if arg == "--version" {
            println!("{version}");
            std::process::exit(0);
        }
    });

    tracing::info!(?version, "Starting consumer registry");

    let config = Config::new()?;

    // Build HTTP client with certificate bundles
    let mut client_builder = reqwest::Client::builder();
    for ca_certificate in config.certificate_bundles.as_ref() {
        tracing::info!("Loading CA certificate: {:?}", ca_certificate);
        let cert = std::fs::read(ca_certificate)?;
        let cert = reqwest::Certificate::from_pem(&cert)?;
        client_builder = client_builder.add_root_certificate(cert);
    }

    let timeout = *config.http_client_timeout.as_ref();
    client_builder = client_builder
        .user_agent(config.user_agent.clone())
        .timeout(timeout);
    let http_client = client_builder.build()?;

    let identity_gate: Arc<dyn IdentityGate> = Arc::new(HttpIdentityGate::new(
        http_client.clone(),
        config.identity_authority_url.as_ref().clone(),
        timeout,
    ));

    // Remote layer first: it is the one that can fail for reasons outside this process
    let protectors: Vec<Arc<dyn SecretProtector>> = vec![
        Arc::new(RemoteSecretEncryptor::new(
            http_client.clone(),
            config.encryption_authority_url.as_ref().clone(),
            timeout,
        )),
        Arc::new(LocalSecretEncryptor::new(&config.local_encryption_key)),
    ];

    let storage_backend =
        parse_storage_backend(&config.storage_backend, config.database_url.as_deref())?;
    tracing::info!(backend = %config.storage_backend, "Opening consumer registry");
    let consumer_store = create_storage_backend(storage_backend).await?;

    let registration_service = Arc::new(RegistrationService::new(
        identity_gate.clone(),
        protectors,
        consumer_store.clone(),
        config.registration_scope.as_ref().clone(),
    ));

    let app_context = AppState {
        identity_gate,
        registration_service,
        consumer_store,
    };

    let app = build_router(app_context);

    // Setup graceful shutdown
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    {
        let tracker = tracker.clone();
        let inner_token = token.clone();

        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::spawn(async move {
            tokio::select! {
                () = inner_token.cancelled() => { },
                _ = terminate => {},
                _ = ctrl_c => {},
            }

            tracker.close();
            inner_token.cancel();
        });
    }

    // Start HTTP server
    {
        let http_port = *config.http_port.as_ref();
        let bind_address = format!("0.0.0.0:{http_port}");
        let listener = TcpListener::bind(&bind_address).await?;
        tracing::info!("Starting server on {bind_address}");

        let inner_token = token.clone();
        tracker.spawn(async move {
            let shutdown_token = inner_token.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_token.cancelled().await;
                    tracing::info!("axum graceful shutdown complete");
                })
                .await;
            if let Err(err) = result {
                tracing::error!("axum task failed: {}", err);
            }

            inner_token.cancel();
        });
    }

    tracker.wait().await;

    Ok(())
}
