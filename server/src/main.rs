mod app;
mod config;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use checkpoint_client::{Gazetteer, NominatimClient, RecordSource};
use checkpoint_shared::LocalClock;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::state::{AppState, Services};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let gazetteer = match config::gazetteer_path() {
        Some(path) => match Gazetteer::load(&path) {
            Ok(gazetteer) => gazetteer,
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "failed to load gazetteer");
                return;
            }
        },
        None => Gazetteer::california(),
    };

    let user_agent = config::geocoder_user_agent();
    let http_client = match state::build_http_client(
        &user_agent,
        config::upstream_http_timeout(),
        config::upstream_connect_timeout(),
    ) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build HTTP client");
            return;
        }
    };

    let record_source_url = config::record_source_url();
    let geocoder_base_url = config::geocoder_base_url();
    let geocoder = match NominatimClient::new(http_client.clone(), &geocoder_base_url, &user_agent)
    {
        Ok(geocoder) => geocoder,
        Err(e) => {
            tracing::error!(error = %e, %user_agent, "GEOCODER_USER_AGENT is not a valid header");
            return;
        }
    };
    tracing::info!(
        record_source = %record_source_url,
        geocoder = %geocoder_base_url,
        "upstreams configured"
    );

    let (state, actor) = AppState::build(Services {
        record_source: RecordSource::new(http_client, record_source_url),
        geocoder: Arc::new(geocoder),
        gazetteer,
        clock: Arc::new(LocalClock),
        locator: config::locator_config(),
        command_buffer: config::map_command_buffer(),
    });

    // Spawn background services
    tokio::spawn(services::map_actor::run(actor));
    tokio::spawn(services::record_poller::run(state.clone()));

    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("Checkpoint map server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
