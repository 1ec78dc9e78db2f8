use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{info, warn};

use super::{services, state::AppState};
use crate::config::Config;
use crate::engine::LeadEngine;
use crate::export::{ExportStorage, Exporter};
use crate::notify::{LogNotifier, NotificationDispatcher, Notifier, WebhookNotifier};
use crate::observability::Metrics;
use crate::store::FjallStore;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// All admin routes bound to `state`.
pub fn router(state: AppState) -> Router {
    let max_concurrent = state.config.server.max_concurrent_requests;

    Router::new()
        .route("/health", get(services::health))
        .route("/leads", post(services::create_lead).get(services::list_leads))
        .route("/leads/summary", get(services::lead_summary))
        .route("/leads/assign", post(services::assign_leads))
        .route("/leads/bulk", post(services::bulk_lead_action))
        .route("/leads/{lead_id}", get(services::get_lead))
        .route("/leads/{lead_id}/status", patch(services::update_lead_status))
        .route("/vendors", post(services::register_vendor).get(services::list_vendors))
        .route("/vendors/{vendor_id}", get(services::get_vendor))
        .route("/vendors/{vendor_id}/quota", post(services::adjust_vendor_quota))
        .with_state(state)
        // Automatically decompress gzip request bodies
        .layer(RequestDecompressionLayer::new())
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent))
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    info!(path = %config.server.data_path.display(), "Opening Fjall store");
    let store = FjallStore::open(&config.server.data_path)
        .map_err(|e| format!("Failed to open Fjall store: {}", e))?;
    let store = Arc::new(store);

    // Exports stay in memory until an object store backend is configured
    let exporter = Exporter::new(ExportStorage::in_memory(
        config.export.bucket.clone(),
        config.export.key_prefix.clone(),
    ));

    let metrics = Arc::new(Metrics::new());

    let (dispatcher, worker) = if config.notifications.enabled {
        let notifier: Arc<dyn Notifier> = match &config.notifications.webhook_url {
            Some(url) => {
                info!(%url, "Delivering notifications through webhook");
                Arc::new(WebhookNotifier::new(
                    url.clone(),
                    Duration::from_millis(config.notifications.webhook_timeout_ms),
                )?)
            }
            None => Arc::new(LogNotifier::new()),
        };
        let (dispatcher, handle) = NotificationDispatcher::spawn(
            notifier,
            store.clone(),
            metrics.clone(),
            config.notifications.dispatcher_settings(),
        );
        (dispatcher, Some(handle))
    } else {
        info!("Notifications disabled");
        (NotificationDispatcher::disabled(), None)
    };

    let engine = LeadEngine::new(
        store.clone(),
        store.clone(),
        exporter,
        dispatcher,
        metrics,
        config.engine_settings(),
    );

    let address = config.server.bind_addr;
    let app = router(AppState::new(config, engine));

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Leadflow API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last dispatcher sender, so the worker drains and exits
    if let Some(handle) = worker {
        if tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, handle).await.is_err() {
            warn!("Notification worker did not drain before shutdown");
        }
    }

    store.persist()?;
    info!("Store flushed, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
