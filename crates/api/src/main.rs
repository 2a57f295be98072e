//! API server entry point.

use std::error::Error;
use std::sync::Arc;

use api::config::{Config, LogFormat, PaymentProvider};
use fulfillment::{LoggingNotifier, PendingOrderSweeper, WebhookReconciler, run_maintenance};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{MockPaymentGateway, PaymentGateway, StripePaymentGateway};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Builds the services over `store` and serves until a shutdown signal.
async fn serve<S: Store>(
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), Box<dyn Error>> {
    let notifier = Arc::new(LoggingNotifier);
    let state = Arc::new(api::AppState::new(
        store.clone(),
        Arc::clone(&gateway),
        notifier.clone(),
        config.fulfillment_settings(),
    ));

    // Background sweeper and webhook redrive
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let maintenance = if config.sweep_interval.is_zero() {
        tracing::info!("maintenance task disabled");
        None
    } else {
        let ttl = chrono::Duration::from_std(config.pending_order_ttl)?;
        let sweeper = PendingOrderSweeper::new(store.clone(), ttl);
        let reconciler = WebhookReconciler::new(store, gateway, notifier)
            .with_max_redrive_attempts(config.webhook_max_attempts);
        Some(tokio::spawn(run_maintenance(
            sweeper,
            reconciler,
            config.sweep_interval,
            shutdown_rx,
        )))
    };

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = maintenance {
        handle.await?;
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env()?;
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    api::describe_metrics();

    // 3. Select the payment gateway
    let gateway: Arc<dyn PaymentGateway> = match &config.payment_provider {
        PaymentProvider::Mock => {
            tracing::warn!("using mock payment gateway");
            Arc::new(MockPaymentGateway::new())
        }
        PaymentProvider::Stripe(stripe) => Arc::new(StripePaymentGateway::new(stripe.clone())?),
    };
    tracing::info!(provider = gateway.provider(), "payment gateway selected");

    // 4. Select the store and serve
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url.expose_secret())
                .await?;
            let store = PostgresStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("connected to PostgreSQL");
            serve(store, gateway, &config, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            serve(InMemoryStore::new(), gateway, &config, metrics_handle).await
        }
    }
}
