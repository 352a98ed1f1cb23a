//! Park Payments service entry point.
//!
//! Loads configuration, wires adapters into the settlement handlers, runs
//! the reconciliation sweep in the background and serves the HTTP API
//! until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use park_payments::adapters::memory::{FixedRateSource, InMemorySettlementRepository, MockGateway};
use park_payments::adapters::{
    build_router, BoundedGateway, BroadcastNotificationSink, HttpEnrollmentNotifier, HttpOptions,
    HttpRateSource, PayPalConfig, PayPalGateway, PayPalWebhookVerifier, PaymentAppState,
    PostgresDonationRepository, PostgresPaymentRepository, StripeConfig, StripeGateway,
    StripeWebhookVerifier, TracingAuditSink,
};
use park_payments::application::handlers::payment::{
    ReconciliationSweeper, SweepConfig, WebhookReconciler,
};
use park_payments::application::{
    CurrencyConverter, ExchangeRateCache, RecordLocks, SettlementEffects, StatusWriter,
};
use park_payments::config::{
    AppConfig, DatabaseConfig, PaymentConfig, ServerConfig, StorageBackend, ValidationError,
};
use park_payments::domain::payment::{Donation, PaymentRecord};
use park_payments::ports::{DonationRepository, PaymentRepository, ProviderGateway, RateSource};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Slack on top of the provider's own HTTP timeout before the pool gives up.
const CALL_TIMEOUT_SLACK: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Fail fast on bad configuration.
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        provider = %config.payment.default_provider,
        "Starting park-payments"
    );

    let (payments, donations) = build_storage(&config.database).await?;
    let gateway = build_gateway(&config.payment)?;

    let rate_source: Arc<dyn RateSource> = match &config.exchange.source_url {
        Some(url) => Arc::new(HttpRateSource::new(
            url.clone(),
            config.exchange.rate_key.clone(),
            config.exchange.timeout(),
        )),
        None => {
            tracing::info!(rate = %config.exchange.default_rate, "No exchange feed configured, using fixed rate");
            Arc::new(FixedRateSource(config.exchange.default_rate))
        }
    };
    let converter = CurrencyConverter::new(Arc::new(ExchangeRateCache::new(
        rate_source,
        config.exchange.cache_config(),
    )));

    let notifications = Arc::new(BroadcastNotificationSink::new(256));
    let effects = SettlementEffects {
        notifications: notifications.clone(),
        enrollments: Arc::new(HttpEnrollmentNotifier::new(
            config.enrollment.callback_url.clone(),
            config.enrollment.timeout(),
        )),
        audit: Arc::new(TracingAuditSink::new()),
    };
    let locks = Arc::new(RecordLocks::new());
    let payment_writer = StatusWriter::<PaymentRecord>::new(payments.clone(), effects.clone());
    let donation_writer = StatusWriter::<Donation>::new(donations.clone(), effects.clone());

    let mut reconciler = WebhookReconciler::new(
        payment_writer.clone(),
        donation_writer.clone(),
        locks.clone(),
    );
    if let Some(stripe) = &config.payment.stripe {
        reconciler = reconciler.with_verifier(Arc::new(
            StripeWebhookVerifier::new(stripe.webhook_secret.expose_secret().clone())
                .with_require_livemode(!stripe.sandbox_mode),
        ));
    }
    if let Some(paypal) = &config.payment.paypal {
        reconciler = reconciler.with_verifier(Arc::new(PayPalWebhookVerifier::new(
            paypal.webhook_secret.expose_secret().clone(),
        )));
    }

    // Background reconciliation sweep.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = ReconciliationSweeper::new(
        payment_writer,
        donation_writer,
        gateway.clone(),
        locks.clone(),
        SweepConfig {
            stuck_after: config.payment.stuck_processing_after(),
            interval: config.payment.sweep_interval(),
            batch_size: config.payment.sweep_batch_size,
            give_up_after: config.payment.abandon_processing_after(),
        },
    );
    let sweep_handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    let state = PaymentAppState {
        payments,
        donations,
        gateway,
        converter,
        effects,
        locks,
        reconciler: Arc::new(reconciler),
    };
    let app = build_router(
        state,
        &HttpOptions {
            request_timeout: config.server.request_timeout(),
            cors_origins: config.server.cors_origins_list(),
        },
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweep_handle.await {
        tracing::warn!(error = %e, "Reconciliation sweep task ended abnormally");
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if server.is_production() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_storage(
    database: &DatabaseConfig,
) -> Result<(Arc<PaymentRepository>, Arc<DonationRepository>), BoxError> {
    let StorageBackend::Postgres(url) = database.backend() else {
        tracing::warn!("No database configured, records are kept in memory only");
        let payments: Arc<PaymentRepository> = Arc::new(InMemorySettlementRepository::<PaymentRecord>::new());
        let donations: Arc<DonationRepository> = Arc::new(InMemorySettlementRepository::<Donation>::new());
        return Ok((payments, donations));
    };

    let pool = PgPoolOptions::new()
        .min_connections(database.min_connections)
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .idle_timeout(Some(database.idle_timeout()))
        .max_lifetime(Some(database.max_lifetime()))
        .connect(url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;
        tracing::info!("Migrations applied");
    }

    let payments: Arc<PaymentRepository> = Arc::new(PostgresPaymentRepository::new(pool.clone()));
    let donations: Arc<DonationRepository> = Arc::new(PostgresDonationRepository::new(pool));
    Ok((payments, donations))
}

fn build_gateway(payment: &PaymentConfig) -> Result<Arc<dyn ProviderGateway>, ValidationError> {
    let not_configured = || ValidationError::ProviderNotConfigured(payment.default_provider.clone());

    let bounded = match payment.default_provider.as_str() {
        "stripe" => {
            let settings = payment.stripe.as_ref().ok_or_else(not_configured)?;
            let mut stripe = StripeConfig::new(settings.api_key.expose_secret().clone())
                .with_timeout(settings.timeout());
            if let Some(url) = &settings.base_url {
                stripe = stripe.with_base_url(url.clone());
            }
            BoundedGateway::new(
                Arc::new(StripeGateway::new(stripe)),
                settings.max_concurrent_calls,
                settings.timeout() + CALL_TIMEOUT_SLACK,
            )
        }
        "paypal" => {
            let settings = payment.paypal.as_ref().ok_or_else(not_configured)?;
            let mut paypal = PayPalConfig::new(
                settings.client_id.clone(),
                settings.api_key.expose_secret().clone(),
                settings.sandbox_mode,
            )
            .with_timeout(settings.timeout());
            if let Some(url) = &settings.base_url {
                paypal = paypal.with_base_url(url.clone());
            }
            BoundedGateway::new(
                Arc::new(PayPalGateway::new(paypal)),
                settings.max_concurrent_calls,
                settings.timeout() + CALL_TIMEOUT_SLACK,
            )
        }
        "mock" => {
            tracing::warn!("Using the mock provider gateway; no money moves");
            BoundedGateway::new(Arc::new(MockGateway::default()), 8, Duration::from_secs(10))
        }
        other => return Err(ValidationError::UnknownProvider(other.to_string())),
    };

    Ok(Arc::new(bounded))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
