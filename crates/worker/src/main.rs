use std::sync::Arc;
use std::time::Duration;

use medwatch_events::{EmailConfig, EmailDelivery, ExpoPushSender, NotificationFanout, PushConfig};
use medwatch_pipeline::{SyncConfig, SyncOrchestrator};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod scheduler;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medwatch_worker=debug,medwatch_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let period = std::env::var("SYNC_INTERVAL_SECS")
        .ok()
        .map(|v| v.parse::<u64>().expect("SYNC_INTERVAL_SECS must be a valid u64"))
        .map(Duration::from_secs)
        .unwrap_or(scheduler::DEFAULT_INTERVAL);
    let sync_config = SyncConfig::from_env().expect("Invalid sync configuration");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = medwatch_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    medwatch_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let push = ExpoPushSender::new(PushConfig::from_env()).expect("Failed to build push client");
    let mut fanout = NotificationFanout::new(pool.clone(), Arc::new(push))
        .with_min_interval(sync_config.fanout_min_interval);
    if let Some(email_config) = EmailConfig::from_env() {
        let email = EmailDelivery::new(email_config).expect("Invalid SMTP configuration");
        fanout = fanout.with_email(Arc::new(email));
    }

    let source = sync_config
        .source
        .build(sync_config.fetch_timeout)
        .expect("Failed to build registry source");
    let orchestrator = SyncOrchestrator::new(pool, source, fanout, sync_config);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    tracing::info!(interval_secs = period.as_secs(), "Sync worker started");
    scheduler::run_every(period, cancel, || scheduler::run_pass(&orchestrator)).await;
    tracing::info!("Sync worker stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
