//! warden-sweeper: removes expired authorization codes and tokens from the
//! PostgreSQL store on a fixed interval.
//!
//! `warden-sweeper --once` runs a single sweep and exits, for cron-style
//! scheduling.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use warden_db::{log_pool_metrics, Database, PoolConfig};
use warden_oauth::{ExpirySweeper, SweeperConfig, SweeperEvent, TokenStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "warden_oauth=info,warden_db=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warden_oauth=info,warden_db=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("warden-sweeper.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/warden".to_string());
    let config = SweeperConfig::from_env();

    info!("Connecting to database...");
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
    info!("Database connected");

    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    let store: Arc<dyn TokenStore> = Arc::new(db.store.clone());

    if std::env::args().any(|a| a == "--once") {
        let stats = ExpirySweeper::new(store, config).run_once().await?;
        info!(
            codes_deleted = stats.codes_deleted,
            tokens_deleted = stats.tokens_deleted(),
            "Single sweep complete"
        );
        log_pool_metrics(db.pool());
        return Ok(());
    }

    if !config.enabled {
        info!("Expiry sweeper is disabled (WARDEN_SWEEP_ENABLED=false), exiting");
        return Ok(());
    }

    let handle = ExpirySweeper::new(store, config).start();
    let mut events = handle.events();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal?;
                info!("Shutdown signal received");
                break;
            }
            event = events.recv() => match event {
                Ok(SweeperEvent::Swept(_)) => log_pool_metrics(db.pool()),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Sweeper event receiver lagged");
                }
                Err(RecvError::Closed) => {
                    warn!("Sweeper stopped unexpectedly");
                    return Ok(());
                }
            },
        }
    }
    handle.shutdown().await?;

    // Wait briefly for the loop to finish its current sweep.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while let Ok(event) = events.recv().await {
            if matches!(event, SweeperEvent::Stopped) {
                break;
            }
        }
    })
    .await;

    info!("warden-sweeper stopped");
    Ok(())
}
