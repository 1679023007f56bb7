//! Background removal of expired authorization codes and tokens.
//!
//! Expiry is already enforced at read time; the sweep only reclaims rows that
//! can no longer be used, so it is safe to run alongside issuance and
//! redemption.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

use warden_core::defaults::{SWEEPER_EVENT_CAPACITY, SWEEP_INTERVAL_SECS};
use warden_core::{CleanupStats, Error, Result, TokenStore};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Whether the background loop runs at all.
    pub enabled: bool,
    /// Seconds between sweeps.
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: SWEEP_INTERVAL_SECS,
        }
    }
}

impl SweeperConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WARDEN_SWEEP_ENABLED` | `true` | Enable/disable the expiry sweep |
    /// | `WARDEN_SWEEP_INTERVAL_SECS` | `300` | Seconds between sweeps |
    pub fn from_env() -> Self {
        let enabled = std::env::var("WARDEN_SWEEP_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let interval_secs = std::env::var("WARDEN_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(SWEEP_INTERVAL_SECS)
            .max(1);

        Self {
            enabled,
            interval_secs,
        }
    }

    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the sweeper.
#[derive(Debug, Clone)]
pub enum SweeperEvent {
    Started,
    /// A sweep completed.
    Swept(CleanupStats),
    /// A sweep failed; the loop keeps running.
    Failed(String),
    Stopped,
}

/// Handle for controlling a running sweeper.
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SweeperEvent>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop after the current sweep.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for sweeper events.
    pub fn events(&self) -> broadcast::Receiver<SweeperEvent> {
        self.event_rx.resubscribe()
    }
}

/// Periodically calls [`TokenStore::delete_expired`].
pub struct ExpirySweeper {
    store: Arc<dyn TokenStore>,
    config: SweeperConfig,
    event_tx: broadcast::Sender<SweeperEvent>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn TokenStore>, config: SweeperConfig) -> Self {
        let (event_tx, _) = broadcast::channel(SWEEPER_EVENT_CAPACITY);
        Self {
            store,
            config,
            event_tx,
        }
    }

    /// Run a single sweep.
    #[instrument(
        skip(self),
        fields(subsystem = "sweeper", component = "expiry_sweeper", op = "sweep")
    )]
    pub async fn run_once(&self) -> Result<CleanupStats> {
        let start = Instant::now();
        let stats = self.store.delete_expired(Utc::now()).await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        if stats.total() > 0 {
            info!(
                codes_deleted = stats.codes_deleted,
                tokens_deleted = stats.tokens_deleted(),
                duration_ms,
                "Expired grants removed"
            );
        } else {
            debug!(duration_ms, "Nothing expired");
        }
        Ok(stats)
    }

    /// Start the sweep loop and return a handle for control.
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        SweeperHandle {
            shutdown_tx,
            event_rx,
        }
    }

    #[instrument(skip(self, shutdown_rx), fields(subsystem = "sweeper", component = "expiry_sweeper"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Expiry sweeper is disabled, not starting");
            return;
        }

        info!(interval_secs = self.config.interval_secs, "Expiry sweeper started");
        let _ = self.event_tx.send(SweeperEvent::Started);

        let interval = Duration::from_secs(self.config.interval_secs);

        loop {
            match self.run_once().await {
                Ok(stats) => {
                    let _ = self.event_tx.send(SweeperEvent::Swept(stats));
                }
                Err(e) => {
                    error!(error = %e, "Expiry sweep failed");
                    let _ = self.event_tx.send(SweeperEvent::Failed(e.to_string()));
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Expiry sweeper received shutdown signal");
                    break;
                }
                _ = sleep(interval) => {}
            }
        }

        let _ = self.event_tx.send(SweeperEvent::Stopped);
        info!("Expiry sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;
    use warden_core::{AuthCode, Scope};
    use warden_db::InMemoryTokenStore;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn code(value: &str, ttl: ChronoDuration) -> AuthCode {
        let now = Utc::now();
        AuthCode {
            code: value.to_string(),
            client_id: "c1".to_string(),
            user_id: Some(Uuid::now_v7()),
            redirect_uri: "https://app.example/cb".to_string(),
            scope: Scope::parse("read"),
            state: None,
            code_challenge: None,
            expires_at: now + ttl,
            consumed: false,
            created_at: now,
        }
    }

    #[test]
    fn test_config_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("WARDEN_SWEEP_ENABLED", "false");
        std::env::set_var("WARDEN_SWEEP_INTERVAL_SECS", "0");
        let config = SweeperConfig::from_env();
        assert!(!config.enabled);
        assert_eq!(config.interval_secs, 1);

        std::env::remove_var("WARDEN_SWEEP_ENABLED");
        std::env::remove_var("WARDEN_SWEEP_INTERVAL_SECS");
        let config = SweeperConfig::from_env();
        assert!(config.enabled);
        assert_eq!(config.interval_secs, SWEEP_INTERVAL_SECS);
    }

    #[tokio::test]
    async fn test_run_once_removes_only_expired() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        store
            .put_auth_code(code("old", ChronoDuration::seconds(-5)))
            .await
            .unwrap();
        store
            .put_auth_code(code("live", ChronoDuration::minutes(5)))
            .await
            .unwrap();

        let sweeper = ExpirySweeper::new(Arc::clone(&store), SweeperConfig::default());
        let stats = sweeper.run_once().await.unwrap();
        assert_eq!(stats.codes_deleted, 1);
        assert!(store.get_auth_code("old").await.is_err());
        assert!(store.get_auth_code("live").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_sweeps_and_stops() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        store
            .put_auth_code(code("old", ChronoDuration::seconds(-5)))
            .await
            .unwrap();

        let handle = ExpirySweeper::new(store, SweeperConfig::default().with_interval(60)).start();
        let mut events = handle.events();

        assert!(matches!(events.recv().await.unwrap(), SweeperEvent::Started));
        match events.recv().await.unwrap() {
            SweeperEvent::Swept(stats) => assert_eq!(stats.codes_deleted, 1),
            other => panic!("unexpected event: {:?}", other),
        }
        // Second sweep after the interval elapses (time auto-advances).
        match events.recv().await.unwrap() {
            SweeperEvent::Swept(stats) => assert_eq!(stats.total(), 0),
            other => panic!("unexpected event: {:?}", other),
        }

        handle.shutdown().await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), SweeperEvent::Stopped));
    }
}
