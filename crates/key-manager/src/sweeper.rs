//! Periodic expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::clock::Clock;
use crate::filter::FindOptions;
use crate::manager::ApiKeyManager;
use crate::store::ApiKeyStore;

/// Background task that deactivates expired keys on a fixed interval.
pub struct ExpirySweeper<S, C> {
    manager: Arc<ApiKeyManager<S, C>>,
    interval: Duration,
}

impl<S: ApiKeyStore, C: Clock> ExpirySweeper<S, C> {
    pub fn new(manager: Arc<ApiKeyManager<S, C>>, interval: Duration) -> Self {
        Self { manager, interval }
    }

    /// Run one sweep, logging instead of failing.
    pub fn sweep_once(&self) -> Option<u64> {
        match self.manager.inactive_many_by_end_date(&FindOptions::default()) {
            Ok(updated) => Some(updated),
            Err(e) => {
                log::error!("Failed to deactivate expired API keys: {}", e);
                None
            }
        }
    }

    /// Sweep immediately, then every `interval` until `shutdown` turns true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            // Check for shutdown signal
            if *shutdown.borrow() {
                return;
            }

            self.sweep_once();

            tokio::select! {
                changed = shutdown.changed() => {
                    // Sender gone counts as shutdown too
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::filter::ApiKeyFilter;
    use crate::manager::{CreateApiKey, ManagerConfig};
    use crate::record::ApiKeyType;
    use crate::store::InMemoryApiKeyStore;
    use chrono::{TimeZone, Utc};

    fn expired_manager() -> Arc<ApiKeyManager<InMemoryApiKeyStore, FixedClock>> {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let manager = ApiKeyManager::with_clock(
            ManagerConfig::new("test"),
            InMemoryApiKeyStore::new(),
            clock,
        );
        manager
            .create(CreateApiKey {
                name: "expired".to_string(),
                key_type: ApiKeyType::Default,
                start_date: Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()),
                end_date: Some(Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap()),
            })
            .unwrap();
        Arc::new(manager)
    }

    #[test]
    fn test_sweep_once() {
        let sweeper = ExpirySweeper::new(expired_manager(), Duration::from_secs(60));
        assert_eq!(sweeper.sweep_once(), Some(1));
        assert_eq!(sweeper.sweep_once(), Some(0));
    }

    #[tokio::test]
    async fn test_run_sweeps_and_stops_on_shutdown() {
        let manager = expired_manager();
        let sweeper = ExpirySweeper::new(manager.clone(), Duration::from_secs(3600));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { sweeper.run(rx).await });

        // The first sweep runs before the task starts waiting
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let active = manager
                    .get_total(&ApiKeyFilter::new().is_active(true), &FindOptions::default())
                    .unwrap();
                if active == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("sweep did not run");

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
