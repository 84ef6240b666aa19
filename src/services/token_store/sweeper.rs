//! Background sweep that physically removes expired token records.
//!
//! Lookups already ignore expired records; this only keeps the store from
//! growing without bound.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::token_store::TokenStore;

pub struct TokenSweeper {
    store: Arc<dyn TokenStore>,
    interval: Duration,
}

impl TokenSweeper {
    pub fn new(store: Arc<dyn TokenStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            backend = self.store.backend_name(),
            interval_secs = self.interval.as_secs(),
            "token sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("token sweeper shutting down");
                    return;
                }
            }

            self.sweep_once().await;
        }
    }

    /// One sweep. Failures are logged; the next tick tries again.
    pub async fn sweep_once(&self) -> u64 {
        match self.store.purge_expired().await {
            Ok(0) => 0,
            Ok(removed) => {
                debug!(removed, "purged expired tokens");
                removed
            }
            Err(err) => {
                warn!(error = %err, "token sweep failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::services::token_store::{CachedToken, MemoryTokenStore};

    #[tokio::test]
    async fn sweep_once_purges_expired_records() {
        let store = MemoryTokenStore::new();
        store
            .insert(CachedToken {
                token: "stale".to_string(),
                subject_id: "U1".to_string(),
                subject_name: "Alice".to_string(),
                role: "user".to_string(),
                expires_at: Utc::now() - ChronoDuration::seconds(5),
                created_at: Utc::now() - ChronoDuration::hours(1),
            })
            .await
            .unwrap();

        let sweeper = TokenSweeper::new(Arc::new(store.clone()), Duration::from_secs(60));
        assert_eq!(sweeper.sweep_once().await, 1);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let sweeper = TokenSweeper::new(
            Arc::new(MemoryTokenStore::new()),
            Duration::from_secs(3600),
        );
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(sweeper.run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
