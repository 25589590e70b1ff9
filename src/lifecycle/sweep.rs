//! Background expiry sweep. Runs on a fixed interval and also evicts
//! long-started games from the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::{EXPIRY_GRACE_MS, SWEEP_INTERVAL_SECS};
use crate::lifecycle::LifecycleManager;
use crate::state::GameStore;
use crate::types::now_ms;

pub struct SweepRunner {
    manager: Arc<LifecycleManager>,
    store: Arc<GameStore>,
}

impl SweepRunner {
    pub fn new(manager: Arc<LifecycleManager>, store: Arc<GameStore>) -> Self {
        Self { manager, store }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(interval_secs = SWEEP_INTERVAL_SECS, "lifecycle sweep started");
        loop {
            ticker.tick().await;
            let ts = now_ms();
            match self.manager.sweep(ts).await {
                Ok(stats) => {
                    if stats.expired > 0 {
                        info!(
                            examined = stats.examined,
                            expired = stats.expired,
                            "sweep expired edges"
                        );
                    }
                }
                Err(e) => error!(error = %e, "lifecycle sweep failed"),
            }
            let evicted = self.store.evict_started(ts - EXPIRY_GRACE_MS);
            if evicted > 0 {
                info!(evicted, "evicted started games from store");
            }
        }
    }
}
