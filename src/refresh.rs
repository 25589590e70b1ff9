//! Background odds sync. On each tick, pulls every configured sport's board,
//! upserts game metadata, appends snapshots, then kicks a detection cycle so
//! fresh prices are evaluated immediately.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::{Config, ODDS_REFRESH_INTERVAL_SECS};
use crate::error::Result;
use crate::fetcher::OddsFetcher;
use crate::orchestrator::DetectionOrchestrator;
use crate::state::GameStore;
use crate::types::now_ms;

pub struct OddsRefresher {
    fetcher: OddsFetcher,
    pool: sqlx::SqlitePool,
    store: Arc<GameStore>,
    orchestrator: Arc<DetectionOrchestrator>,
    sports: Vec<String>,
}

impl OddsRefresher {
    pub fn new(
        config: &Config,
        pool: sqlx::SqlitePool,
        store: Arc<GameStore>,
        orchestrator: Arc<DetectionOrchestrator>,
    ) -> Self {
        Self {
            fetcher: OddsFetcher::new(config),
            pool,
            store,
            orchestrator,
            sports: config.sports.clone(),
        }
    }

    /// One sync pass across every configured sport. Per-sport failures are
    /// logged and the remaining sports still sync.
    pub async fn sync_once(&self) -> u64 {
        let mut synced = 0u64;
        for sport in &self.sports {
            match self.sync_sport(sport).await {
                Ok(count) => synced += count,
                Err(e) => error!(sport = %sport, error = %e, "odds sync failed for sport"),
            }
        }
        synced
    }

    async fn sync_sport(&self, sport: &str) -> Result<u64> {
        let outcome = self.fetcher.fetch_sport(sport).await?;
        let ts = now_ms();

        for game in &outcome.games {
            crate::db::upsert_game(&self.pool, game, ts).await?;
        }
        let written = crate::db::insert_snapshots(&self.pool, &outcome.snapshots).await?;
        self.store.add_games(outcome.games);

        info!(
            sport,
            games = outcome.stats.games,
            snapshots = written,
            unknown_market = outcome.stats.unknown_market,
            bad_timestamp = outcome.stats.bad_timestamp,
            "odds sync complete"
        );
        Ok(outcome.stats.games)
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(ODDS_REFRESH_INTERVAL_SECS));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            interval_secs = ODDS_REFRESH_INTERVAL_SECS,
            sports = ?self.sports,
            "odds refresher started"
        );
        loop {
            ticker.tick().await;
            let synced = self.sync_once().await;
            if synced > 0 {
                self.orchestrator.run_cycle().await;
            }
        }
    }
}
