//! Detection orchestration: runs the snapshot -> detect -> score -> reconcile
//! pipeline per game, with bounded concurrency across a cycle. One game's
//! failure never takes down the cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{stream, StreamExt};
use tracing::{debug, info, warn};

use crate::api::latency::LatencyStats;
use crate::config::Config;
use crate::detector::EdgeDetector;
use crate::error::{AppError, Result};
use crate::lifecycle::LifecycleManager;
use crate::scorer::{CeqScorer, GameCeq};
use crate::state::GameStore;
use crate::types::{now_ms, CycleSummary, Game, ReconcileStats};

/// Outcome of one game's pipeline run.
#[derive(Debug)]
pub struct GameReport {
    pub game_id: String,
    pub stats: ReconcileStats,
    pub ceq: GameCeq,
}

pub struct DetectionOrchestrator {
    pool: sqlx::SqlitePool,
    detector: EdgeDetector,
    manager: Arc<LifecycleManager>,
    store: Arc<GameStore>,
    latency: Arc<LatencyStats>,
    batch_size: usize,
    period_lookback_ms: Option<i64>,
    /// None disables the per-cycle time budget.
    cycle_budget: Option<Duration>,
}

impl DetectionOrchestrator {
    pub fn new(
        pool: sqlx::SqlitePool,
        config: &Config,
        manager: Arc<LifecycleManager>,
        store: Arc<GameStore>,
        latency: Arc<LatencyStats>,
    ) -> Self {
        Self {
            pool,
            detector: EdgeDetector::new(config.sharp_book.clone()),
            manager,
            store,
            latency,
            batch_size: config.detect_batch_size,
            period_lookback_ms: config.period_lookback_ms(),
            cycle_budget: (config.cycle_budget_secs > 0)
                .then(|| Duration::from_secs(config.cycle_budget_secs)),
        }
    }

    #[cfg(test)]
    fn with_cycle_budget(mut self, budget: Option<Duration>) -> Self {
        self.cycle_budget = budget;
        self
    }

    /// Full pipeline for a single game: load history, detect, score, and
    /// fold the results into the durable edge rows.
    pub async fn run_game(&self, game: &Game) -> Result<GameReport> {
        let started = Instant::now();
        let ts = now_ms();

        let snaps = crate::db::fetch_game_snapshots(&self.pool, &game.id).await?;
        let series = crate::aggregate::group_outcomes(snaps, ts, self.period_lookback_ms);
        let batch = self.detector.detect(&series);
        let ceq = CeqScorer::score_game(&game.id, &series, game.commence_time_ms, ts);
        let stats = self.manager.reconcile_game(game, &batch).await;

        self.latency.record_ms(started.elapsed().as_millis() as u64);
        debug!(
            game_id = %game.id,
            series = series.len(),
            detected = stats.detected,
            upserted = stats.upserted(),
            ceq_edges = ceq.edge_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "game pipeline complete"
        );
        Ok(GameReport { game_id: game.id.clone(), stats, ceq })
    }

    /// Run detection across every upcoming game, at most `batch_size` games
    /// in flight at once. A cycle that exceeds its time budget stops pulling
    /// games and abandons the remainder; completed games keep their results.
    pub async fn run_cycle(&self) -> CycleSummary {
        let games = self.store.upcoming(now_ms());
        let total = games.len() as u64;
        info!(games = total, concurrency = self.batch_size, "detection cycle starting");

        let deadline = self.cycle_budget.map(|b| tokio::time::Instant::now() + b);
        let mut summary = CycleSummary::default();
        let mut runs = stream::iter(games)
            .map(|game| async move {
                let report = self.run_game(&game).await;
                (game, report)
            })
            .buffer_unordered(self.batch_size);

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, runs.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        let settled = summary.games_processed + summary.games_failed;
                        summary.games_abandoned = total.saturating_sub(settled);
                        warn!(
                            abandoned = summary.games_abandoned,
                            processed = summary.games_processed,
                            "cycle budget exhausted, abandoning remaining games"
                        );
                        break;
                    }
                },
                None => runs.next().await,
            };
            let Some((game, report)) = next else { break };

            let per_sport = summary.per_sport.entry(game.sport.clone()).or_default();
            per_sport.games += 1;
            match report {
                Ok(report) => {
                    let ceq_edges = report.ceq.edge_count() as u64;
                    summary.games_processed += 1;
                    summary.detected += report.stats.detected;
                    summary.upserted += report.stats.upserted();
                    summary.faded += report.stats.faded;
                    summary.ceq_edges += ceq_edges;
                    per_sport.detected += report.stats.detected;
                    per_sport.upserted += report.stats.upserted();
                    per_sport.ceq_edges += ceq_edges;
                }
                Err(e) => {
                    summary.games_failed += 1;
                    warn!(game_id = %game.id, error = %e, "game pipeline failed, continuing cycle");
                }
            }
        }

        info!(
            processed = summary.games_processed,
            failed = summary.games_failed,
            abandoned = summary.games_abandoned,
            detected = summary.detected,
            upserted = summary.upserted,
            faded = summary.faded,
            ceq_edges = summary.ceq_edges,
            "detection cycle complete"
        );
        summary
    }

    /// The bulk trigger path: a full detection cycle, then force-expire
    /// edges for games that have started, then one lifecycle sweep.
    pub async fn run_bulk(&self) -> CycleSummary {
        let mut summary = self.run_cycle().await;
        let ts = now_ms();

        for game in self.store.started(ts) {
            match self.manager.expire_game(&game.id, ts).await {
                Ok(expired) => summary.expired_started += expired,
                Err(e) => warn!(game_id = %game.id, error = %e, "failed to expire started game"),
            }
        }
        match self.manager.sweep(ts).await {
            Ok(stats) => summary.sweep = stats,
            Err(e) => warn!(error = %e, "post-cycle sweep failed"),
        }
        summary
    }

    /// Resolve a game by id: memory first, database as fallback so manual
    /// triggers work for games the store has already evicted.
    pub async fn resolve_game(&self, game_id: &str) -> Result<Game> {
        if let Some(game) = self.store.get(game_id) {
            return Ok(game);
        }
        crate::db::fetch_game(&self.pool, game_id)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("unknown game_id: {game_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> sqlx::SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn test_config() -> Config {
        Config {
            odds_api_url: String::new(),
            odds_api_key: String::new(),
            log_level: "info".to_string(),
            db_path: ":memory:".to_string(),
            api_port: 0,
            sharp_book: "pinnacle".to_string(),
            cron_secret: String::new(),
            sports: vec![],
            detect_batch_size: 4,
            period_lookback_hours: 0.0,
            cycle_budget_secs: 120,
        }
    }

    fn game(id: &str) -> Game {
        Game {
            id: id.to_string(),
            sport: "basketball_nba".to_string(),
            home_team: "Home".to_string(),
            away_team: "Away".to_string(),
            commence_time_ms: None,
        }
    }

    async fn orchestrator() -> (DetectionOrchestrator, Arc<GameStore>, sqlx::SqlitePool) {
        let pool = test_pool().await;
        let store = GameStore::new();
        let manager = Arc::new(LifecycleManager::new(pool.clone()));
        let latency = LatencyStats::new();
        let orch = DetectionOrchestrator::new(
            pool.clone(),
            &test_config(),
            manager,
            store.clone(),
            latency,
        );
        (orch, store, pool)
    }

    #[tokio::test]
    async fn cycle_settles_every_game_within_budget() {
        let (orch, store, _pool) = orchestrator().await;
        store.add_games(vec![game("g1"), game("g2")]);

        let summary = orch.run_cycle().await;
        assert_eq!(summary.games_processed, 2);
        assert_eq!(summary.games_failed, 0);
        assert_eq!(summary.games_abandoned, 0);
    }

    #[tokio::test]
    async fn exhausted_budget_abandons_queued_games() {
        let (orch, store, _pool) = orchestrator().await;
        store.add_games(vec![game("g1"), game("g2"), game("g3")]);

        let orch = orch.with_cycle_budget(Some(Duration::ZERO));
        let summary = orch.run_cycle().await;
        let settled =
            summary.games_processed + summary.games_failed + summary.games_abandoned;
        assert_eq!(settled, 3);
        assert!(summary.games_abandoned >= 1, "a zero budget must abandon work");
    }

    #[tokio::test]
    async fn no_budget_never_abandons() {
        let (orch, store, _pool) = orchestrator().await;
        store.add_games(vec![game("g1")]);

        let orch = orch.with_cycle_budget(None);
        let summary = orch.run_cycle().await;
        assert_eq!(summary.games_processed, 1);
        assert_eq!(summary.games_abandoned, 0);
    }

    #[tokio::test]
    async fn cycle_summary_carries_ceq_edge_totals() {
        let (orch, store, pool) = orchestrator().await;
        let g = game("g1");
        store.add_game(g.clone());

        // A steady one-directional spread move at standard juice scores the
        // home outcome above the lean band and fires line-movement detection.
        let ts = now_ms();
        let snap = |line: f64, at_ms: i64| crate::types::PriceSnapshot {
            game_id: g.id.clone(),
            market_type: crate::types::MarketType::Spread,
            period: crate::types::Period::Full,
            book: "alpha".to_string(),
            outcome: "home".to_string(),
            line: Some(line),
            price: -110,
            snapshot_at_ms: at_ms,
        };
        crate::db::insert_snapshots(
            &pool,
            &[
                snap(-7.0, ts - 7_200_000),
                snap(-6.5, ts - 5_400_000),
                snap(-6.0, ts - 3_600_000),
            ],
        )
        .await
        .unwrap();

        let summary = orch.run_cycle().await;
        assert_eq!(summary.games_processed, 1);
        assert!(summary.detected >= 1);
        assert!(summary.ceq_edges >= 1, "the scored outcome must count as an edge");
        let nba = summary.per_sport.get("basketball_nba").unwrap();
        assert_eq!(nba.ceq_edges, summary.ceq_edges);
    }
}
