//! Durable edge lifecycle. Owns every row in `live_edges` and enforces the
//! two structural invariants: at most one non-expired row per detection key,
//! and status only ever moves active -> fading -> expired.
//!
//! Persistence failures on a single edge are logged and counted; they never
//! abort the rest of the reconcile pass.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::{EXPIRY_GRACE_MS, FADING_RATIO};
use crate::db::models::LiveEdgeRow;
use crate::detector::DetectionBatch;
use crate::error::Result;
use crate::types::{now_ms, DetectionResult, EdgeKey, EdgeStatus, Game, ReconcileStats, SweepStats};

pub struct LifecycleManager {
    pool: sqlx::SqlitePool,
}

impl LifecycleManager {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Reconcile: fold one detection pass into the durable rows
    // -----------------------------------------------------------------------

    /// Apply a detection batch for one game. Deduplicates candidates per key
    /// (last wins), creates or refreshes rows, and fades active edges whose
    /// evaluated magnitude has decayed past the fading ratio. Keys the
    /// detector could not evaluate this pass are left untouched.
    pub async fn reconcile_game(&self, game: &Game, batch: &DetectionBatch) -> ReconcileStats {
        let ts = now_ms();
        let mut stats = ReconcileStats::default();

        // Within-cycle dedup, last candidate wins.
        let mut deduped: HashMap<EdgeKey, &DetectionResult> = HashMap::new();
        for result in &batch.results {
            deduped.insert(result.key(), result);
        }
        stats.detected = deduped.len() as u64;

        // expires_at holds the commence time itself; the grace window is
        // applied when the sweep runs, not baked into the stored deadline.
        let expires_at_ms = game.commence_time_ms;

        for (key, &result) in &deduped {
            match self.upsert_edge(game, result, expires_at_ms, ts).await {
                Ok(Upsert::Created) => stats.created += 1,
                Ok(Upsert::Refreshed) => stats.refreshed += 1,
                Ok(Upsert::Unchanged) => stats.unchanged += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        game_id = %game.id,
                        outcome_key = %key.outcome_key,
                        edge_type = %key.edge_type,
                        error = %e,
                        "failed to persist edge, continuing"
                    );
                }
            }
        }

        match self.fade_decayed(game, &batch.evaluated, ts).await {
            Ok(faded) => stats.faded = faded,
            Err(e) => {
                stats.failed += 1;
                warn!(game_id = %game.id, error = %e, "fade pass failed, continuing");
            }
        }

        debug!(
            game_id = %game.id,
            detected = stats.detected,
            created = stats.created,
            refreshed = stats.refreshed,
            faded = stats.faded,
            failed = stats.failed,
            "reconciled game"
        );
        stats
    }

    async fn upsert_edge(
        &self,
        game: &Game,
        result: &DetectionResult,
        expires_at_ms: Option<i64>,
        ts: i64,
    ) -> Result<Upsert> {
        let existing = self
            .live_row(&game.id, result.market_type.to_string(), &result.outcome_key, result.edge_type.to_string())
            .await?;

        match existing {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO live_edges
                        (game_id, market_type, outcome_key, edge_type,
                         initial_value, current_value, magnitude, percentage,
                         triggering_book, best_current_book, sharp_book_line,
                         status, confidence, notes,
                         detected_at_ms, expires_at_ms, created_at_ms, updated_at_ms)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&game.id)
                .bind(result.market_type.to_string())
                .bind(&result.outcome_key)
                .bind(result.edge_type.to_string())
                .bind(result.initial_value)
                .bind(result.current_value)
                .bind(result.magnitude)
                .bind(result.percentage)
                .bind(&result.triggering_book)
                .bind(&result.best_current_book)
                .bind(result.sharp_book_line)
                .bind(result.confidence)
                .bind(&result.rationale)
                .bind(ts)
                .bind(expires_at_ms)
                .bind(ts)
                .bind(ts)
                .execute(&self.pool)
                .await?;
                Ok(Upsert::Created)
            }
            Some(row) => {
                // Re-detection of an existing key refreshes current readings
                // only. detected_at, initial_value and the detection-time
                // magnitude are immutable history; status is left alone so a
                // fading edge cannot silently revive.
                let unchanged = row.current_value == result.current_value
                    && row.confidence == result.confidence
                    && row.percentage == result.percentage
                    && row.best_current_book == result.best_current_book
                    && row.sharp_book_line == result.sharp_book_line;
                if unchanged {
                    return Ok(Upsert::Unchanged);
                }
                sqlx::query(
                    r#"
                    UPDATE live_edges SET
                        current_value = ?, percentage = ?, confidence = ?,
                        best_current_book = ?, sharp_book_line = ?, notes = ?,
                        updated_at_ms = ?
                    WHERE id = ?
                    "#,
                )
                .bind(result.current_value)
                .bind(result.percentage)
                .bind(result.confidence)
                .bind(&result.best_current_book)
                .bind(result.sharp_book_line)
                .bind(&result.rationale)
                .bind(ts)
                .bind(row.id)
                .execute(&self.pool)
                .await?;
                Ok(Upsert::Refreshed)
            }
        }
    }

    /// Move active edges to fading when their re-evaluated magnitude is at or
    /// below `FADING_RATIO` of the magnitude recorded at detection time.
    /// Only keys the detector actually evaluated this pass are considered;
    /// missing data must not read as decay.
    async fn fade_decayed(
        &self,
        game: &Game,
        evaluated: &HashMap<EdgeKey, f64>,
        ts: i64,
    ) -> Result<u64> {
        let rows = sqlx::query_as::<_, LiveEdgeRow>(
            "SELECT * FROM live_edges WHERE game_id = ? AND status = 'active'",
        )
        .bind(&game.id)
        .fetch_all(&self.pool)
        .await?;

        let mut faded = 0u64;
        for row in rows {
            let Some(edge_type) = row.edge_type() else { continue };
            let Some(market_type) = crate::types::MarketType::parse(&row.market_type) else {
                continue;
            };
            let key = EdgeKey {
                market_type,
                outcome_key: row.outcome_key.clone(),
                edge_type,
            };
            let Some(&current) = evaluated.get(&key) else { continue };
            if row.magnitude > 0.0 && current <= row.magnitude * FADING_RATIO {
                sqlx::query(
                    r#"
                    UPDATE live_edges
                    SET status = 'fading', faded_at_ms = ?, updated_at_ms = ?
                    WHERE id = ? AND status = 'active'
                    "#,
                )
                .bind(ts)
                .bind(ts)
                .bind(row.id)
                .execute(&self.pool)
                .await?;
                faded += 1;
                debug!(
                    game_id = %game.id,
                    outcome_key = %row.outcome_key,
                    edge_type = %row.edge_type,
                    original = row.magnitude,
                    current,
                    "edge fading"
                );
            }
        }
        Ok(faded)
    }

    // -----------------------------------------------------------------------
    // Expiry
    // -----------------------------------------------------------------------

    /// Periodic pass: expire every non-expired edge whose commence time is
    /// more than the grace window in the past. Edges without a deadline
    /// (unknown commence time) never expire by time.
    pub async fn sweep(&self, ts: i64) -> Result<SweepStats> {
        let examined: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM live_edges WHERE status != 'expired'",
        )
        .fetch_one(&self.pool)
        .await?;

        let expired = sqlx::query(
            r#"
            UPDATE live_edges
            SET status = 'expired', expired_at_ms = ?, updated_at_ms = ?
            WHERE status != 'expired'
              AND expires_at_ms IS NOT NULL
              AND expires_at_ms + ? <= ?
            "#,
        )
        .bind(ts)
        .bind(ts)
        .bind(EXPIRY_GRACE_MS)
        .bind(ts)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(SweepStats {
            examined: examined as u64,
            expired,
            unchanged: (examined as u64).saturating_sub(expired),
        })
    }

    /// Immediately expire every non-expired edge for a game that has started,
    /// regardless of the grace deadline.
    pub async fn expire_game(&self, game_id: &str, ts: i64) -> Result<u64> {
        let expired = sqlx::query(
            r#"
            UPDATE live_edges
            SET status = 'expired', expired_at_ms = ?, updated_at_ms = ?
            WHERE game_id = ? AND status != 'expired'
            "#,
        )
        .bind(ts)
        .bind(ts)
        .bind(game_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(expired)
    }

    // -----------------------------------------------------------------------
    // Read paths
    // -----------------------------------------------------------------------

    pub async fn edges_for_game(&self, game_id: &str) -> Result<Vec<LiveEdgeRow>> {
        let rows = sqlx::query_as::<_, LiveEdgeRow>(
            "SELECT * FROM live_edges WHERE game_id = ? ORDER BY confidence DESC, detected_at_ms DESC",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Filtered listing for the API. All filters optional.
    pub async fn list_edges(&self, filter: &EdgeFilter<'_>, limit: i64) -> Result<Vec<LiveEdgeRow>> {
        let mut sql = String::from(
            "SELECT e.* FROM live_edges e JOIN games g ON g.id = e.game_id WHERE 1=1",
        );
        if filter.status.is_some() {
            sql.push_str(" AND e.status = ?");
        }
        if filter.edge_type.is_some() {
            sql.push_str(" AND e.edge_type = ?");
        }
        if filter.sport.is_some() {
            sql.push_str(" AND g.sport = ?");
        }
        if filter.min_confidence.is_some() {
            sql.push_str(" AND e.confidence >= ?");
        }
        sql.push_str(" ORDER BY e.confidence DESC, e.detected_at_ms DESC LIMIT ?");

        let mut query = sqlx::query_as::<_, LiveEdgeRow>(&sql);
        if let Some(s) = filter.status {
            query = query.bind(s.to_string());
        }
        if let Some(et) = filter.edge_type {
            query = query.bind(et.to_string());
        }
        if let Some(s) = filter.sport {
            query = query.bind(s.to_string());
        }
        if let Some(c) = filter.min_confidence {
            query = query.bind(c);
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn live_row(
        &self,
        game_id: &str,
        market_type: String,
        outcome_key: &str,
        edge_type: String,
    ) -> Result<Option<LiveEdgeRow>> {
        let row = sqlx::query_as::<_, LiveEdgeRow>(
            r#"
            SELECT * FROM live_edges
            WHERE game_id = ? AND market_type = ? AND outcome_key = ? AND edge_type = ?
              AND status != 'expired'
            "#,
        )
        .bind(game_id)
        .bind(market_type)
        .bind(outcome_key)
        .bind(edge_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

enum Upsert {
    Created,
    Refreshed,
    Unchanged,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeFilter<'a> {
    pub status: Option<EdgeStatus>,
    pub edge_type: Option<crate::types::EdgeType>,
    pub sport: Option<&'a str>,
    pub min_confidence: Option<f64>,
}
