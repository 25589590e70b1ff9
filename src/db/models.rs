//! Database row types. Enum-typed columns are stored as their `Display`
//! strings and re-parsed on read; rows that fail to parse are treated as
//! malformed and logged by callers, never propagated into the detector.

use serde::Serialize;

use crate::types::{EdgeStatus, EdgeType, Game, MarketType, Period, PriceSnapshot};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GameRow {
    pub id: String,
    pub sport: String,
    pub home_team: String,
    pub away_team: String,
    pub commence_time_ms: Option<i64>,
    pub created_at_ms: i64,
}

impl GameRow {
    pub fn into_game(self) -> Game {
        Game {
            id: self.id,
            sport: self.sport,
            home_team: self.home_team,
            away_team: self.away_team,
            commence_time_ms: self.commence_time_ms,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub game_id: String,
    pub market_type: String,
    pub period: String,
    pub book: String,
    pub outcome: String,
    pub line: Option<f64>,
    pub price: i64,
    pub snapshot_at_ms: i64,
}

impl SnapshotRow {
    pub fn into_snapshot(self) -> Option<PriceSnapshot> {
        Some(PriceSnapshot {
            market_type: MarketType::parse(&self.market_type)?,
            period: Period::parse(&self.period)?,
            game_id: self.game_id,
            book: self.book,
            outcome: self.outcome,
            line: self.line,
            price: self.price as i32,
            snapshot_at_ms: self.snapshot_at_ms,
        })
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LiveEdgeRow {
    pub id: i64,
    pub game_id: String,
    pub market_type: String,
    pub outcome_key: String,
    pub edge_type: String,
    pub initial_value: f64,
    pub current_value: f64,
    pub magnitude: f64,
    pub percentage: f64,
    pub triggering_book: String,
    pub best_current_book: Option<String>,
    pub sharp_book_line: Option<f64>,
    pub status: String,
    pub confidence: f64,
    pub notes: Option<String>,
    pub detected_at_ms: i64,
    pub faded_at_ms: Option<i64>,
    pub expired_at_ms: Option<i64>,
    pub expires_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl LiveEdgeRow {
    pub fn status(&self) -> Option<EdgeStatus> {
        EdgeStatus::parse(&self.status)
    }

    pub fn edge_type(&self) -> Option<EdgeType> {
        EdgeType::parse(&self.edge_type)
    }
}
