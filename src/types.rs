use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Epoch milliseconds. All persisted timestamps use this.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

// ---------------------------------------------------------------------------
// Market taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Moneyline,
    Spread,
    Total,
    PlayerProp,
}

impl MarketType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "moneyline" => Some(MarketType::Moneyline),
            "spread" => Some(MarketType::Spread),
            "total" => Some(MarketType::Total),
            "player_prop" => Some(MarketType::PlayerProp),
            _ => None,
        }
    }

    /// Point-style markets carry a line; moneyline carries price only.
    pub fn has_line(self) -> bool {
        !matches!(self, MarketType::Moneyline)
    }
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MarketType::Moneyline => "moneyline",
            MarketType::Spread => "spread",
            MarketType::Total => "total",
            MarketType::PlayerProp => "player_prop",
        };
        write!(f, "{s}")
    }
}

/// Sub-segment of a game. Detection and CEQ scoring treat each period as a
/// fully independent scope: a 1H spread edge is not a full-game spread edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Full,
    FirstHalf,
    SecondHalf,
    FirstQuarter,
    SecondQuarter,
    ThirdQuarter,
    FourthQuarter,
    FirstPeriod,
    SecondPeriod,
    ThirdPeriod,
}

impl Period {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Period::Full),
            "1h" => Some(Period::FirstHalf),
            "2h" => Some(Period::SecondHalf),
            "1q" => Some(Period::FirstQuarter),
            "2q" => Some(Period::SecondQuarter),
            "3q" => Some(Period::ThirdQuarter),
            "4q" => Some(Period::FourthQuarter),
            "1p" => Some(Period::FirstPeriod),
            "2p" => Some(Period::SecondPeriod),
            "3p" => Some(Period::ThirdPeriod),
            _ => None,
        }
    }

    /// Scale applied to a full-game opening line when estimating this
    /// period's opening reference.
    pub fn opening_scale(self) -> f64 {
        match self {
            Period::Full => 1.0,
            Period::FirstHalf | Period::SecondHalf => 0.5,
            Period::FirstQuarter
            | Period::SecondQuarter
            | Period::ThirdQuarter
            | Period::FourthQuarter => 0.25,
            Period::FirstPeriod | Period::SecondPeriod | Period::ThirdPeriod => 0.33,
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Period::Full => "full",
            Period::FirstHalf => "1h",
            Period::SecondHalf => "2h",
            Period::FirstQuarter => "1q",
            Period::SecondQuarter => "2q",
            Period::ThirdQuarter => "3q",
            Period::FourthQuarter => "4q",
            Period::FirstPeriod => "1p",
            Period::SecondPeriod => "2p",
            Period::ThirdPeriod => "3p",
        };
        write!(f, "{s}")
    }
}

/// Period-qualified outcome key. Full-game outcomes keep the bare outcome so
/// persisted keys stay compatible with feeds that never report periods.
pub fn outcome_key(outcome: &str, period: Period) -> String {
    if period == Period::Full {
        outcome.to_string()
    } else {
        format!("{outcome}@{period}")
    }
}

// ---------------------------------------------------------------------------
// Edge taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    LineMovement,
    JuiceImprovement,
    ExchangeDivergence,
    ReverseLine,
}

impl EdgeType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "line_movement" => Some(EdgeType::LineMovement),
            "juice_improvement" => Some(EdgeType::JuiceImprovement),
            "exchange_divergence" => Some(EdgeType::ExchangeDivergence),
            "reverse_line" => Some(EdgeType::ReverseLine),
            _ => None,
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EdgeType::LineMovement => "line_movement",
            EdgeType::JuiceImprovement => "juice_improvement",
            EdgeType::ExchangeDivergence => "exchange_divergence",
            EdgeType::ReverseLine => "reverse_line",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    Active,
    Fading,
    Expired,
}

impl EdgeStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(EdgeStatus::Active),
            "fading" => Some(EdgeStatus::Fading),
            "expired" => Some(EdgeStatus::Expired),
            _ => None,
        }
    }

}

impl std::fmt::Display for EdgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EdgeStatus::Active => "active",
            EdgeStatus::Fading => "fading",
            EdgeStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// A single immutable price observation from one book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub game_id: String,
    pub market_type: MarketType,
    pub period: Period,
    pub book: String,
    pub outcome: String,
    /// Points line; None for moneyline.
    pub line: Option<f64>,
    /// Signed American odds.
    pub price: i32,
    pub snapshot_at_ms: i64,
}

/// Median line/price across books for one (game, market, outcome) at a point
/// in time. Derived on demand, never persisted. A missing median means no
/// book reported that quantity; callers must skip, not substitute zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusPoint {
    pub line: Option<f64>,
    pub price: Option<f64>,
}

// ---------------------------------------------------------------------------
// Detection output
// ---------------------------------------------------------------------------

/// Identity of an edge within one game.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub market_type: MarketType,
    pub outcome_key: String,
    pub edge_type: EdgeType,
}

/// One fired detection rule. Transient; the lifecycle manager owns all
/// persisted state.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub edge_type: EdgeType,
    pub market_type: MarketType,
    pub outcome_key: String,
    /// Points for line markets, cents for moneyline/juice.
    pub magnitude: f64,
    pub percentage: f64,
    pub initial_value: f64,
    pub current_value: f64,
    pub triggering_book: String,
    pub best_current_book: Option<String>,
    pub sharp_book_line: Option<f64>,
    /// Bounded per edge type, see detector::confidence.
    pub confidence: f64,
    pub rationale: String,
}

impl DetectionResult {
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            market_type: self.market_type,
            outcome_key: self.outcome_key.clone(),
            edge_type: self.edge_type,
        }
    }
}

// ---------------------------------------------------------------------------
// Game metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub sport: String,
    pub home_team: String,
    pub away_team: String,
    /// None when the feed has not supplied a start time yet.
    pub commence_time_ms: Option<i64>,
}

// ---------------------------------------------------------------------------
// Cycle accounting, returned by triggers even under partial failure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepStats {
    pub examined: u64,
    pub expired: u64,
    pub unchanged: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReconcileStats {
    /// Candidates after within-cycle dedup.
    pub detected: u64,
    pub created: u64,
    pub refreshed: u64,
    pub unchanged: u64,
    pub faded: u64,
    pub failed: u64,
}

impl ReconcileStats {
    pub fn upserted(&self) -> u64 {
        self.created + self.refreshed
    }

    pub fn absorb(&mut self, other: ReconcileStats) {
        self.detected += other.detected;
        self.created += other.created;
        self.refreshed += other.refreshed;
        self.unchanged += other.unchanged;
        self.faded += other.faded;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SportCounts {
    pub games: u64,
    pub detected: u64,
    pub upserted: u64,
    pub ceq_edges: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    pub games_processed: u64,
    pub games_failed: u64,
    /// Games never started because the cycle time budget ran out.
    pub games_abandoned: u64,
    pub detected: u64,
    pub upserted: u64,
    pub faded: u64,
    /// Outcomes scoring at or above the lean band across processed games.
    pub ceq_edges: u64,
    /// Edges force-expired because their game already started.
    pub expired_started: u64,
    pub sweep: SweepStats,
    pub per_sport: std::collections::HashMap<String, SportCounts>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_scales() {
        assert_eq!(Period::Full.opening_scale(), 1.0);
        assert_eq!(Period::FirstHalf.opening_scale(), 0.5);
        assert_eq!(Period::ThirdQuarter.opening_scale(), 0.25);
        assert_eq!(Period::SecondPeriod.opening_scale(), 0.33);
    }

    #[test]
    fn outcome_key_qualifies_sub_periods_only() {
        assert_eq!(outcome_key("home", Period::Full), "home");
        assert_eq!(outcome_key("home", Period::FirstHalf), "home@1h");
        assert_eq!(outcome_key("over", Period::FourthQuarter), "over@4q");
    }

    #[test]
    fn enum_round_trips() {
        for mt in ["moneyline", "spread", "total", "player_prop"] {
            assert_eq!(MarketType::parse(mt).unwrap().to_string(), mt);
        }
        for et in [
            "line_movement",
            "juice_improvement",
            "exchange_divergence",
            "reverse_line",
        ] {
            assert_eq!(EdgeType::parse(et).unwrap().to_string(), et);
        }
        for p in ["full", "1h", "2h", "1q", "2q", "3q", "4q", "1p", "2p", "3p"] {
            assert_eq!(Period::parse(p).unwrap().to_string(), p);
        }
    }
}
