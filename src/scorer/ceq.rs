//! Composite Edge Quotient: a banded 0–100 score per (market family,
//! outcome, period) blending the five pillars. Periods score independently
//! with an opening-line estimate scaled from the full-game opening.

use serde::Serialize;

use crate::aggregate::OutcomeSeries;
use crate::config::ceq_bands;
use crate::scorer::pillars::{self, CeqPillars};
use crate::types::{MarketType, Period};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CeqBand {
    None,
    Lean,
    Edge,
    Strong,
    Rare,
}

impl CeqBand {
    pub fn from_score(ceq: f64) -> Self {
        if ceq >= ceq_bands::RARE {
            CeqBand::Rare
        } else if ceq >= ceq_bands::STRONG {
            CeqBand::Strong
        } else if ceq >= ceq_bands::EDGE {
            CeqBand::Edge
        } else if ceq >= ceq_bands::LEAN {
            CeqBand::Lean
        } else {
            CeqBand::None
        }
    }

    /// Whether this outcome counts toward aggregate edge totals. Bands above
    /// Lean only label severity.
    pub fn is_edge(self) -> bool {
        !matches!(self, CeqBand::None)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CeqScore {
    pub ceq: f64,
    pub band: CeqBand,
    pub pillars: CeqPillars,
}

impl CeqScore {
    pub fn from_pillars(pillars: CeqPillars) -> Self {
        let ceq = pillars.blend();
        Self { ceq, band: CeqBand::from_score(ceq), pillars }
    }
}

/// Full-game opening references used to estimate period openings. Team
/// totals are always scored with `OpeningContext::empty()`; no historical
/// opening reference is assumed for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpeningContext {
    /// Full-game opening spread for the home side.
    pub home_spread: Option<f64>,
    /// Full-game opening total.
    pub total: Option<f64>,
}

impl OpeningContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_series(series: &[OutcomeSeries]) -> Self {
        let mut ctx = Self::default();
        for s in series {
            if s.period != Period::Full {
                continue;
            }
            match s.market_type {
                MarketType::Spread if s.outcome == "home" => {
                    ctx.home_spread = s.opening().line;
                }
                MarketType::Total if s.outcome == "over" => {
                    ctx.total = s.opening().line;
                }
                _ => {}
            }
        }
        ctx
    }

    /// Estimated opening line for `outcome` in `period`, scaled from the
    /// full-game opening (halves 0.5x, quarters 0.25x, thirds 0.33x).
    fn estimate(&self, market: MarketType, outcome: &str, period: Period) -> Option<f64> {
        let scale = period.opening_scale();
        match market {
            MarketType::Spread => {
                let home = self.home_spread?;
                let side = if outcome == "away" { -home } else { home };
                Some(side * scale)
            }
            MarketType::Total => Some(self.total? * scale),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeCeq {
    pub market_type: MarketType,
    pub period: Period,
    pub outcome: String,
    pub score: CeqScore,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameCeq {
    pub game_id: String,
    pub outcomes: Vec<OutcomeCeq>,
}

impl GameCeq {
    /// Sum of per-outcome edge flags across every scored period and team
    /// total. Each (market, outcome, period) appears at most once.
    pub fn edge_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.score.band.is_edge()).count()
    }
}

pub struct CeqScorer;

impl CeqScorer {
    /// Score every supported market family across the full game, halves,
    /// quarters/periods, and team totals.
    pub fn score_game(
        game_id: &str,
        series: &[OutcomeSeries],
        commence_time_ms: Option<i64>,
        now_ms: i64,
    ) -> GameCeq {
        let ctx = OpeningContext::from_series(series);
        let hours_to_commence =
            commence_time_ms.map(|t| (t - now_ms) as f64 / 3_600_000.0);

        let mut outcomes = Vec::new();
        for s in series {
            if s.snapshot_count() == 0 {
                continue;
            }
            // CEQ covers spreads, moneylines, and totals; props are the
            // detector's territory only.
            if s.market_type == MarketType::PlayerProp {
                continue;
            }
            let series_ctx = if is_team_total(s) { OpeningContext::empty() } else { ctx };
            let score = Self::score_series(s, &series_ctx, hours_to_commence);
            outcomes.push(OutcomeCeq {
                market_type: s.market_type,
                period: s.period,
                outcome: s.outcome.clone(),
                score,
            });
        }
        GameCeq { game_id: game_id.to_string(), outcomes }
    }

    fn score_series(
        s: &OutcomeSeries,
        ctx: &OpeningContext,
        hours_to_commence: Option<f64>,
    ) -> CeqScore {
        let current = s.current();

        let favorable_gap = match (ctx.estimate(s.market_type, &s.outcome, s.period), current.line)
        {
            (Some(est), Some(line)) => Some(favorable_gap(s.market_type, &s.outcome, est, line)),
            _ => None,
        };

        let (velocity, consistency) = movement_stats(s);

        let pillars = CeqPillars {
            execution: pillars::execution_quality(current.price),
            incentive: pillars::incentive_structure(favorable_gap),
            shock: pillars::market_shock(velocity),
            decay: pillars::time_decay(hours_to_commence),
            flow: pillars::order_flow(consistency),
        };
        CeqScore::from_pillars(pillars)
    }
}

/// Total-market series whose outcome is not a bare over/under belongs to a
/// team total (e.g. "home|over").
fn is_team_total(s: &OutcomeSeries) -> bool {
    s.market_type == MarketType::Total && s.outcome != "over" && s.outcome != "under"
}

fn is_under_side(outcome: &str) -> bool {
    let side = outcome.rsplit('|').next().unwrap_or(outcome);
    side.eq_ignore_ascii_case("under")
}

/// Favorable distance (points) from the estimated opening to the current
/// consensus line, signed toward the bettor on `outcome`.
fn favorable_gap(market: MarketType, outcome: &str, estimate: f64, current: f64) -> f64 {
    match market {
        MarketType::Spread => current - estimate,
        MarketType::Total | MarketType::PlayerProp => {
            if is_under_side(outcome) {
                current - estimate
            } else {
                estimate - current
            }
        }
        MarketType::Moneyline => 0.0,
    }
}

/// (points-per-hour velocity, directional consistency) from the merged
/// cross-book timeline. Moneylines move in cents; 10 cents counts as one
/// point-equivalent.
fn movement_stats(s: &OutcomeSeries) -> (Option<f64>, Option<f64>) {
    let timeline = s.merged_timeline();
    let values: Vec<(i64, f64)> = timeline
        .iter()
        .filter_map(|snap| {
            let v = if s.market_type.has_line() {
                snap.line?
            } else {
                f64::from(snap.price) / 10.0
            };
            Some((snap.snapshot_at_ms, v))
        })
        .collect();

    if values.len() < 2 {
        return (None, None);
    }

    let (first_ts, first_v) = values[0];
    let (last_ts, last_v) = values[values.len() - 1];
    let span_hours = (last_ts - first_ts) as f64 / 3_600_000.0;
    let velocity = if span_hours > 0.0 {
        Some((last_v - first_v).abs() / span_hours)
    } else {
        None
    };

    let deltas: Vec<f64> = values
        .windows(2)
        .map(|w| w[1].1 - w[0].1)
        .filter(|d| d.abs() > f64::EPSILON)
        .collect();
    let consistency = if deltas.len() < 2 {
        None
    } else {
        let ups = deltas.iter().filter(|d| **d > 0.0).count();
        let majority = ups.max(deltas.len() - ups);
        Some(majority as f64 / deltas.len() as f64)
    };

    (velocity, consistency)
}
