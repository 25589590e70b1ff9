//! Per-type confidence scoring: `min(cap, base + per_unit * units)`.
//!
//! The base/cap asymmetry across types is deliberate: sharp-book divergence
//! and reverse-line signals are never capped below juice or naive
//! line-movement signals.

use crate::types::{EdgeType, MarketType};

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceParams {
    pub base: f64,
    pub per_unit: f64,
    pub cap: f64,
}

impl EdgeType {
    pub fn confidence_params(self) -> ConfidenceParams {
        match self {
            EdgeType::LineMovement => ConfidenceParams { base: 35.0, per_unit: 8.0, cap: 70.0 },
            EdgeType::JuiceImprovement => ConfidenceParams { base: 20.0, per_unit: 3.0, cap: 55.0 },
            EdgeType::ExchangeDivergence => ConfidenceParams { base: 55.0, per_unit: 5.0, cap: 80.0 },
            EdgeType::ReverseLine => ConfidenceParams { base: 65.0, per_unit: 4.0, cap: 85.0 },
        }
    }
}

/// Magnitude converted into the granularity each formula counts in:
/// half-points for line/reverse movement, cents for juice, points for
/// divergence. Moneyline magnitudes are cents; one moneyline unit is the
/// 10-cent firing minimum for movement rules and 10 cents per point-equivalent
/// for divergence.
fn units(edge_type: EdgeType, market_type: MarketType, magnitude: f64) -> f64 {
    match edge_type {
        EdgeType::LineMovement | EdgeType::ReverseLine => match market_type {
            MarketType::Moneyline => magnitude / 10.0,
            _ => magnitude / 0.5,
        },
        EdgeType::JuiceImprovement => magnitude,
        EdgeType::ExchangeDivergence => match market_type {
            MarketType::Moneyline => magnitude / 10.0,
            _ => magnitude,
        },
    }
}

/// Confidence in `[0, cap(edge_type)]`.
pub fn score(edge_type: EdgeType, market_type: MarketType, magnitude: f64) -> f64 {
    let p = edge_type.confidence_params();
    let raw = p.base + p.per_unit * units(edge_type, market_type, magnitude);
    raw.clamp(0.0, p.cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_point_line_move_scores_43() {
        // min(70, 35 + 8*1)
        let c = score(EdgeType::LineMovement, MarketType::Spread, 0.5);
        assert!((c - 43.0).abs() < 1e-9);
    }

    #[test]
    fn ten_cent_juice_move_scores_50() {
        // min(55, 20 + 3*10)
        let c = score(EdgeType::JuiceImprovement, MarketType::Spread, 10.0);
        assert!((c - 50.0).abs() < 1e-9);
    }

    #[test]
    fn divergence_of_1_5_points_scores_62_5() {
        // min(80, 55 + 5*1.5)
        let c = score(EdgeType::ExchangeDivergence, MarketType::Spread, 1.5);
        assert!((c - 62.5).abs() < 1e-9);
    }

    #[test]
    fn juice_is_capped_at_55() {
        let c = score(EdgeType::JuiceImprovement, MarketType::Moneyline, 50.0);
        assert!((c - 55.0).abs() < 1e-9);
    }

    #[test]
    fn every_type_respects_its_cap() {
        for (et, cap) in [
            (EdgeType::LineMovement, 70.0),
            (EdgeType::JuiceImprovement, 55.0),
            (EdgeType::ExchangeDivergence, 80.0),
            (EdgeType::ReverseLine, 85.0),
        ] {
            let c = score(et, MarketType::Spread, 1_000.0);
            assert!((c - cap).abs() < 1e-9, "{et} should cap at {cap}, got {c}");
        }
    }

    #[test]
    fn moneyline_movement_counts_ten_cent_units() {
        // 20 cents = 2 units -> 35 + 8*2 = 51
        let c = score(EdgeType::LineMovement, MarketType::Moneyline, 20.0);
        assert!((c - 51.0).abs() < 1e-9);
    }

    #[test]
    fn never_negative() {
        let c = score(EdgeType::JuiceImprovement, MarketType::Spread, -100.0);
        assert_eq!(c, 0.0);
    }
}
