//! The five CEQ pillars, each normalized to 0–100. Inputs that cannot be
//! derived (no price, no opening reference, too few observations) score the
//! neutral 50 rather than dragging the blend to zero.

/// Blend weights. Sum to 1.0.
pub const W_EXECUTION: f64 = 0.25;
pub const W_INCENTIVE: f64 = 0.20;
pub const W_SHOCK: f64 = 0.20;
pub const W_DECAY: f64 = 0.15;
pub const W_FLOW: f64 = 0.20;

const NEUTRAL: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CeqPillars {
    pub execution: f64,
    pub incentive: f64,
    pub shock: f64,
    pub decay: f64,
    pub flow: f64,
}

impl CeqPillars {
    pub fn blend(&self) -> f64 {
        W_EXECUTION * self.execution
            + W_INCENTIVE * self.incentive
            + W_SHOCK * self.shock
            + W_DECAY * self.decay
            + W_FLOW * self.flow
    }
}

/// Execution quality: how much vig the bettor pays at the current consensus
/// price. -100/+100 or better is a full score; every cent of negative juice
/// past even costs two points.
pub fn execution_quality(price: Option<f64>) -> f64 {
    let Some(p) = price else { return NEUTRAL };
    let vig_cents = if p < 0.0 { -p - 100.0 } else { 0.0 };
    (100.0 - vig_cents * 2.0).clamp(0.0, 100.0)
}

/// Incentive structure: favorable gap (points) between the period-scaled
/// opening estimate and the current consensus line. 2.5 favorable points
/// saturates the pillar.
pub fn incentive_structure(favorable_gap: Option<f64>) -> f64 {
    let Some(gap) = favorable_gap else { return NEUTRAL };
    (NEUTRAL + gap * 20.0).clamp(0.0, 100.0)
}

/// Market shock: rate of line change. One point per hour saturates.
pub fn market_shock(points_per_hour: Option<f64>) -> f64 {
    let Some(pph) = points_per_hour else { return NEUTRAL };
    (pph.abs() * 100.0).clamp(0.0, 100.0)
}

/// Time decay: opportunities compress as commence approaches. 24h out scores
/// zero, tipoff scores full.
pub fn time_decay(hours_to_commence: Option<f64>) -> f64 {
    let Some(h) = hours_to_commence else { return NEUTRAL };
    (100.0 * (1.0 - (h / 24.0))).clamp(0.0, 100.0)
}

/// Order-flow character: fraction of successive moves sharing the majority
/// direction. Fewer than two moves gives the neutral score.
pub fn order_flow(consistency: Option<f64>) -> f64 {
    let Some(c) = consistency else { return NEUTRAL };
    (c * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        let total = W_EXECUTION + W_INCENTIVE + W_SHOCK + W_DECAY + W_FLOW;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn execution_rewards_low_vig() {
        assert_eq!(execution_quality(Some(-110.0)), 80.0);
        assert_eq!(execution_quality(Some(-105.0)), 90.0);
        assert_eq!(execution_quality(Some(120.0)), 100.0);
        assert_eq!(execution_quality(None), 50.0);
    }

    #[test]
    fn incentive_is_symmetric_around_neutral() {
        assert_eq!(incentive_structure(Some(0.0)), 50.0);
        assert_eq!(incentive_structure(Some(0.5)), 60.0);
        assert_eq!(incentive_structure(Some(-0.5)), 40.0);
        assert_eq!(incentive_structure(Some(10.0)), 100.0);
    }

    #[test]
    fn decay_rises_toward_commence() {
        assert_eq!(time_decay(Some(24.0)), 0.0);
        assert_eq!(time_decay(Some(0.0)), 100.0);
        assert!(time_decay(Some(6.0)) > time_decay(Some(12.0)));
        assert_eq!(time_decay(None), 50.0);
    }

    #[test]
    fn blend_of_all_neutral_is_neutral() {
        let p = CeqPillars {
            execution: 50.0,
            incentive: 50.0,
            shock: 50.0,
            decay: 50.0,
            flow: 50.0,
        };
        assert!((p.blend() - 50.0).abs() < 1e-9);
    }
}
