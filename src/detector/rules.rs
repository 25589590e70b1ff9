//! The four detection rules. Each rule evaluates independently per
//! (market, period, outcome) series with inclusive `>=` threshold semantics.
//! A rule that cannot evaluate (missing consensus for its scope) is skipped
//! silently; a series with fewer than two snapshots fires nothing.

use std::collections::HashMap;

use crate::aggregate::OutcomeSeries;
use crate::config::detection_min;
use crate::detector::confidence;
use crate::types::{outcome_key, DetectionResult, EdgeKey, EdgeType, MarketType};

/// A rule evaluation: the current favorable magnitude for a key, plus the
/// detection when the magnitude reached the firing minimum. Sub-threshold
/// magnitudes still matter: the lifecycle manager uses them to observe
/// decay on previously detected edges.
#[derive(Debug)]
struct Evaluation {
    key: EdgeKey,
    magnitude: f64,
    result: Option<DetectionResult>,
}

#[derive(Debug, Default)]
pub struct DetectionBatch {
    pub results: Vec<DetectionResult>,
    /// Every evaluated key -> its current favorable magnitude.
    pub evaluated: HashMap<EdgeKey, f64>,
}

pub struct EdgeDetector {
    sharp_book: String,
}

/// True for the under side of a total or a `<player>|Under` prop key.
fn is_under_side(outcome: &str) -> bool {
    let side = outcome.rsplit('|').next().unwrap_or(outcome);
    side.eq_ignore_ascii_case("under")
}

/// Signed favorable movement for the bettor on `outcome` when a line moves
/// `from` -> `to`. Positive means the line became more valuable to take.
fn favorable_line_delta(market: MarketType, outcome: &str, from: f64, to: f64) -> f64 {
    match market {
        // More points for your side is always better: -3.5 -> -3.0 is +0.5.
        MarketType::Spread => to - from,
        // Overs want the total to drop, unders want it to rise.
        MarketType::Total | MarketType::PlayerProp => {
            if is_under_side(outcome) {
                to - from
            } else {
                from - to
            }
        }
        // Moneylines move in price, not points.
        MarketType::Moneyline => 0.0,
    }
}

fn pct_of(initial: f64, magnitude: f64) -> f64 {
    if initial.abs() < f64::EPSILON {
        0.0
    } else {
        magnitude / initial.abs() * 100.0
    }
}

impl EdgeDetector {
    pub fn new(sharp_book: impl Into<String>) -> Self {
        Self { sharp_book: sharp_book.into() }
    }

    /// Run all four rules over every series. Series below two snapshots are
    /// skipped entirely.
    pub fn detect(&self, series: &[OutcomeSeries]) -> DetectionBatch {
        let mut batch = DetectionBatch::default();
        for s in series {
            if s.snapshot_count() < 2 {
                continue;
            }
            for eval in [
                self.line_movement(s),
                self.juice_improvement(s),
                self.exchange_divergence(s),
                self.reverse_line_movement(s),
            ]
            .into_iter()
            .flatten()
            {
                batch.evaluated.insert(eval.key, eval.magnitude);
                if let Some(result) = eval.result {
                    batch.results.push(result);
                }
            }
        }
        batch
    }

    /// Rule 1: favorable movement between the opening and current consensus.
    fn line_movement(&self, s: &OutcomeSeries) -> Option<Evaluation> {
        let opening = s.opening();
        let current = s.current();
        let key = self.key_for(s, EdgeType::LineMovement);

        let (magnitude, initial, now, min) = if s.market_type.has_line() {
            let from = opening.line?;
            let to = current.line?;
            (
                favorable_line_delta(s.market_type, &s.outcome, from, to),
                from,
                to,
                detection_min::POINT_MOVE,
            )
        } else {
            let from = opening.price?;
            let to = current.price?;
            (to - from, from, to, detection_min::ML_MOVE_CENTS)
        };

        let result = (magnitude >= min).then(|| {
            let best_book = self.best_current_book(s);
            let unit = if s.market_type.has_line() { "pts" } else { "cents" };
            DetectionResult {
                edge_type: EdgeType::LineMovement,
                market_type: s.market_type,
                outcome_key: key.outcome_key.clone(),
                magnitude,
                percentage: pct_of(initial, magnitude),
                initial_value: initial,
                current_value: now,
                triggering_book: best_book.clone().unwrap_or_else(|| "consensus".to_string()),
                best_current_book: best_book,
                sharp_book_line: None,
                confidence: confidence::score(EdgeType::LineMovement, s.market_type, magnitude),
                rationale: format!(
                    "{} consensus moved {initial:.1} -> {now:.1} ({magnitude:+.1} {unit} favorable)",
                    key.outcome_key,
                ),
            }
        });

        Some(Evaluation { key, magnitude, result })
    }

    /// Rule 2: vig reduction at constant consensus line.
    fn juice_improvement(&self, s: &OutcomeSeries) -> Option<Evaluation> {
        let opening = s.opening();
        let current = s.current();

        if s.market_type.has_line() {
            // Comparable only while the line itself held still.
            let from_line = opening.line?;
            let to_line = current.line?;
            if (from_line - to_line).abs() > 1e-6 {
                return None;
            }
        }

        let from = opening.price?;
        let to = current.price?;
        let magnitude = to - from;
        let key = self.key_for(s, EdgeType::JuiceImprovement);

        let result = (magnitude >= detection_min::JUICE_CENTS).then(|| {
            let best_book = self.best_current_book(s);
            DetectionResult {
                edge_type: EdgeType::JuiceImprovement,
                market_type: s.market_type,
                outcome_key: key.outcome_key.clone(),
                magnitude,
                percentage: pct_of(from, magnitude),
                initial_value: from,
                current_value: to,
                triggering_book: best_book.clone().unwrap_or_else(|| "consensus".to_string()),
                best_current_book: best_book,
                sharp_book_line: None,
                confidence: confidence::score(EdgeType::JuiceImprovement, s.market_type, magnitude),
                rationale: format!(
                    "{} juice improved {from:.0} -> {to:.0} ({magnitude:+.0} cents) at constant line",
                    key.outcome_key,
                ),
            }
        });

        Some(Evaluation { key, magnitude, result })
    }

    /// Rule 3: a soft book's current value vs the sharp reference book.
    fn exchange_divergence(&self, s: &OutcomeSeries) -> Option<Evaluation> {
        let sharp = s.latest_for_book(&self.sharp_book)?;
        let key = self.key_for(s, EdgeType::ExchangeDivergence);

        let (sharp_value, min) = if s.market_type.has_line() {
            (sharp.line?, detection_min::DIVERGENCE_POINTS)
        } else {
            (f64::from(sharp.price), detection_min::DIVERGENCE_CENTS)
        };

        // Best divergence across all non-sharp books' latest quotes.
        let mut best: Option<(f64, String, f64)> = None; // (divergence, book, soft_value)
        for book in &s.books {
            if book.book == self.sharp_book {
                continue;
            }
            let Some(latest) = book.latest() else { continue };
            let (divergence, soft_value) = if s.market_type.has_line() {
                let Some(soft_line) = latest.line else { continue };
                (
                    favorable_line_delta(s.market_type, &s.outcome, sharp_value, soft_line),
                    soft_line,
                )
            } else {
                let soft_price = f64::from(latest.price);
                (soft_price - sharp_value, soft_price)
            };
            if best.as_ref().map_or(true, |(d, _, _)| divergence > *d) {
                best = Some((divergence, book.book.clone(), soft_value));
            }
        }
        let (magnitude, book, soft_value) = best?;

        let result = (magnitude >= min).then(|| DetectionResult {
            edge_type: EdgeType::ExchangeDivergence,
            market_type: s.market_type,
            outcome_key: key.outcome_key.clone(),
            magnitude,
            percentage: pct_of(sharp_value, magnitude),
            initial_value: sharp_value,
            current_value: soft_value,
            triggering_book: book.clone(),
            best_current_book: Some(book.clone()),
            sharp_book_line: Some(sharp_value),
            confidence: confidence::score(EdgeType::ExchangeDivergence, s.market_type, magnitude),
            rationale: format!(
                "{book} offers {soft_value:.1} vs {} {sharp_value:.1} on {}",
                self.sharp_book, key.outcome_key,
            ),
        });

        Some(Evaluation { key, magnitude, result })
    }

    /// Rule 4: favorable line movement while the price moved against the
    /// outcome, a price-pressure proxy for sharp money faded by the public.
    /// Best-effort: no real handle feed backs this. Line markets only, since
    /// a moneyline has no line to contrast against its own price.
    fn reverse_line_movement(&self, s: &OutcomeSeries) -> Option<Evaluation> {
        if !s.market_type.has_line() {
            return None;
        }
        let opening = s.opening();
        let current = s.current();
        let from_line = opening.line?;
        let to_line = current.line?;
        let from_price = opening.price?;
        let to_price = current.price?;

        let line_delta = favorable_line_delta(s.market_type, &s.outcome, from_line, to_line);
        let price_delta = to_price - from_price;
        let against_flow = price_delta <= 0.0;
        let magnitude = if against_flow { line_delta } else { 0.0 };
        let key = self.key_for(s, EdgeType::ReverseLine);

        let result = (against_flow && line_delta >= detection_min::POINT_MOVE).then(|| {
            let best_book = self.best_current_book(s);
            DetectionResult {
                edge_type: EdgeType::ReverseLine,
                market_type: s.market_type,
                outcome_key: key.outcome_key.clone(),
                magnitude: line_delta,
                percentage: pct_of(from_line, line_delta),
                initial_value: from_line,
                current_value: to_line,
                triggering_book: best_book.clone().unwrap_or_else(|| "consensus".to_string()),
                best_current_book: best_book,
                sharp_book_line: None,
                confidence: confidence::score(EdgeType::ReverseLine, s.market_type, line_delta),
                rationale: format!(
                    "{} line moved {from_line:.1} -> {to_line:.1} against price flow ({price_delta:+.0} cents)",
                    key.outcome_key,
                ),
            }
        });

        Some(Evaluation { key, magnitude, result })
    }

    fn key_for(&self, s: &OutcomeSeries, edge_type: EdgeType) -> EdgeKey {
        EdgeKey {
            market_type: s.market_type,
            outcome_key: outcome_key(&s.outcome, s.period),
            edge_type,
        }
    }

    /// Book whose latest quote is most favorable for this outcome.
    fn best_current_book(&self, s: &OutcomeSeries) -> Option<String> {
        let mut best: Option<(f64, String)> = None;
        for book in &s.books {
            let Some(latest) = book.latest() else { continue };
            let value = if s.market_type.has_line() {
                let line = latest.line?;
                favorable_line_delta(s.market_type, &s.outcome, 0.0, line)
            } else {
                f64::from(latest.price)
            };
            if best.as_ref().map_or(true, |(v, _)| value > *v) {
                best = Some((value, book.book.clone()));
            }
        }
        best.map(|(_, b)| b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::group_outcomes;
    use crate::types::{Period, PriceSnapshot};

    fn spread_snap(book: &str, line: f64, price: i32, at_ms: i64) -> PriceSnapshot {
        PriceSnapshot {
            game_id: "g1".to_string(),
            market_type: MarketType::Spread,
            period: Period::Full,
            book: book.to_string(),
            outcome: "home".to_string(),
            line: Some(line),
            price,
            snapshot_at_ms: at_ms,
        }
    }

    fn total_snap(book: &str, outcome: &str, line: f64, price: i32, at_ms: i64) -> PriceSnapshot {
        PriceSnapshot {
            game_id: "g1".to_string(),
            market_type: MarketType::Total,
            period: Period::Full,
            book: book.to_string(),
            outcome: outcome.to_string(),
            line: Some(line),
            price,
            snapshot_at_ms: at_ms,
        }
    }

    fn detect(snaps: Vec<PriceSnapshot>) -> DetectionBatch {
        let series = group_outcomes(snaps, 100_000, None);
        EdgeDetector::new("pinnacle").detect(&series)
    }

    fn results_of(batch: &DetectionBatch, et: EdgeType) -> Vec<&DetectionResult> {
        batch.results.iter().filter(|r| r.edge_type == et).collect()
    }

    #[test]
    fn fewer_than_two_snapshots_is_empty_not_error() {
        let batch = detect(vec![spread_snap("alpha", -3.5, -110, 1_000)]);
        assert!(batch.results.is_empty());
        assert!(batch.evaluated.is_empty());
    }

    #[test]
    fn half_point_spread_move_fires_with_confidence_43() {
        // -3.5 to -3.0 at constant -110: one half-point unit.
        let batch = detect(vec![
            spread_snap("alpha", -3.5, -110, 1_000),
            spread_snap("alpha", -3.0, -110, 2_000),
        ]);
        let moves = results_of(&batch, EdgeType::LineMovement);
        assert_eq!(moves.len(), 1);
        let m = moves[0];
        assert!((m.magnitude - 0.5).abs() < 1e-9);
        assert!((m.confidence - 43.0).abs() < 1e-9);
        assert_eq!(m.outcome_key, "home");
    }

    #[test]
    fn unfavorable_spread_move_does_not_fire() {
        // Line moved against the home bettor: -3.0 -> -3.5.
        let batch = detect(vec![
            spread_snap("alpha", -3.0, -110, 1_000),
            spread_snap("alpha", -3.5, -110, 2_000),
        ]);
        assert!(results_of(&batch, EdgeType::LineMovement).is_empty());
        // Still evaluated, with a negative favorable magnitude.
        let key = EdgeKey {
            market_type: MarketType::Spread,
            outcome_key: "home".to_string(),
            edge_type: EdgeType::LineMovement,
        };
        assert!(batch.evaluated[&key] < 0.0);
    }

    #[test]
    fn movement_exactly_at_threshold_fires() {
        // Over 210.5 -> 210.0 is exactly the 0.5 minimum for the over side.
        let batch = detect(vec![
            total_snap("alpha", "over", 210.5, -110, 1_000),
            total_snap("alpha", "over", 210.0, -110, 2_000),
        ]);
        assert_eq!(results_of(&batch, EdgeType::LineMovement).len(), 1);
    }

    #[test]
    fn under_side_wants_the_total_to_rise() {
        let batch = detect(vec![
            total_snap("alpha", "under", 210.0, -110, 1_000),
            total_snap("alpha", "under", 211.0, -110, 2_000),
        ]);
        let moves = results_of(&batch, EdgeType::LineMovement);
        assert_eq!(moves.len(), 1);
        assert!((moves[0].magnitude - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ten_cent_juice_move_scores_50() {
        // -115 to -105 at constant line: min(55, 20 + 3*10).
        let batch = detect(vec![
            spread_snap("alpha", -3.5, -115, 1_000),
            spread_snap("alpha", -3.5, -105, 2_000),
        ]);
        let juice = results_of(&batch, EdgeType::JuiceImprovement);
        assert_eq!(juice.len(), 1);
        assert!((juice[0].magnitude - 10.0).abs() < 1e-9);
        assert!((juice[0].confidence - 50.0).abs() < 1e-9);
    }

    #[test]
    fn juice_rule_skips_when_line_moved() {
        let batch = detect(vec![
            spread_snap("alpha", -3.5, -115, 1_000),
            spread_snap("alpha", -3.0, -105, 2_000),
        ]);
        assert!(results_of(&batch, EdgeType::JuiceImprovement).is_empty());
        // Skipped, not evaluated-at-zero.
        let key = EdgeKey {
            market_type: MarketType::Spread,
            outcome_key: "home".to_string(),
            edge_type: EdgeType::JuiceImprovement,
        };
        assert!(!batch.evaluated.contains_key(&key));
    }

    #[test]
    fn soft_book_divergence_from_sharp_reference() {
        // Soft +6.5 vs sharp +5.0: 1.5 points, min(80, 55 + 5*1.5) = 62.5.
        let batch = detect(vec![
            spread_snap("pinnacle", 5.0, -110, 1_000),
            spread_snap("softbook", 6.5, -110, 1_000),
        ]);
        let div = results_of(&batch, EdgeType::ExchangeDivergence);
        assert_eq!(div.len(), 1);
        let d = div[0];
        assert!((d.magnitude - 1.5).abs() < 1e-9);
        assert!((d.confidence - 62.5).abs() < 1e-9);
        assert_eq!(d.triggering_book, "softbook");
        assert_eq!(d.sharp_book_line, Some(5.0));
    }

    #[test]
    fn divergence_skipped_without_sharp_book() {
        let batch = detect(vec![
            spread_snap("alpha", 5.0, -110, 1_000),
            spread_snap("beta", 6.5, -110, 1_000),
        ]);
        assert!(results_of(&batch, EdgeType::ExchangeDivergence).is_empty());
    }

    #[test]
    fn reverse_line_fires_when_price_moves_against_the_line() {
        // Home gains a point while its juice worsens: classic RLM shape.
        let batch = detect(vec![
            spread_snap("alpha", -4.0, -105, 1_000),
            spread_snap("alpha", -3.0, -115, 2_000),
        ]);
        let rlm = results_of(&batch, EdgeType::ReverseLine);
        assert_eq!(rlm.len(), 1);
        let r = rlm[0];
        assert!((r.magnitude - 1.0).abs() < 1e-9);
        // min(85, 65 + 4*2 half-points) = 73
        assert!((r.confidence - 73.0).abs() < 1e-9);
    }

    #[test]
    fn reverse_line_stays_quiet_when_price_confirms_the_move() {
        // Price improved alongside the line: plain movement, not reverse.
        let batch = detect(vec![
            spread_snap("alpha", -4.0, -115, 1_000),
            spread_snap("alpha", -3.0, -105, 2_000),
        ]);
        assert!(results_of(&batch, EdgeType::ReverseLine).is_empty());
        // Line movement itself still fires.
        assert_eq!(results_of(&batch, EdgeType::LineMovement).len(), 1);
    }

    #[test]
    fn periods_detect_independently() {
        let mut h1_open = spread_snap("alpha", -1.5, -110, 1_000);
        h1_open.period = Period::FirstHalf;
        let mut h1_cur = spread_snap("alpha", -1.0, -110, 2_000);
        h1_cur.period = Period::FirstHalf;

        let batch = detect(vec![
            spread_snap("alpha", -3.5, -110, 1_000),
            spread_snap("alpha", -3.5, -110, 2_000),
            h1_open,
            h1_cur,
        ]);
        let moves = results_of(&batch, EdgeType::LineMovement);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].outcome_key, "home@1h");
    }

    #[test]
    fn moneyline_movement_in_cents() {
        let ml = |book: &str, price: i32, at_ms: i64| PriceSnapshot {
            game_id: "g1".to_string(),
            market_type: MarketType::Moneyline,
            period: Period::Full,
            book: book.to_string(),
            outcome: "away".to_string(),
            line: None,
            price,
            snapshot_at_ms: at_ms,
        };
        // +120 -> +135: 15 cents favorable, above the 10-cent minimum.
        let batch = detect(vec![ml("alpha", 120, 1_000), ml("alpha", 135, 2_000)]);
        let moves = results_of(&batch, EdgeType::LineMovement);
        assert_eq!(moves.len(), 1);
        assert!((moves[0].magnitude - 15.0).abs() < 1e-9);
    }
}
