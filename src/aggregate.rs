//! Snapshot aggregation: groups raw price observations into per-outcome
//! series and derives consensus (median) values across books. Pure reads,
//! no side effects.

use std::collections::BTreeMap;

use crate::types::{ConsensusPoint, MarketType, Period, PriceSnapshot};

/// Median of `values`. Even-length lists average the two central values.
/// Empty input is `None`, never a sentinel number.
pub fn consensus(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    })
}

/// One book's observations for a single outcome, ordered by snapshot time.
#[derive(Debug, Clone)]
pub struct BookSeries {
    pub book: String,
    pub snaps: Vec<PriceSnapshot>,
}

impl BookSeries {
    pub fn earliest(&self) -> Option<&PriceSnapshot> {
        self.snaps.first()
    }

    pub fn latest(&self) -> Option<&PriceSnapshot> {
        self.snaps.last()
    }
}

/// The full cross-book history for one (market, period, outcome).
#[derive(Debug, Clone)]
pub struct OutcomeSeries {
    pub market_type: MarketType,
    pub period: Period,
    pub outcome: String,
    pub books: Vec<BookSeries>,
}

impl OutcomeSeries {
    pub fn snapshot_count(&self) -> usize {
        self.books.iter().map(|b| b.snaps.len()).sum()
    }

    pub fn books_reporting(&self) -> usize {
        self.books.len()
    }

    /// Consensus across each book's earliest observation.
    pub fn opening(&self) -> ConsensusPoint {
        self.consensus_at(|b| b.earliest())
    }

    /// Consensus across each book's latest observation.
    pub fn current(&self) -> ConsensusPoint {
        self.consensus_at(|b| b.latest())
    }

    fn consensus_at<'a, F>(&'a self, pick: F) -> ConsensusPoint
    where
        F: Fn(&'a BookSeries) -> Option<&'a PriceSnapshot>,
    {
        let picked: Vec<&PriceSnapshot> = self.books.iter().filter_map(&pick).collect();
        let lines: Vec<f64> = picked.iter().filter_map(|s| s.line).collect();
        let prices: Vec<f64> = picked.iter().map(|s| f64::from(s.price)).collect();
        ConsensusPoint {
            line: consensus(&lines),
            price: consensus(&prices),
        }
    }

    pub fn latest_for_book(&self, book: &str) -> Option<&PriceSnapshot> {
        self.books.iter().find(|b| b.book == book)?.latest()
    }

    /// All observations across books merged in timestamp order. Used by the
    /// CEQ velocity/consistency pillars.
    pub fn merged_timeline(&self) -> Vec<&PriceSnapshot> {
        let mut all: Vec<&PriceSnapshot> =
            self.books.iter().flat_map(|b| b.snaps.iter()).collect();
        all.sort_by_key(|s| s.snapshot_at_ms);
        all
    }
}

/// Group a game's snapshots into per-outcome series. Sub-period snapshots
/// older than `period_lookback_ms` (relative to `now_ms`) are dropped;
/// full-game series are never windowed.
pub fn group_outcomes(
    snaps: Vec<PriceSnapshot>,
    now_ms: i64,
    period_lookback_ms: Option<i64>,
) -> Vec<OutcomeSeries> {
    // (market, period, outcome) -> book -> snaps. BTreeMaps keep output order
    // deterministic across runs.
    let mut grouped: BTreeMap<(String, String, String), BTreeMap<String, Vec<PriceSnapshot>>> =
        BTreeMap::new();

    for snap in snaps {
        if snap.period != Period::Full {
            if let Some(lookback) = period_lookback_ms {
                if snap.snapshot_at_ms < now_ms - lookback {
                    continue;
                }
            }
        }
        grouped
            .entry((
                snap.market_type.to_string(),
                snap.period.to_string(),
                snap.outcome.clone(),
            ))
            .or_default()
            .entry(snap.book.clone())
            .or_default()
            .push(snap);
    }

    let mut series = Vec::with_capacity(grouped.len());
    for ((market, period, outcome), by_book) in grouped {
        // Parses always succeed: keys came from Display of the same enums.
        let Some(market_type) = MarketType::parse(&market) else { continue };
        let Some(period) = Period::parse(&period) else { continue };

        let mut books = Vec::with_capacity(by_book.len());
        for (book, mut snaps) in by_book {
            snaps.sort_by_key(|s| s.snapshot_at_ms);
            books.push(BookSeries { book, snaps });
        }
        series.push(OutcomeSeries {
            market_type,
            period,
            outcome,
            books,
        });
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(book: &str, line: Option<f64>, price: i32, at_ms: i64) -> PriceSnapshot {
        PriceSnapshot {
            game_id: "g1".to_string(),
            market_type: MarketType::Spread,
            period: Period::Full,
            book: book.to_string(),
            outcome: "home".to_string(),
            line,
            price,
            snapshot_at_ms: at_ms,
        }
    }

    #[test]
    fn consensus_odd_length_is_middle() {
        assert_eq!(consensus(&[3.0, 1.0, 2.0]), Some(2.0));
    }

    #[test]
    fn consensus_even_length_averages_central_pair() {
        assert_eq!(consensus(&[-110.0, -105.0, -115.0, -120.0]), Some(-112.5));
    }

    #[test]
    fn consensus_empty_is_none_not_zero() {
        assert_eq!(consensus(&[]), None);
    }

    #[test]
    fn opening_and_current_use_per_book_extremes() {
        let series = group_outcomes(
            vec![
                snap("alpha", Some(-3.5), -110, 1_000),
                snap("alpha", Some(-3.0), -110, 3_000),
                snap("beta", Some(-3.5), -112, 1_500),
                snap("beta", Some(-2.5), -108, 4_000),
            ],
            10_000,
            None,
        );
        assert_eq!(series.len(), 1);
        let s = &series[0];
        assert_eq!(s.books_reporting(), 2);
        assert_eq!(s.opening().line, Some(-3.5));
        // current lines -3.0 and -2.5 -> median -2.75
        assert_eq!(s.current().line, Some(-2.75));
    }

    #[test]
    fn sub_period_snaps_respect_lookback_window() {
        let mut old = snap("alpha", Some(-1.5), -110, 1_000);
        old.period = Period::FirstHalf;
        let mut fresh = snap("alpha", Some(-1.0), -110, 9_000);
        fresh.period = Period::FirstHalf;
        let full_old = snap("alpha", Some(-3.5), -110, 1_000);

        let series = group_outcomes(vec![old, fresh, full_old], 10_000, Some(5_000));
        // Full-game series keeps the old snap; the 1h series drops it.
        let full = series.iter().find(|s| s.period == Period::Full).unwrap();
        let half = series.iter().find(|s| s.period == Period::FirstHalf).unwrap();
        assert_eq!(full.snapshot_count(), 1);
        assert_eq!(half.snapshot_count(), 1);
        assert_eq!(half.current().line, Some(-1.0));
    }

    #[test]
    fn missing_book_yields_no_consensus() {
        let series = group_outcomes(vec![], 0, None);
        assert!(series.is_empty());
    }
}
