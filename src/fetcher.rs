//! Odds-feed client. Pulls per-sport odds boards and flattens them into game
//! metadata plus immutable price snapshots. Rows the feed cannot express in
//! our taxonomy are counted and dropped, never guessed at.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{now_ms, Game, MarketType, Period, PriceSnapshot};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiGame {
    id: String,
    sport_key: String,
    commence_time: String,
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<ApiBookmaker>,
}

#[derive(Debug, Deserialize)]
struct ApiBookmaker {
    key: String,
    #[serde(default)]
    markets: Vec<ApiMarket>,
}

#[derive(Debug, Deserialize)]
struct ApiMarket {
    key: String,
    #[serde(default)]
    outcomes: Vec<ApiOutcome>,
}

#[derive(Debug, Deserialize)]
struct ApiOutcome {
    name: String,
    price: f64,
    point: Option<f64>,
    /// Present on player props; keyed into the outcome.
    description: Option<String>,
}

// ---------------------------------------------------------------------------
// Accounting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchStats {
    pub games: u64,
    pub snapshots: u64,
    pub unknown_market: u64,
    pub bad_timestamp: u64,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub games: Vec<Game>,
    pub snapshots: Vec<PriceSnapshot>,
    pub stats: FetchStats,
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

pub struct OddsFetcher {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OddsFetcher {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.odds_api_url.clone(),
            api_key: config.odds_api_key.clone(),
        }
    }

    /// Fetch the current odds board for one sport.
    pub async fn fetch_sport(&self, sport: &str) -> Result<FetchOutcome> {
        if self.api_key.is_empty() {
            return Err(AppError::Feed("ODDS_API_KEY is not configured".to_string()));
        }
        let url = format!(
            "{}/v4/sports/{}/odds?apiKey={}&regions=us,eu&markets=h2h,spreads,totals&oddsFormat=american",
            self.base_url, sport, self.api_key
        );
        let api_games: Vec<ApiGame> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let ts = now_ms();
        let mut stats = FetchStats::default();
        let mut games = Vec::with_capacity(api_games.len());
        let mut snapshots = Vec::new();

        for api_game in api_games {
            let commence_time_ms = match parse_iso_to_unix_ms(&api_game.commence_time) {
                Some(ms) => Some(ms),
                None => {
                    stats.bad_timestamp += 1;
                    warn!(
                        game_id = %api_game.id,
                        raw = %api_game.commence_time,
                        "unparseable commence time"
                    );
                    None
                }
            };

            for bookmaker in &api_game.bookmakers {
                for market in &bookmaker.markets {
                    let Some((market_type, period)) = parse_market_key(&market.key) else {
                        stats.unknown_market += 1;
                        continue;
                    };
                    for outcome in &market.outcomes {
                        let name = map_outcome(
                            &outcome.name,
                            outcome.description.as_deref(),
                            &api_game.home_team,
                            &api_game.away_team,
                        );
                        snapshots.push(PriceSnapshot {
                            game_id: api_game.id.clone(),
                            market_type,
                            period,
                            book: bookmaker.key.clone(),
                            outcome: name,
                            line: outcome.point,
                            price: outcome.price.round() as i32,
                            snapshot_at_ms: ts,
                        });
                        stats.snapshots += 1;
                    }
                }
            }

            games.push(Game {
                id: api_game.id,
                sport: api_game.sport_key,
                home_team: api_game.home_team,
                away_team: api_game.away_team,
                commence_time_ms,
            });
            stats.games += 1;
        }

        debug!(
            sport,
            games = stats.games,
            snapshots = stats.snapshots,
            unknown_market = stats.unknown_market,
            "fetched odds board"
        );
        Ok(FetchOutcome { games, snapshots, stats })
    }
}

/// Feed market key -> (market, period). Period-qualified keys carry a suffix
/// like `h2h_h1` or `totals_q3`.
fn parse_market_key(key: &str) -> Option<(MarketType, Period)> {
    let (base, period) = match key.rsplit_once('_') {
        Some((base, suffix)) if is_period_suffix(suffix) => (base, parse_period_suffix(suffix)?),
        _ => (key, Period::Full),
    };
    let market_type = match base {
        "h2h" => MarketType::Moneyline,
        "spreads" => MarketType::Spread,
        "totals" => MarketType::Total,
        "player_points" | "player_rebounds" | "player_assists" => MarketType::PlayerProp,
        _ => return None,
    };
    Some((market_type, period))
}

fn is_period_suffix(s: &str) -> bool {
    matches!(s, "h1" | "h2" | "q1" | "q2" | "q3" | "q4" | "p1" | "p2" | "p3")
}

fn parse_period_suffix(s: &str) -> Option<Period> {
    match s {
        "h1" => Some(Period::FirstHalf),
        "h2" => Some(Period::SecondHalf),
        "q1" => Some(Period::FirstQuarter),
        "q2" => Some(Period::SecondQuarter),
        "q3" => Some(Period::ThirdQuarter),
        "q4" => Some(Period::FourthQuarter),
        "p1" => Some(Period::FirstPeriod),
        "p2" => Some(Period::SecondPeriod),
        "p3" => Some(Period::ThirdPeriod),
        _ => None,
    }
}

/// Normalize feed outcome names: team names become `home`/`away`, totals
/// sides lowercase, player props become `<player>|<side>`.
fn map_outcome(name: &str, description: Option<&str>, home_team: &str, away_team: &str) -> String {
    if name == home_team {
        return "home".to_string();
    }
    if name == away_team {
        return "away".to_string();
    }
    match description {
        Some(player) => format!("{player}|{}", name.to_ascii_lowercase()),
        None => name.to_ascii_lowercase(),
    }
}

/// Parse `YYYY-MM-DDTHH:MM:SSZ` (optionally with fractional seconds) into
/// epoch milliseconds without pulling in a datetime crate.
fn parse_iso_to_unix_ms(s: &str) -> Option<i64> {
    let s = s.strip_suffix('Z')?;
    let (date, time) = s.split_once('T')?;

    let mut date_parts = date.split('-');
    let year: i64 = date_parts.next()?.parse().ok()?;
    let month: i64 = date_parts.next()?.parse().ok()?;
    let day: i64 = date_parts.next()?.parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let mut time_parts = time.split(':');
    let hour: i64 = time_parts.next()?.parse().ok()?;
    let minute: i64 = time_parts.next()?.parse().ok()?;
    let second_field = time_parts.next()?;
    let second: i64 = second_field
        .split('.')
        .next()?
        .parse()
        .ok()?;
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }

    // Civil date -> days since epoch (Gregorian, proleptic).
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    let days = era * 146_097 + doe - 719_468;

    Some((days * 86_400 + hour * 3_600 + minute * 60 + second) * 1_000)
}
