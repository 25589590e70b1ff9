use crate::error::{AppError, Result};

pub const ODDS_API_URL: &str = "https://api.the-odds-api.com";

/// Periodic lifecycle sweep interval (seconds).
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Odds-feed sync interval (seconds): how often to re-fetch games and append
/// fresh price snapshots per sport.
pub const ODDS_REFRESH_INTERVAL_SECS: u64 = 300;

/// Grace period after a game's commence time before the sweep expires its
/// edges (milliseconds). The explicit game-started path ignores this.
pub const EXPIRY_GRACE_MS: i64 = 5 * 60 * 1000;

/// An edge starts fading once its evaluated magnitude drops to this fraction
/// of the magnitude recorded at detection time.
pub const FADING_RATIO: f64 = 0.5;

/// Minimum favorable movement before each rule fires. Inclusive: a movement
/// exactly at the minimum counts.
pub mod detection_min {
    /// Spread / total / player-prop line movement (points).
    pub const POINT_MOVE: f64 = 0.5;
    /// Moneyline movement (price cents).
    pub const ML_MOVE_CENTS: f64 = 10.0;
    /// Vig reduction at constant line (cents).
    pub const JUICE_CENTS: f64 = 5.0;
    /// Soft-vs-sharp divergence (points).
    pub const DIVERGENCE_POINTS: f64 = 1.0;
    /// Soft-vs-sharp divergence on moneylines (cents).
    pub const DIVERGENCE_CENTS: f64 = 15.0;
}

/// CEQ band floors. `LEAN` is the edge-counting threshold; the higher bands
/// only label severity.
pub mod ceq_bands {
    pub const LEAN: f64 = 56.0;
    pub const EDGE: f64 = 66.0;
    pub const STRONG: f64 = 76.0;
    pub const RARE: f64 = 86.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub odds_api_url: String,
    pub odds_api_key: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Reference book assumed to price most accurately (SHARP_BOOK).
    pub sharp_book: String,
    /// Secret compared against the bulk trigger credential (CRON_SECRET).
    /// Empty means the bulk trigger always rejects.
    pub cron_secret: String,
    /// Sports to sync and detect on (SPORTS, comma-separated).
    pub sports: Vec<String>,
    /// Concurrent game pipelines per detection cycle (DETECT_BATCH_SIZE).
    pub detect_batch_size: usize,
    /// Lookback window for sub-period snapshots in hours (PERIOD_LOOKBACK_HOURS,
    /// 0 = unrestricted). Full-game detection is always unrestricted.
    pub period_lookback_hours: f64,
    /// Wall-clock budget for one detection cycle in seconds
    /// (CYCLE_BUDGET_SECS, 0 = unrestricted). Games still queued when the
    /// budget runs out are abandoned until the next cycle.
    pub cycle_budget_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            odds_api_url: std::env::var("ODDS_API_URL")
                .unwrap_or_else(|_| ODDS_API_URL.to_string()),
            odds_api_key: std::env::var("ODDS_API_KEY").unwrap_or_default(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "edgewatch.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            sharp_book: std::env::var("SHARP_BOOK").unwrap_or_else(|_| "pinnacle".to_string()),
            cron_secret: std::env::var("CRON_SECRET").unwrap_or_default(),
            sports: std::env::var("SPORTS")
                .unwrap_or_else(|_| "basketball_nba,americanfootball_nfl".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            detect_batch_size: std::env::var("DETECT_BATCH_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<usize>()
                .unwrap_or(10)
                .max(1),
            period_lookback_hours: std::env::var("PERIOD_LOOKBACK_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse::<f64>()
                .unwrap_or(24.0),
            cycle_budget_secs: std::env::var("CYCLE_BUDGET_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse::<u64>()
                .unwrap_or(120),
        })
    }

    /// Sub-period lookback in milliseconds; None when unrestricted.
    pub fn period_lookback_ms(&self) -> Option<i64> {
        if self.period_lookback_hours <= 0.0 {
            None
        } else {
            Some((self.period_lookback_hours * 3_600_000.0) as i64)
        }
    }
}
