use crate::error::{EngineError, EngineResult};
use crate::models::Line;
use crate::utils::poisson::{TailMode, DEFAULT_GOAL_CAP};
use crate::utils::predictor::BaselinePredictor;
use crate::utils::staking::{StakeSizer, DEFAULT_MAX_STAKE_PCT, DEFAULT_MIN_STAKE_PCT};
use crate::utils::value_bets::{DetectorConfig, HandicapPushMode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_BANKROLL: f64 = 500.0;
pub const DEFAULT_HOURS_AHEAD: i64 = 240;
pub const DEFAULT_MAX_PICKS: usize = 50;
pub const DEFAULT_LEAGUES: &str = "EPL,LaLiga";
pub const DEFAULT_REGIONS: &str = "uk,eu,us";
pub const DEFAULT_PORT: u16 = 8000;

/// Totals lines priced for a fixture when no quote names one
pub const DEFAULT_OU_LINES: [f64; 2] = [2.5, 3.5];

/// Everything the pure engine needs for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub goal_cap: usize,
    pub tail_mode: TailMode,
    pub predictor: BaselinePredictor,
    pub detector: DetectorConfig,
    pub bankroll: f64,
    pub min_stake_pct: f64,
    pub max_stake_pct: f64,
    pub default_ou_lines: Vec<Line>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            goal_cap: DEFAULT_GOAL_CAP,
            tail_mode: TailMode::default(),
            predictor: BaselinePredictor::default(),
            detector: DetectorConfig {
                max_picks: Some(DEFAULT_MAX_PICKS),
                ..Default::default()
            },
            bankroll: DEFAULT_BANKROLL,
            min_stake_pct: DEFAULT_MIN_STAKE_PCT,
            max_stake_pct: DEFAULT_MAX_STAKE_PCT,
            default_ou_lines: DEFAULT_OU_LINES.iter().filter_map(|v| Line::new(*v)).collect(),
        }
    }
}

impl EngineConfig {
    /// Reject settings that would make every fixture or every pick fail
    pub fn validate(&self) -> EngineResult<()> {
        if self.goal_cap == 0 {
            return Err(EngineError::InvalidGoalCap);
        }
        self.detector.validate()?;
        self.stake_sizer().map(|_| ())
    }

    pub fn stake_sizer(&self) -> EngineResult<StakeSizer> {
        StakeSizer::new(self.bankroll, self.min_stake_pct, self.max_stake_pct)
    }

    /// Build from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let book_filter = std::env::var("BOOK_FILTER")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            goal_cap: env_or("GOAL_CAP", defaults.goal_cap)?,
            tail_mode: env_or("GOAL_TAIL", defaults.tail_mode)?,
            predictor: BaselinePredictor {
                home_xg: env_or("BASE_HOME_XG", defaults.predictor.home_xg)?,
                away_xg: env_or("BASE_AWAY_XG", defaults.predictor.away_xg)?,
                min_xg: defaults.predictor.min_xg,
            },
            detector: DetectorConfig {
                edge_threshold: env_or("EDGE_THRESHOLD", defaults.detector.edge_threshold)?,
                book_filter,
                max_picks: Some(env_or("MAX_PICKS", DEFAULT_MAX_PICKS)?),
                push_mode: env_or("AH_PUSH_MODE", HandicapPushMode::default())?,
            },
            bankroll: env_or("BANKROLL", defaults.bankroll)?,
            min_stake_pct: env_or("MIN_STAKE_PCT", defaults.min_stake_pct)?,
            max_stake_pct: env_or("MAX_STAKE_PCT", defaults.max_stake_pct)?,
            default_ou_lines: defaults.default_ou_lines,
        })
    }
}

/// Runtime settings for the binaries: data source, leagues and the engine
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub odds_api_key: Option<String>,
    pub leagues: Vec<String>,
    pub hours_ahead: i64,
    pub regions: String,
    pub use_cache: bool,
    pub save_csv: bool,
    pub run_token: Option<String>,
    pub port: u16,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Load `.env` (if present) and read the environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            odds_api_key: non_empty_var("ODDS_API_KEY"),
            leagues: parse_leagues(
                &std::env::var("LEAGUES").unwrap_or_else(|_| DEFAULT_LEAGUES.to_string()),
            ),
            hours_ahead: env_or("HOURS_AHEAD", DEFAULT_HOURS_AHEAD)?,
            regions: non_empty_var("ODDS_REGIONS").unwrap_or_else(|| DEFAULT_REGIONS.to_string()),
            use_cache: std::env::var("USE_CACHE").unwrap_or_default() == "1",
            save_csv: std::env::var("SAVE_CSV").unwrap_or_default() == "1",
            run_token: non_empty_var("RUN_TOKEN"),
            port: env_or("PORT", DEFAULT_PORT)?,
            engine: EngineConfig::from_env()?,
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.odds_api_key
            .as_deref()
            .context("ODDS_API_KEY not set in environment or .env file")
    }
}

/// Split a comma-separated league list, dropping blanks
pub fn parse_leagues(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_config() {
        let config = EngineConfig::default();
        assert_eq!(config.goal_cap, 7);
        assert_eq!(config.detector.edge_threshold, 0.05);
        assert_eq!(config.detector.max_picks, Some(50));
        assert_eq!(config.default_ou_lines.len(), 2);
        assert_eq!(config.tail_mode, TailMode::Truncate);
        assert!(config.stake_sizer().is_ok());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_goal_cap() {
        let config = EngineConfig {
            goal_cap: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(EngineError::InvalidGoalCap));
    }

    #[test]
    fn test_parse_leagues() {
        assert_eq!(parse_leagues(" EPL, ,LaLiga ,"), vec!["EPL", "LaLiga"]);
        assert!(parse_leagues("").is_empty());
    }

    #[test]
    fn test_env_or() {
        std::env::set_var("FVB_TEST_GOAL_CAP", "9");
        assert_eq!(env_or("FVB_TEST_GOAL_CAP", 7usize).unwrap(), 9);
        std::env::set_var("FVB_TEST_BAD_EDGE", "lots");
        assert!(env_or("FVB_TEST_BAD_EDGE", 0.05f64).is_err());
        assert_eq!(env_or("FVB_TEST_UNSET_VALUE", 3i64).unwrap(), 3);
        std::env::set_var("FVB_TEST_PUSH_MODE", "Refund");
        assert_eq!(
            env_or("FVB_TEST_PUSH_MODE", HandicapPushMode::Ignore).unwrap(),
            HandicapPushMode::Refund
        );
    }
}
