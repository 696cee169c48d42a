pub mod odds_api;

pub use odds_api::{EventSample, League, LeagueStatus, OddsApiClient};
