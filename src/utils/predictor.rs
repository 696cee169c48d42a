use crate::models::{ExpectedGoals, Fixture};
use crate::utils::poisson::MIN_EXPECTED_GOALS;
use serde::{Deserialize, Serialize};

pub const BASE_HOME_XG: f64 = 1.45;
pub const BASE_AWAY_XG: f64 = 1.25;

/// Source of expected-goals rates for a fixture
pub trait GoalsPredictor {
    fn predict(&self, fixture: &Fixture) -> ExpectedGoals;
}

/// Same baseline rates for every fixture, floored at `min_xg`.
/// A placeholder until team strengths are estimated from results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselinePredictor {
    pub home_xg: f64,
    pub away_xg: f64,
    pub min_xg: f64,
}

impl Default for BaselinePredictor {
    fn default() -> Self {
        Self {
            home_xg: BASE_HOME_XG,
            away_xg: BASE_AWAY_XG,
            min_xg: MIN_EXPECTED_GOALS,
        }
    }
}

impl GoalsPredictor for BaselinePredictor {
    fn predict(&self, _fixture: &Fixture) -> ExpectedGoals {
        ExpectedGoals::new(self.home_xg, self.away_xg).clamped(self.min_xg)
    }
}
