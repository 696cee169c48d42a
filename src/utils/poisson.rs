use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default highest goal count tracked per side
pub const DEFAULT_GOAL_CAP: usize = 7;

/// Rates below this are raised to it so no scoreline gets zero probability
pub const MIN_EXPECTED_GOALS: f64 = 0.4;

/// What happens to the probability of scoring more than the goal cap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TailMode {
    /// Drop it; the table sums to slightly less than 1
    #[default]
    Truncate,
    /// Add it to the cap bucket, which then means "cap or more"
    Fold,
}

impl FromStr for TailMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "truncate" => Ok(TailMode::Truncate),
            "fold" => Ok(TailMode::Fold),
            other => Err(format!("unknown tail mode: {}", other)),
        }
    }
}

/// Joint scoreline distribution: `cell(i, j)` is P(home scores i AND away scores j)
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeTable {
    goal_cap: usize,
    cells: Vec<f64>,
}

impl OutcomeTable {
    /// Build the table from two independent Poisson rates, discarding scores
    /// above `goal_cap`.
    ///
    /// Rates below [`MIN_EXPECTED_GOALS`] are clamped up. Non-finite or negative
    /// rates and a zero goal cap are rejected.
    pub fn build(lambda_home: f64, lambda_away: f64, goal_cap: usize) -> EngineResult<Self> {
        Self::build_with(lambda_home, lambda_away, goal_cap, TailMode::Truncate)
    }

    pub fn build_with(
        lambda_home: f64,
        lambda_away: f64,
        goal_cap: usize,
        tail: TailMode,
    ) -> EngineResult<Self> {
        if goal_cap == 0 {
            return Err(EngineError::InvalidGoalCap);
        }
        let home = poisson_pmf(clamp_rate(lambda_home)?, goal_cap, tail);
        let away = poisson_pmf(clamp_rate(lambda_away)?, goal_cap, tail);

        let size = goal_cap + 1;
        let mut cells = Vec::with_capacity(size * size);
        for p_home in &home {
            for p_away in &away {
                cells.push(p_home * p_away);
            }
        }

        Ok(Self { goal_cap, cells })
    }

    pub fn goal_cap(&self) -> usize {
        self.goal_cap
    }

    pub fn cell(&self, home_goals: usize, away_goals: usize) -> f64 {
        self.cells[home_goals * (self.goal_cap + 1) + away_goals]
    }

    /// Iterate `(home_goals, away_goals, probability)` over every cell
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let size = self.goal_cap + 1;
        self.cells
            .iter()
            .enumerate()
            .map(move |(idx, p)| (idx / size, idx % size, *p))
    }

    /// Sum of every cell satisfying `predicate(home_goals, away_goals)`
    pub fn sum_where<F>(&self, predicate: F) -> f64
    where
        F: Fn(usize, usize) -> bool,
    {
        self.iter()
            .filter(|(i, j, _)| predicate(*i, *j))
            .map(|(_, _, p)| p)
            .sum()
    }

    /// P(home scores exactly `goals`)
    pub fn home_marginal(&self, goals: usize) -> f64 {
        (0..=self.goal_cap).map(|j| self.cell(goals, j)).sum()
    }

    /// P(away scores exactly `goals`)
    pub fn away_marginal(&self, goals: usize) -> f64 {
        (0..=self.goal_cap).map(|i| self.cell(i, goals)).sum()
    }

    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }
}

fn clamp_rate(lambda: f64) -> EngineResult<f64> {
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(EngineError::InvalidRate(lambda));
    }
    Ok(lambda.max(MIN_EXPECTED_GOALS))
}

/// Poisson probabilities for 0..=max_k goals
fn poisson_pmf(lambda: f64, max_k: usize, tail: TailMode) -> Vec<f64> {
    let mut out = vec![0.0; max_k + 1];
    out[0] = (-lambda).exp();
    for k in 1..=max_k {
        out[k] = out[k - 1] * lambda / k as f64;
    }

    if tail == TailMode::Fold {
        let sum: f64 = out.iter().sum();
        if sum < 1.0 {
            out[max_k] += 1.0 - sum;
        }
    }
    out
}
