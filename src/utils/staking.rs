use crate::error::{EngineError, EngineResult};
use crate::models::{StakedPick, ValuePick};

pub const DEFAULT_MIN_STAKE_PCT: f64 = 0.0025;
pub const DEFAULT_MAX_STAKE_PCT: f64 = 0.025;

const KELLY_MULTIPLIER: f64 = 0.5;

/// Full Kelly fraction for decimal odds: f* = (b*p - (1 - p)) / b with b = price - 1.
/// Returns 0.0 when the net odds are not positive.
pub fn kelly_fraction(probability: f64, price: f64) -> f64 {
    let b = price - 1.0;
    if !b.is_finite() || b <= 0.0 {
        return 0.0;
    }
    (b * probability - (1.0 - probability)) / b
}

/// Round to the smallest reportable currency unit (cents)
pub fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Half-Kelly staking clamped to a band of the bankroll.
///
/// A positive Kelly fraction is always staked at least `min_pct`, so small
/// edges still get a meaningful stake; below the floor the recommendation is
/// no longer Kelly-optimal. No positive Kelly fraction means no stake at all.
#[derive(Debug, Clone, PartialEq)]
pub struct StakeSizer {
    bankroll: f64,
    min_pct: f64,
    max_pct: f64,
}

impl StakeSizer {
    pub fn new(bankroll: f64, min_pct: f64, max_pct: f64) -> EngineResult<Self> {
        if !bankroll.is_finite() || bankroll < 0.0 {
            return Err(EngineError::InvalidBankroll(bankroll));
        }
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(min_pct) || !in_unit(max_pct) || min_pct > max_pct {
            return Err(EngineError::InvalidStakeBounds {
                min: min_pct,
                max: max_pct,
            });
        }
        Ok(Self {
            bankroll,
            min_pct,
            max_pct,
        })
    }

    pub fn bankroll(&self) -> f64 {
        self.bankroll
    }

    /// Fraction of bankroll to stake at `price` given win `probability`
    pub fn stake_fraction(&self, probability: f64, price: f64) -> f64 {
        let full = kelly_fraction(probability, price);
        if !full.is_finite() || full <= 0.0 {
            return 0.0;
        }
        (full * KELLY_MULTIPLIER).clamp(self.min_pct, self.max_pct)
    }

    pub fn size(&self, pick: ValuePick) -> StakedPick {
        let stake_pct = self.stake_fraction(pick.model_prob, pick.price);
        let stake_amt = round_to_cents(self.bankroll * stake_pct);
        StakedPick {
            pick,
            stake_pct,
            stake_amt,
        }
    }

    pub fn size_all(&self, picks: Vec<ValuePick>) -> Vec<StakedPick> {
        picks.into_iter().map(|pick| self.size(pick)).collect()
    }
}
