/// Convert decimal odds to implied probability
/// Decimal odds of 2.50 return 2.50 per unit staked, so the market implies 40%
/// Returns `None` for prices that are not valid decimal odds
pub fn decimal_odds_to_probability(price: f64) -> Option<f64> {
    if !price.is_finite() || price <= 1.0 {
        return None;
    }
    Some(1.0 / price)
}

/// Calculate expected value for a bet
/// EV = (probability of winning * net winnings) - (probability of losing * stake)
/// Returns EV per unit staked
pub fn calculate_expected_value(model_prob: f64, price: f64) -> f64 {
    let win_amount = price - 1.0;
    let prob_lose = 1.0 - model_prob;

    (model_prob * win_amount) - prob_lose
}

/// Probability that prices a handicap bet fairly when a push refunds the stake:
/// the chance of covering given the bet does not push
pub fn push_adjusted_probability(cover: f64, push: f64) -> Option<f64> {
    let settled = 1.0 - push;
    if settled <= 0.0 || !settled.is_finite() {
        return None;
    }
    Some(cover / settled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_odds_to_probability() {
        let prob = decimal_odds_to_probability(2.0).unwrap();
        assert!((prob - 0.5).abs() < 1e-12);
        let prob = decimal_odds_to_probability(2.10).unwrap();
        assert!((prob - 0.47619).abs() < 1e-5);
        assert_eq!(decimal_odds_to_probability(1.0), None);
        assert_eq!(decimal_odds_to_probability(0.5), None);
        assert_eq!(decimal_odds_to_probability(f64::NAN), None);
        assert_eq!(decimal_odds_to_probability(f64::INFINITY), None);
    }

    #[test]
    fn test_calculate_expected_value() {
        // Positive EV scenario: 60% win probability at 2.50
        let ev = calculate_expected_value(0.6, 2.5);
        assert!((ev - 0.5).abs() < 1e-12);

        // Negative EV scenario: 40% win probability at 1.67
        let ev = calculate_expected_value(0.4, 1.67);
        assert!(ev < 0.0);
    }

    #[test]
    fn test_push_adjusted_probability() {
        let p = push_adjusted_probability(0.4, 0.2).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
        assert_eq!(push_adjusted_probability(0.0, 1.0), None);
    }
}
