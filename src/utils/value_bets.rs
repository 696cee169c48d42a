use crate::error::{EngineError, EngineResult};
use crate::models::{BestQuote, Fixture, Market, Quote, ValuePick};
use crate::utils::ev_calculator::{
    calculate_expected_value, decimal_odds_to_probability, push_adjusted_probability,
};
use crate::utils::market_probs::MarketProbabilitySet;
use crate::utils::quotes::book_matches;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

pub const DEFAULT_EDGE_THRESHOLD: f64 = 0.05;

/// How handicap pushes feed into the model probability compared against the price
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandicapPushMode {
    /// Use the raw cover probability
    #[default]
    Ignore,
    /// Treat a push as a refund and use the cover probability among settled outcomes
    Refund,
}

impl FromStr for HandicapPushMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(HandicapPushMode::Ignore),
            "refund" => Ok(HandicapPushMode::Refund),
            other => Err(format!("unknown push mode: {}", other)),
        }
    }
}

/// Knobs for value detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Minimum model-minus-implied probability for a pick
    pub edge_threshold: f64,
    /// Case-insensitive substring a book name must contain
    pub book_filter: Option<String>,
    /// Cap on the number of picks after ranking
    pub max_picks: Option<usize>,
    pub push_mode: HandicapPushMode,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            book_filter: None,
            max_picks: None,
            push_mode: HandicapPushMode::default(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !self.edge_threshold.is_finite() {
            return Err(EngineError::InvalidEdgeThreshold(self.edge_threshold));
        }
        Ok(())
    }
}

/// Model probability for the outcome a quote prices, if the model covers it
pub fn model_probability(
    set: &MarketProbabilitySet,
    quote: &Quote,
    push_mode: HandicapPushMode,
) -> Option<f64> {
    let cover = set.get(&quote.key())?;
    match (quote.market, push_mode) {
        (Market::AsianHandicap { line }, HandicapPushMode::Refund) => {
            push_adjusted_probability(cover, set.push(line)?)
        }
        _ => Some(cover),
    }
}

/// Join best quotes to model probabilities and return the value picks,
/// highest edge first.
///
/// Quotes for unknown fixtures, fixtures without a model set and outcomes the
/// model does not price are skipped.
pub fn detect(
    fixtures: &[Fixture],
    model_sets: &HashMap<String, MarketProbabilitySet>,
    best_quotes: &[BestQuote],
    config: &DetectorConfig,
) -> Vec<ValuePick> {
    let fixture_map: HashMap<&str, &Fixture> = fixtures
        .iter()
        .map(|f| (f.match_id.as_str(), f))
        .collect();

    let mut picks = Vec::new();

    for best in best_quotes {
        let quote = &best.quote;

        if let Some(filter) = config.book_filter.as_deref() {
            if !book_matches(&quote.book, filter) {
                continue;
            }
        }

        let Some(fixture) = fixture_map.get(quote.match_id.as_str()) else {
            continue;
        };
        let Some(set) = model_sets.get(&quote.match_id) else {
            continue;
        };
        let Some(model_prob) = model_probability(set, quote, config.push_mode) else {
            continue;
        };

        // Recomputed rather than trusted: the record may not come from `reconcile`
        let Some(implied_prob) = decimal_odds_to_probability(quote.price) else {
            continue;
        };
        let edge = model_prob - implied_prob;
        if !edge.is_finite() || edge < config.edge_threshold {
            continue;
        }

        picks.push(ValuePick {
            match_id: fixture.match_id.clone(),
            league: fixture.league.clone(),
            utc_kickoff: fixture.utc_kickoff,
            home: fixture.home.clone(),
            away: fixture.away.clone(),
            market: quote.market,
            selection: quote.selection,
            price: quote.price,
            book: quote.book.clone(),
            model_prob,
            implied_prob,
            edge,
            expected_value: calculate_expected_value(model_prob, quote.price),
        });
    }

    // Sort by edge (descending), earliest kickoff first on ties
    picks.sort_by(|a, b| {
        b.edge
            .partial_cmp(&a.edge)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.utc_kickoff.cmp(&b.utc_kickoff))
            .then_with(|| a.match_id.cmp(&b.match_id))
    });

    if let Some(max) = config.max_picks {
        picks.truncate(max);
    }

    picks
}

/// Narrowing applied to already-ranked picks when displaying them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PickFilter {
    /// Exact market tag, e.g. "1X2" or "OU2.5" (case-insensitive)
    pub market: Option<String>,
    pub league: Option<String>,
    /// Substring of the book name (case-insensitive)
    pub book: Option<String>,
    pub min_edge: Option<f64>,
    pub min_prob: Option<f64>,
}

impl PickFilter {
    pub fn matches(&self, pick: &ValuePick) -> bool {
        if let Some(market) = non_empty(&self.market) {
            if !pick.market.to_string().eq_ignore_ascii_case(market) {
                return false;
            }
        }
        if let Some(league) = non_empty(&self.league) {
            if !pick.league.eq_ignore_ascii_case(league) {
                return false;
            }
        }
        if let Some(book) = non_empty(&self.book) {
            if !book_matches(&pick.book, book) {
                return false;
            }
        }
        if self.min_edge.is_some_and(|m| pick.edge < m) {
            return false;
        }
        if self.min_prob.is_some_and(|m| pick.model_prob < m) {
            return false;
        }
        true
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
