use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::models::{Fixture, Line, Market, ModelRow, Quote, StakedPick};
use crate::utils::market_probs::MarketProbabilitySet;
use crate::utils::poisson::OutcomeTable;
use crate::utils::predictor::GoalsPredictor;
use crate::utils::quotes::{filter_books, reconcile};
use crate::utils::value_bets::detect;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

/// Outcome of one engine run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub fixtures: usize,
    pub quotes: usize,
    pub model_sets: usize,
    pub best_quotes: usize,
    /// Fixtures whose probabilities could not be computed
    pub skipped_fixtures: Vec<String>,
    /// Model probabilities of every priced fixture, in fixture order
    pub model: Vec<ModelRow>,
    pub picks: Vec<StakedPick>,
}

/// Totals and handicap lines the market actually quotes for one fixture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotedLines {
    pub totals: BTreeSet<Line>,
    pub handicaps: BTreeSet<Line>,
}

/// Group the quoted lines by fixture so the model only prices what is offered
pub fn quoted_lines(quotes: &[Quote]) -> HashMap<String, QuotedLines> {
    let mut lines: HashMap<String, QuotedLines> = HashMap::new();
    for quote in quotes {
        match quote.market {
            Market::Totals { line } => {
                lines
                    .entry(quote.match_id.clone())
                    .or_default()
                    .totals
                    .insert(line);
            }
            Market::AsianHandicap { line } => {
                lines
                    .entry(quote.match_id.clone())
                    .or_default()
                    .handicaps
                    .insert(line);
            }
            Market::Moneyline | Market::BothTeamsScore => {}
        }
    }
    lines
}

/// Model probabilities per fixture, plus the ids of fixtures that had to be skipped
pub fn build_model_sets<P>(
    fixtures: &[Fixture],
    quotes: &[Quote],
    predictor: &P,
    config: &EngineConfig,
) -> (HashMap<String, MarketProbabilitySet>, Vec<String>)
where
    P: GoalsPredictor + ?Sized,
{
    let lines = quoted_lines(quotes);
    let mut sets = HashMap::new();
    let mut skipped = Vec::new();

    for fixture in fixtures {
        let quoted = lines.get(&fixture.match_id);
        let ou_lines: Vec<Line> = match quoted {
            Some(q) if !q.totals.is_empty() => q.totals.iter().copied().collect(),
            _ => config.default_ou_lines.clone(),
        };
        let ah_lines: Vec<Line> = quoted
            .map(|q| q.handicaps.iter().copied().collect())
            .unwrap_or_default();

        let xg = predictor.predict(fixture);
        match OutcomeTable::build_with(xg.home, xg.away, config.goal_cap, config.tail_mode) {
            Ok(table) => {
                let set = MarketProbabilitySet::extract(&table, &ou_lines, &ah_lines);
                sets.insert(fixture.match_id.clone(), set);
            }
            Err(e) => {
                warn!("Skipping {} ({}): {}", fixture.match_id, fixture.label(), e);
                skipped.push(fixture.match_id.clone());
            }
        }
    }

    (sets, skipped)
}

/// Run the whole engine: price every fixture, reconcile quotes, detect value
/// and size stakes.
///
/// Bad fixtures and quotes are skipped; only invalid configuration fails.
pub fn run<P>(
    fixtures: &[Fixture],
    quotes: &[Quote],
    predictor: &P,
    config: &EngineConfig,
) -> EngineResult<RunReport>
where
    P: GoalsPredictor + ?Sized,
{
    config.validate()?;
    let sizer = config.stake_sizer()?;

    let quotes = filter_books(quotes, config.detector.book_filter.as_deref());
    let (model_sets, skipped_fixtures) = build_model_sets(fixtures, &quotes, predictor, config);
    let model: Vec<ModelRow> = fixtures
        .iter()
        .filter_map(|f| model_sets.get(&f.match_id).map(|set| set.rows(&f.match_id)))
        .flatten()
        .collect();
    let best_quotes = reconcile(&quotes);
    let picks = detect(fixtures, &model_sets, &best_quotes, &config.detector);
    let picks = sizer.size_all(picks);

    info!(
        "{} fixtures, {} quotes, {} best prices, {} picks ({} fixtures skipped)",
        fixtures.len(),
        quotes.len(),
        best_quotes.len(),
        picks.len(),
        skipped_fixtures.len()
    );

    Ok(RunReport {
        fixtures: fixtures.len(),
        quotes: quotes.len(),
        model_sets: model_sets.len(),
        best_quotes: best_quotes.len(),
        skipped_fixtures,
        model,
        picks,
    })
}
