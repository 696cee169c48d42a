use crate::error::EngineResult;
use crate::models::{Line, LineKind, Market, MarketKey, ModelRow, Selection};
use crate::utils::poisson::OutcomeTable;
use std::collections::BTreeMap;

/// Which team's goal margin a handicap is settled on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    Home,
    Away,
}

/// Settlement probabilities of one handicap bet. Anything that is neither a
/// cover nor a push loses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandicapOutcome {
    pub cover: f64,
    pub push: f64,
}

impl HandicapOutcome {
    pub fn lose(&self) -> f64 {
        1.0 - self.cover - self.push
    }
}

/// Cover and push probabilities for a handicap `line` seen from `perspective`.
///
/// The side covers when its own margin (goals for minus goals against) exceeds
/// `line` and pushes when the margin equals it. Quarter lines are settled as two
/// half stakes on the neighbouring whole/half lines. Lines that are not a
/// multiple of a quarter goal return `None`.
pub fn handicap_outcome(
    table: &OutcomeTable,
    perspective: Perspective,
    line: Line,
) -> Option<HandicapOutcome> {
    match line.kind() {
        LineKind::Whole | LineKind::Half => Some(settle(table, perspective, line)),
        LineKind::Quarter => {
            let (lower, upper) = line.quarter_split()?;
            let lo = settle(table, perspective, lower);
            let hi = settle(table, perspective, upper);
            Some(HandicapOutcome {
                cover: 0.5 * (lo.cover + hi.cover),
                push: 0.5 * (lo.push + hi.push),
            })
        }
        LineKind::Irregular => None,
    }
}

// Whole and half lines only; margins compared in hundredths so equality is exact
fn settle(table: &OutcomeTable, perspective: Perspective, line: Line) -> HandicapOutcome {
    let threshold = line.hundredths();
    let mut cover = 0.0;
    let mut push = 0.0;

    for (home_goals, away_goals, p) in table.iter() {
        let diff = (home_goals as i32 - away_goals as i32) * 100;
        let margin = match perspective {
            Perspective::Home => diff,
            Perspective::Away => -diff,
        };
        if margin > threshold {
            cover += p;
        } else if margin == threshold {
            push += p;
        }
    }

    HandicapOutcome { cover, push }
}

/// P(total goals > line)
pub fn prob_over(table: &OutcomeTable, line: Line) -> f64 {
    let threshold = line.hundredths();
    table.sum_where(|i, j| ((i + j) as i32) * 100 > threshold)
}

/// Model probabilities for every priced outcome of one fixture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketProbabilitySet {
    probs: BTreeMap<MarketKey, f64>,
    /// Handicap push probability by home-relative line
    pushes: BTreeMap<Line, f64>,
}

impl MarketProbabilitySet {
    /// Derive 1X2, BTTS, the requested totals lines and the requested
    /// home-relative handicap lines from a scoreline table.
    pub fn extract(table: &OutcomeTable, ou_lines: &[Line], ah_home_lines: &[Line]) -> Self {
        let mut set = Self::default();

        // 1X2
        let home = table.sum_where(|i, j| i > j);
        let draw = table.sum_where(|i, j| i == j);
        let away = table.sum_where(|i, j| i < j);
        set.insert(MarketKey::new(Market::Moneyline, Selection::Home), home);
        set.insert(MarketKey::new(Market::Moneyline, Selection::Draw), draw);
        set.insert(MarketKey::new(Market::Moneyline, Selection::Away), away);

        // BTTS by inclusion-exclusion
        let btts_yes = 1.0 - table.home_marginal(0) - table.away_marginal(0) + table.cell(0, 0);
        set.insert(MarketKey::new(Market::BothTeamsScore, Selection::Yes), btts_yes);
        set.insert(MarketKey::new(Market::BothTeamsScore, Selection::No), 1.0 - btts_yes);

        for &line in ou_lines {
            let over = prob_over(table, line);
            let market = Market::Totals { line };
            set.insert(MarketKey::new(market, Selection::Over), over);
            set.insert(MarketKey::new(market, Selection::Under), 1.0 - over);
        }

        for &line in ah_home_lines {
            let Some(home_side) = handicap_outcome(table, Perspective::Home, line) else {
                tracing::debug!("skipping non-handicap line {}", line);
                continue;
            };
            let Some(away_side) = handicap_outcome(table, Perspective::Away, line.negate()) else {
                continue;
            };
            let market = Market::AsianHandicap { line };
            set.insert(MarketKey::new(market, Selection::Home), home_side.cover);
            set.insert(MarketKey::new(market, Selection::Away), away_side.cover);
            set.pushes.insert(line, home_side.push);
        }

        set
    }

    pub fn insert(&mut self, key: MarketKey, probability: f64) {
        self.probs.insert(key, probability);
    }

    pub fn get(&self, key: &MarketKey) -> Option<f64> {
        self.probs.get(key).copied()
    }

    pub fn probability(&self, market: Market, selection: Selection) -> Option<f64> {
        self.get(&MarketKey::new(market, selection))
    }

    /// Push probability of the handicap at home-relative `line`, if it was extracted
    pub fn push(&self, line: Line) -> Option<f64> {
        self.pushes.get(&line).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MarketKey, &f64)> {
        self.probs.iter()
    }

    /// Every probability as an export row, in key order
    pub fn rows(&self, match_id: &str) -> Vec<ModelRow> {
        self.probs
            .iter()
            .map(|(key, &probability)| ModelRow {
                match_id: match_id.to_string(),
                market: key.market,
                selection: key.selection,
                probability,
                push: match key.market {
                    Market::AsianHandicap { line } => self.push(line),
                    _ => None,
                },
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }
}

/// Build the scoreline table and extract every market probability in one go
pub fn market_probs(
    lambda_home: f64,
    lambda_away: f64,
    goal_cap: usize,
    ou_lines: &[Line],
    ah_home_lines: &[Line],
) -> EngineResult<MarketProbabilitySet> {
    let table = OutcomeTable::build(lambda_home, lambda_away, goal_cap)?;
    Ok(MarketProbabilitySet::extract(&table, ou_lines, ah_home_lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::poisson::{TailMode, DEFAULT_GOAL_CAP};

    const TOLERANCE: f64 = 1e-6;

    fn line(value: f64) -> Line {
        Line::new(value).unwrap()
    }

    fn lines(values: &[f64]) -> Vec<Line> {
        values.iter().map(|v| line(*v)).collect()
    }

    fn moneyline_total(set: &MarketProbabilitySet) -> f64 {
        [Selection::Home, Selection::Draw, Selection::Away]
            .iter()
            .map(|s| set.probability(Market::Moneyline, *s).unwrap())
            .sum()
    }

    #[test]
    fn test_1x2_sums_to_one() {
        // A cap well above the rates loses less than the tolerance to truncation
        for &(lh, la) in &[(1.45, 1.25), (0.4, 0.4), (1.2, 0.8)] {
            let set = market_probs(lh, la, 10, &[], &[]).unwrap();
            assert!((moneyline_total(&set) - 1.0).abs() < TOLERANCE, "lh={lh} la={la}");
        }

        // Folding the tail makes it exact for any cap
        for &(lh, la) in &[(1.45, 1.25), (0.4, 0.4), (2.8, 0.6), (3.0, 3.0)] {
            for cap in [5, 7, 10] {
                let table = OutcomeTable::build_with(lh, la, cap, TailMode::Fold).unwrap();
                let set = MarketProbabilitySet::extract(&table, &[], &[]);
                assert!((moneyline_total(&set) - 1.0).abs() < TOLERANCE, "lh={lh} la={la} cap={cap}");
            }
        }
    }

    #[test]
    fn test_truncated_1x2_matches_table_mass() {
        let table = OutcomeTable::build(3.0, 3.0, 5).unwrap();
        let set = MarketProbabilitySet::extract(&table, &[], &[]);
        assert!((moneyline_total(&set) - table.total()).abs() < 1e-12);
        assert!(table.total() < 0.9);
    }

    #[test]
    fn test_draw_probability_sanity() {
        let set = market_probs(1.45, 1.25, DEFAULT_GOAL_CAP, &[], &[]).unwrap();
        let draw = set.probability(Market::Moneyline, Selection::Draw).unwrap();
        assert!(draw > 0.20 && draw < 0.30, "draw = {draw}");
        let home = set.probability(Market::Moneyline, Selection::Home).unwrap();
        let away = set.probability(Market::Moneyline, Selection::Away).unwrap();
        assert!(home > away);
    }

    #[test]
    fn test_over_under_complement() {
        let ou = lines(&[0.5, 1.5, 2.0, 2.5, 3.25, 4.5]);
        let set = market_probs(1.45, 1.25, DEFAULT_GOAL_CAP, &ou, &[]).unwrap();
        for l in ou {
            let market = Market::Totals { line: l };
            let over = set.probability(market, Selection::Over).unwrap();
            let under = set.probability(market, Selection::Under).unwrap();
            assert!((over + under - 1.0).abs() < TOLERANCE);
        }
        let over_05 = set.probability(Market::Totals { line: line(0.5) }, Selection::Over).unwrap();
        let over_25 = set.probability(Market::Totals { line: line(2.5) }, Selection::Over).unwrap();
        assert!(over_05 > over_25);
    }

    #[test]
    fn test_btts_complement_is_exact() {
        let set = market_probs(1.45, 1.25, DEFAULT_GOAL_CAP, &[], &[]).unwrap();
        let yes = set.probability(Market::BothTeamsScore, Selection::Yes).unwrap();
        let no = set.probability(Market::BothTeamsScore, Selection::No).unwrap();
        assert!((yes + no - 1.0).abs() <= f64::EPSILON);

        let table = OutcomeTable::build_with(1.45, 1.25, DEFAULT_GOAL_CAP, TailMode::Fold).unwrap();
        let yes = MarketProbabilitySet::extract(&table, &[], &[])
            .probability(Market::BothTeamsScore, Selection::Yes)
            .unwrap();
        let expected_yes = (1.0 - (-1.45f64).exp()) * (1.0 - (-1.25f64).exp());
        assert!((yes - expected_yes).abs() < 1e-9);
    }

    #[test]
    fn test_half_line_has_no_push() {
        let table = OutcomeTable::build(1.45, 1.25, DEFAULT_GOAL_CAP).unwrap();
        let outcome = handicap_outcome(&table, Perspective::Home, line(-0.5)).unwrap();
        assert_eq!(outcome.push, 0.0);
        // Home covers -0.5 as a threshold when it avoids defeat
        let not_lose = table.sum_where(|i, j| i >= j);
        assert!((outcome.cover - not_lose).abs() < 1e-12);
    }

    #[test]
    fn test_whole_line_push() {
        let table = OutcomeTable::build(1.45, 1.25, DEFAULT_GOAL_CAP).unwrap();
        let outcome = handicap_outcome(&table, Perspective::Home, line(0.0)).unwrap();
        let draw = table.sum_where(|i, j| i == j);
        let home_win = table.sum_where(|i, j| i > j);
        assert!((outcome.push - draw).abs() < 1e-12);
        assert!((outcome.cover - home_win).abs() < 1e-12);
    }

    #[test]
    fn test_quarter_line_is_mean_of_neighbours() {
        let table = OutcomeTable::build(1.45, 1.25, DEFAULT_GOAL_CAP).unwrap();
        for &(quarter, lower, upper) in &[(-0.25, -0.5, 0.0), (-0.75, -1.0, -0.5), (1.25, 1.0, 1.5)] {
            let q = handicap_outcome(&table, Perspective::Home, line(quarter)).unwrap();
            let lo = handicap_outcome(&table, Perspective::Home, line(lower)).unwrap();
            let hi = handicap_outcome(&table, Perspective::Home, line(upper)).unwrap();
            assert_eq!(q.cover, 0.5 * (lo.cover + hi.cover));
            assert_eq!(q.push, 0.5 * (lo.push + hi.push));
        }
    }

    #[test]
    fn test_home_away_and_push_partition() {
        let ah = lines(&[-1.0, -0.75, -0.5, -0.25, 0.0, 0.25, 1.0, 1.5]);
        let table = OutcomeTable::build(1.8, 0.9, DEFAULT_GOAL_CAP).unwrap();
        let set = MarketProbabilitySet::extract(&table, &[], &ah);
        for l in ah {
            let market = Market::AsianHandicap { line: l };
            let home = set.probability(market, Selection::Home).unwrap();
            let away = set.probability(market, Selection::Away).unwrap();
            let push = set.push(l).unwrap();
            assert!((home + away + push - table.total()).abs() < 1e-12, "line {l}");
        }
    }

    #[test]
    fn test_away_side_uses_its_own_margin() {
        // Strong home side: away covering a +1 threshold (away must win by 2+) is rare
        let table = OutcomeTable::build(2.5, 0.6, 10).unwrap();
        let away = handicap_outcome(&table, Perspective::Away, line(1.0)).unwrap();
        let expected = table.sum_where(|i, j| j as i32 - i as i32 > 1);
        assert!((away.cover - expected).abs() < 1e-12);
        assert!(away.cover < 0.05);
    }

    #[test]
    fn test_irregular_handicap_lines_are_skipped() {
        let set = market_probs(1.45, 1.25, DEFAULT_GOAL_CAP, &[], &lines(&[0.1])).unwrap();
        assert_eq!(
            set.probability(Market::AsianHandicap { line: line(0.1) }, Selection::Home),
            None
        );
        // 1X2 and BTTS are always present
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn test_rows_carry_push_for_handicaps_only() {
        let set = market_probs(1.45, 1.25, DEFAULT_GOAL_CAP, &lines(&[2.5]), &lines(&[0.0])).unwrap();
        let rows = set.rows("m1");
        assert_eq!(rows.len(), set.len());
        assert!(rows.iter().all(|r| r.match_id == "m1"));

        let ah_home = rows
            .iter()
            .find(|r| r.market.is_handicap() && r.selection == Selection::Home)
            .unwrap();
        assert_eq!(ah_home.push, set.push(line(0.0)));
        assert!(ah_home.push.unwrap() > 0.2);
        assert!(rows.iter().filter(|r| !r.market.is_handicap()).all(|r| r.push.is_none()));
    }
}
