use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents a football fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub match_id: String,
    pub league: String,
    pub utc_kickoff: DateTime<Utc>,
    pub home: String,
    pub away: String,
}

impl Fixture {
    pub fn label(&self) -> String {
        format!("{} vs {}", self.home, self.away)
    }
}

/// Poisson means for the two sides of a fixture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedGoals {
    pub home: f64,
    pub away: f64,
}

impl ExpectedGoals {
    pub fn new(home: f64, away: f64) -> Self {
        Self { home, away }
    }

    /// Raise both rates to at least `floor`. Non-finite rates are left alone so
    /// the distribution builder can reject them.
    pub fn clamped(self, floor: f64) -> Self {
        let clamp = |v: f64| if v.is_finite() { v.max(floor) } else { v };
        Self {
            home: clamp(self.home),
            away: clamp(self.away),
        }
    }
}

/// A goal line, stored in hundredths of a goal so that "2", "2.0" and "2.00"
/// are the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Line(i32);

/// How a handicap line settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Whole,
    Half,
    Quarter,
    /// Not a multiple of 0.25; valid for totals but never a handicap line
    Irregular,
}

impl Line {
    const MAX_ABS: f64 = 1000.0;

    pub fn new(value: f64) -> Option<Self> {
        if !value.is_finite() || value.abs() > Self::MAX_ABS {
            return None;
        }
        Some(Line((value * 100.0).round() as i32))
    }

    pub const fn from_hundredths(hundredths: i32) -> Self {
        Line(hundredths)
    }

    pub fn hundredths(self) -> i32 {
        self.0
    }

    pub fn value(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn negate(self) -> Self {
        Line(-self.0)
    }

    pub fn kind(self) -> LineKind {
        match self.0.rem_euclid(100) {
            0 => LineKind::Whole,
            50 => LineKind::Half,
            25 | 75 => LineKind::Quarter,
            _ => LineKind::Irregular,
        }
    }

    /// The whole/half lines either side of a quarter line, lower first.
    /// Returns `None` for anything that is not a quarter line.
    pub fn quarter_split(self) -> Option<(Line, Line)> {
        if self.kind() != LineKind::Quarter {
            return None;
        }
        let lower = self.0.div_euclid(50) * 50;
        Some((Line(lower), Line(lower + 50)))
    }
}

impl TryFrom<f64> for Line {
    type Error = EngineError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Line::new(value).ok_or(EngineError::InvalidLine(value))
    }
}

impl From<Line> for f64 {
    fn from(line: Line) -> f64 {
        line.value()
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.sign_plus() {
            write!(f, "{:+}", self.value())
        } else {
            write!(f, "{}", self.value())
        }
    }
}

/// Bet types the engine can price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Market {
    /// Full-time result (1X2)
    Moneyline,
    /// Total goals over/under `line`
    Totals { line: Line },
    /// Asian handicap; `line` is a home-relative threshold, home covers when
    /// `home - away > line`
    AsianHandicap { line: Line },
    BothTeamsScore,
}

impl Market {
    pub fn accepts(&self, selection: Selection) -> bool {
        use Selection::*;
        match self {
            Market::Moneyline => matches!(selection, Home | Draw | Away),
            Market::Totals { .. } => matches!(selection, Over | Under),
            Market::AsianHandicap { .. } => matches!(selection, Home | Away),
            Market::BothTeamsScore => matches!(selection, Yes | No),
        }
    }

    pub fn line(&self) -> Option<Line> {
        match self {
            Market::Totals { line } | Market::AsianHandicap { line } => Some(*line),
            _ => None,
        }
    }

    pub fn is_handicap(&self) -> bool {
        matches!(self, Market::AsianHandicap { .. })
    }

    /// Parse a tag that may omit its line ("OU", "AH", "totals", "spreads"),
    /// taking the line from `line` instead.
    pub fn from_tag(tag: &str, line: Option<f64>) -> Result<Self, EngineError> {
        let trimmed = tag.trim();
        let lower = trimmed.to_ascii_lowercase();
        let need_line = || -> Result<Line, EngineError> {
            let value = line.ok_or_else(|| EngineError::UnknownMarket(trimmed.to_string()))?;
            Line::try_from(value)
        };
        match lower.as_str() {
            "ou" | "totals" => Ok(Market::Totals { line: need_line()? }),
            "ah" | "spreads" => Ok(Market::AsianHandicap { line: need_line()? }),
            _ => trimmed.parse(),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Moneyline => write!(f, "1X2"),
            Market::Totals { line } => write!(f, "OU{}", line),
            Market::AsianHandicap { line } => write!(f, "AH{:+}", line),
            Market::BothTeamsScore => write!(f, "BTTS"),
        }
    }
}

impl FromStr for Market {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        let upper = tag.to_ascii_uppercase();
        let parse_line = |rest: &str| {
            rest.trim()
                .parse::<f64>()
                .ok()
                .and_then(Line::new)
                .ok_or_else(|| EngineError::UnknownMarket(tag.to_string()))
        };

        match upper.as_str() {
            "1X2" | "H2H" => Ok(Market::Moneyline),
            "BTTS" => Ok(Market::BothTeamsScore),
            _ if upper.starts_with("OU") => Ok(Market::Totals {
                line: parse_line(&upper[2..])?,
            }),
            _ if upper.starts_with("AH") => Ok(Market::AsianHandicap {
                line: parse_line(&upper[2..])?,
            }),
            _ => Err(EngineError::UnknownMarket(tag.to_string())),
        }
    }
}

impl TryFrom<String> for Market {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Market> for String {
    fn from(market: Market) -> String {
        market.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Selection {
    Home,
    Draw,
    Away,
    Over,
    Under,
    Yes,
    No,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Selection::Home => "Home",
            Selection::Draw => "Draw",
            Selection::Away => "Away",
            Selection::Over => "Over",
            Selection::Under => "Under",
            Selection::Yes => "Yes",
            Selection::No => "No",
        };
        f.write_str(name)
    }
}

impl FromStr for Selection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" | "1" => Ok(Selection::Home),
            "draw" | "x" => Ok(Selection::Draw),
            "away" | "2" => Ok(Selection::Away),
            "over" => Ok(Selection::Over),
            "under" => Ok(Selection::Under),
            "yes" => Ok(Selection::Yes),
            "no" => Ok(Selection::No),
            _ => Err(EngineError::UnknownSelection(s.to_string())),
        }
    }
}

/// One priced outcome: a market plus the selection within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketKey {
    pub market: Market,
    pub selection: Selection,
}

impl MarketKey {
    pub fn new(market: Market, selection: Selection) -> Self {
        Self { market, selection }
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.market, self.selection)
    }
}

/// A bookmaker price for one outcome of one fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub match_id: String,
    pub market: Market,
    pub selection: Selection,
    /// Decimal odds
    pub price: f64,
    pub book: String,
}

impl Quote {
    pub fn key(&self) -> MarketKey {
        MarketKey::new(self.market, self.selection)
    }

    pub fn has_valid_price(&self) -> bool {
        self.price.is_finite() && self.price > 1.0
    }
}

/// A quote as delivered by a loosely-typed source, with string tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    pub match_id: String,
    pub market: String,
    pub selection: String,
    pub price: f64,
    pub book: String,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub line: Option<f64>,
}

impl TryFrom<RawQuote> for Quote {
    type Error = EngineError;

    fn try_from(raw: RawQuote) -> Result<Self, Self::Error> {
        let market = Market::from_tag(&raw.market, raw.line)?;

        // Handicap quotes may name the team in `side` and leave `selection` free-form
        let selection = match (market.is_handicap(), raw.side.as_deref()) {
            (true, Some(side)) => side.parse::<Selection>()?,
            _ => raw.selection.parse::<Selection>()?,
        };

        if !market.accepts(selection) {
            return Err(EngineError::InvalidSelection {
                market: market.to_string(),
                selection: selection.to_string(),
            });
        }

        let quote = Quote {
            match_id: raw.match_id,
            market,
            selection,
            price: raw.price,
            book: raw.book,
        };
        if !quote.has_valid_price() {
            return Err(EngineError::InvalidPrice(quote.price));
        }
        Ok(quote)
    }
}

/// The single best price for one outcome across all books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestQuote {
    #[serde(flatten)]
    pub quote: Quote,
    pub implied_prob: f64,
}

/// A bet where the model probability beats the market by at least the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePick {
    pub match_id: String,
    pub league: String,
    pub utc_kickoff: DateTime<Utc>,
    pub home: String,
    pub away: String,
    pub market: Market,
    pub selection: Selection,
    pub price: f64,
    pub book: String,
    pub model_prob: f64,
    pub implied_prob: f64,
    pub edge: f64,
    pub expected_value: f64,
}

impl ValuePick {
    pub fn match_label(&self) -> String {
        format!("{} vs {}", self.home, self.away)
    }

    /// Format the pick as a readable string
    pub fn format(&self) -> String {
        format!(
            "{} | {} {} @ {:.2} on {} | Edge: {:+.2}% | EV: {:+.2}% | Model: {:.1}% | Implied: {:.1}%",
            self.match_label(),
            self.market,
            self.selection,
            self.price,
            self.book,
            self.edge * 100.0,
            self.expected_value * 100.0,
            self.model_prob * 100.0,
            self.implied_prob * 100.0
        )
    }
}

/// A value pick with a recommended bankroll stake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakedPick {
    #[serde(flatten)]
    pub pick: ValuePick,
    pub stake_pct: f64,
    pub stake_amt: f64,
}

impl StakedPick {
    pub fn format(&self) -> String {
        format!(
            "{} | Stake: {:.2}% ({:.2})",
            self.pick.format(),
            self.stake_pct * 100.0,
            self.stake_amt
        )
    }
}

/// One model probability, flattened for export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRow {
    pub match_id: String,
    pub market: Market,
    pub selection: Selection,
    pub probability: f64,
    /// Push probability of the line, for handicap rows only
    pub push: Option<f64>,
}

/// Fixtures and quotes captured from a data source in one fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub fixtures: Vec<Fixture>,
    pub quotes: Vec<Quote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_normalises_representations() {
        assert_eq!(Line::new(2.0), Line::new(2.00));
        assert_eq!("OU2".parse::<Market>().unwrap(), "OU2.00".parse::<Market>().unwrap());
        assert_eq!(Line::new(f64::NAN), None);
    }

    #[test]
    fn test_line_kinds() {
        assert_eq!(Line::new(-1.0).unwrap().kind(), LineKind::Whole);
        assert_eq!(Line::new(0.5).unwrap().kind(), LineKind::Half);
        assert_eq!(Line::new(-0.25).unwrap().kind(), LineKind::Quarter);
        assert_eq!(Line::new(1.75).unwrap().kind(), LineKind::Quarter);
        assert_eq!(Line::new(2.1).unwrap().kind(), LineKind::Irregular);
    }

    #[test]
    fn test_quarter_split() {
        let (lo, hi) = Line::new(-0.75).unwrap().quarter_split().unwrap();
        assert_eq!(lo, Line::new(-1.0).unwrap());
        assert_eq!(hi, Line::new(-0.5).unwrap());

        let (lo, hi) = Line::new(0.25).unwrap().quarter_split().unwrap();
        assert_eq!(lo, Line::new(0.0).unwrap());
        assert_eq!(hi, Line::new(0.5).unwrap());

        assert!(Line::new(0.5).unwrap().quarter_split().is_none());
    }

    #[test]
    fn test_market_tags() {
        assert_eq!("1X2".parse::<Market>().unwrap(), Market::Moneyline);
        assert_eq!("btts".parse::<Market>().unwrap(), Market::BothTeamsScore);
        let ah: Market = "AH+0.25".parse().unwrap();
        assert_eq!(ah.to_string(), "AH+0.25");
        let ah: Market = "AH-1".parse().unwrap();
        assert_eq!(ah.to_string(), "AH-1");
        let ou: Market = "OU2.5".parse().unwrap();
        assert_eq!(ou.to_string(), "OU2.5");
        assert!("CS1-0".parse::<Market>().is_err());
        assert!("OUabc".parse::<Market>().is_err());
    }

    #[test]
    fn test_market_serializes_as_tag() {
        let json = serde_json::to_string(&Market::Totals {
            line: Line::new(2.5).unwrap(),
        })
        .unwrap();
        assert_eq!(json, "\"OU2.5\"");
        let back: Market = serde_json::from_str(&json).unwrap();
        assert_eq!(back.line(), Line::new(2.5));
    }

    #[test]
    fn test_raw_quote_conversion() {
        let raw = RawQuote {
            match_id: "m1".to_string(),
            market: "AH".to_string(),
            selection: "Liverpool".to_string(),
            price: 1.95,
            book: "Pinnacle".to_string(),
            side: Some("away".to_string()),
            line: Some(-0.5),
        };
        let quote = Quote::try_from(raw).unwrap();
        assert_eq!(quote.selection, Selection::Away);
        assert_eq!(quote.market.to_string(), "AH-0.5");

        let bad_selection = RawQuote {
            match_id: "m1".to_string(),
            market: "1X2".to_string(),
            selection: "Over".to_string(),
            price: 2.0,
            book: "b".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Quote::try_from(bad_selection),
            Err(EngineError::InvalidSelection { .. })
        ));

        let bad_price = RawQuote {
            match_id: "m1".to_string(),
            market: "BTTS".to_string(),
            selection: "Yes".to_string(),
            price: 1.0,
            book: "b".to_string(),
            ..Default::default()
        };
        assert_eq!(Quote::try_from(bad_price), Err(EngineError::InvalidPrice(1.0)));
    }
}
