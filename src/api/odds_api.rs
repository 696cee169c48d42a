use crate::models::{Fixture, Line, Market, MarketSnapshot, Quote, Selection};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

const ODDS_API_BASE_URL: &str = "https://api.the-odds-api.com/v4";
const ODDS_MARKETS: &str = "h2h,totals,spreads,btts";

/// Football leagues we know how to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum League {
    Epl,
    LaLiga,
    SerieA,
    Bundesliga,
    Ligue1,
}

impl League {
    pub fn sport_key(&self) -> &'static str {
        match self {
            League::Epl => "soccer_epl",
            League::LaLiga => "soccer_spain_la_liga",
            League::SerieA => "soccer_italy_serie_a",
            League::Bundesliga => "soccer_germany_bundesliga",
            League::Ligue1 => "soccer_france_ligue_one",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            League::Epl => "EPL",
            League::LaLiga => "LaLiga",
            League::SerieA => "SerieA",
            League::Bundesliga => "Bundesliga",
            League::Ligue1 => "Ligue1",
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for League {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epl" => Ok(League::Epl),
            "laliga" => Ok(League::LaLiga),
            "seriea" => Ok(League::SerieA),
            "bundesliga" => Ok(League::Bundesliga),
            "ligue1" => Ok(League::Ligue1),
            other => anyhow::bail!("Unknown league: {}", other),
        }
    }
}

/// Response from The Odds API for a single event
#[derive(Debug, Deserialize)]
struct OddsApiEvent {
    id: String,
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<OddsApiBookmaker>,
}

/// Bookmaker data from The Odds API
#[derive(Debug, Deserialize)]
struct OddsApiBookmaker {
    key: String,
    title: Option<String>,
    #[serde(default)]
    markets: Vec<OddsApiMarket>,
}

/// Market data (e.g., h2h, totals) from The Odds API
#[derive(Debug, Deserialize)]
struct OddsApiMarket {
    key: String,
    #[serde(default)]
    outcomes: Vec<OddsApiOutcome>,
}

/// Outcome data for one selection
#[derive(Debug, Deserialize)]
struct OddsApiOutcome {
    name: String,
    price: Option<f64>,
    point: Option<f64>,
}

/// Remaining request quota reported by The Odds API
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiUsage {
    pub requests_remaining: Option<String>,
    pub requests_used: Option<String>,
}

/// First event of a league response, trimmed for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSample {
    pub home_team: String,
    pub away_team: String,
    pub commence_time: DateTime<Utc>,
    pub bookmakers: usize,
}

/// Result of checking one league against The Odds API
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeagueStatus {
    pub league: String,
    pub sport_key: Option<String>,
    /// HTTP status of the odds request, if one was sent
    pub status: Option<u16>,
    pub events: Option<usize>,
    pub sample: Option<EventSample>,
    pub requests_remaining: Option<String>,
    pub error: Option<String>,
}

pub struct OddsApiClient {
    api_key: String,
    regions: String,
    client: reqwest::Client,
}

impl OddsApiClient {
    pub fn new(api_key: String, regions: String) -> Self {
        Self {
            api_key,
            regions,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch fixtures and decimal quotes for every known league in `leagues`.
    /// Only fixtures kicking off within the next `hours_ahead` hours are kept.
    /// A league that fails to load is logged and skipped.
    pub async fn fetch_snapshot(&self, leagues: &[String], hours_ahead: i64) -> Result<MarketSnapshot> {
        let now = Utc::now();
        let mut snapshot = MarketSnapshot::default();

        for name in leagues {
            let league = match name.parse::<League>() {
                Ok(league) => league,
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            };

            let events = match self.fetch_events(league).await {
                Ok(events) => events,
                Err(e) => {
                    warn!("Failed to fetch {} odds: {:#}", league, e);
                    continue;
                }
            };

            let (fixtures, quotes) = normalize_events(events, league, now, hours_ahead);
            snapshot.fixtures.extend(fixtures);
            snapshot.quotes.extend(quotes);
        }

        // The same event can be listed under more than one league request
        let mut seen = HashSet::new();
        snapshot.fixtures.retain(|f| seen.insert(f.match_id.clone()));

        Ok(snapshot)
    }

    fn odds_request(&self, league: League) -> reqwest::RequestBuilder {
        let url = format!("{}/sports/{}/odds", ODDS_API_BASE_URL, league.sport_key());

        self.client.get(url).query(&[
            ("apiKey", self.api_key.as_str()),
            ("regions", self.regions.as_str()),
            ("markets", ODDS_MARKETS),
            ("oddsFormat", "decimal"),
            ("dateFormat", "iso"),
        ])
    }

    async fn fetch_events(&self, league: League) -> Result<Vec<OddsApiEvent>> {
        let response = self
            .odds_request(league)
            .send()
            .await
            .context("Failed to fetch odds from The Odds API")?;

        if !response.status().is_success() {
            anyhow::bail!("Odds API returned error: {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse Odds API response")
    }

    /// Request each league once and report status, event count and a sample
    /// event. Failures are reported per league rather than returned.
    pub async fn league_statuses(&self, leagues: &[String]) -> Vec<LeagueStatus> {
        let mut statuses = Vec::with_capacity(leagues.len());
        for name in leagues {
            statuses.push(self.league_status(name).await);
        }
        statuses
    }

    async fn league_status(&self, name: &str) -> LeagueStatus {
        let mut status = LeagueStatus {
            league: name.to_string(),
            ..Default::default()
        };
        let league = match name.parse::<League>() {
            Ok(league) => league,
            Err(_) => {
                status.error = Some("unknown_league".to_string());
                return status;
            }
        };
        status.sport_key = Some(league.sport_key().to_string());

        let response = match self.odds_request(league).send().await {
            Ok(response) => response,
            Err(e) => {
                status.error = Some(e.to_string());
                return status;
            }
        };
        status.status = Some(response.status().as_u16());
        status.requests_remaining = header_value(&response, "x-requests-remaining");

        if !response.status().is_success() {
            status.error = response.text().await.ok().filter(|t| !t.is_empty());
            return status;
        }

        match response.json::<Vec<OddsApiEvent>>().await {
            Ok(events) => {
                status.events = Some(events.len());
                status.sample = sample_event(&events);
            }
            Err(e) => status.error = Some(format!("Failed to parse Odds API response: {}", e)),
        }
        status
    }

    /// Check how many API requests you have remaining
    pub async fn check_usage(&self) -> Result<ApiUsage> {
        let url = format!("{}/sports", ODDS_API_BASE_URL);

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .context("Failed to reach The Odds API")?;

        Ok(ApiUsage {
            requests_remaining: header_value(&response, "x-requests-remaining"),
            requests_used: header_value(&response, "x-requests-used"),
        })
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn sample_event(events: &[OddsApiEvent]) -> Option<EventSample> {
    events.first().map(|event| EventSample {
        home_team: event.home_team.clone(),
        away_team: event.away_team.clone(),
        commence_time: event.commence_time,
        bookmakers: event.bookmakers.len(),
    })
}

/// Turn raw events into fixtures and typed quotes
fn normalize_events(
    events: Vec<OddsApiEvent>,
    league: League,
    now: DateTime<Utc>,
    hours_ahead: i64,
) -> (Vec<Fixture>, Vec<Quote>) {
    let horizon = now + Duration::hours(hours_ahead);
    let mut fixtures = Vec::new();
    let mut quotes = Vec::new();

    for event in events {
        if event.commence_time < now || event.commence_time > horizon {
            continue;
        }

        for bookmaker in &event.bookmakers {
            let book = bookmaker
                .title
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| bookmaker.key.clone());

            for api_market in &bookmaker.markets {
                for outcome in &api_market.outcomes {
                    let Some((market, selection)) = map_outcome(&api_market.key, outcome, &event)
                    else {
                        continue;
                    };
                    let quote = Quote {
                        match_id: event.id.clone(),
                        market,
                        selection,
                        price: outcome.price.unwrap_or(f64::NAN),
                        book: book.clone(),
                    };
                    if quote.has_valid_price() {
                        quotes.push(quote);
                    } else {
                        debug!("Dropping {} {} from {}: bad price", event.id, quote.key(), book);
                    }
                }
            }
        }

        fixtures.push(Fixture {
            match_id: event.id,
            league: league.name().to_string(),
            utc_kickoff: event.commence_time,
            home: event.home_team,
            away: event.away_team,
        });
    }

    (fixtures, quotes)
}

/// Map one provider outcome to a typed market and selection.
///
/// Spreads points are handicaps added to the named team's score; we store the
/// home-relative threshold instead: home -0.5 becomes line +0.5 (home must win
/// by more than 0.5), away +0.5 stays +0.5 on the same market.
fn map_outcome(
    market_key: &str,
    outcome: &OddsApiOutcome,
    event: &OddsApiEvent,
) -> Option<(Market, Selection)> {
    let team_side = || {
        if outcome.name == event.home_team {
            Some(Selection::Home)
        } else if outcome.name == event.away_team {
            Some(Selection::Away)
        } else {
            None
        }
    };

    match market_key.to_ascii_lowercase().as_str() {
        "h2h" => {
            let selection = if outcome.name.eq_ignore_ascii_case("draw") {
                Selection::Draw
            } else {
                team_side()?
            };
            Some((Market::Moneyline, selection))
        }
        "totals" => {
            let line = Line::new(outcome.point?)?;
            let selection = match outcome.name.to_ascii_lowercase().as_str() {
                "over" => Selection::Over,
                "under" => Selection::Under,
                _ => return None,
            };
            Some((Market::Totals { line }, selection))
        }
        "spreads" => {
            let point = outcome.point?;
            let selection = team_side()?;
            let line = match selection {
                Selection::Home => Line::new(-point)?,
                _ => Line::new(point)?,
            };
            Some((Market::AsianHandicap { line }, selection))
        }
        "btts" => {
            let selection = match outcome.name.to_ascii_lowercase().as_str() {
                "yes" => Selection::Yes,
                "no" => Selection::No,
                _ => return None,
            };
            Some((Market::BothTeamsScore, selection))
        }
        _ => None,
    }
}
