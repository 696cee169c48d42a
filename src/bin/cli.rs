use anyhow::{Context, Result};
use clap::Parser;
use football_value_bets::config::{parse_leagues, AppConfig};
use football_value_bets::data::{load_raw_quotes, load_snapshot_from_cache};
use football_value_bets::odds_api::OddsApiClient;
use football_value_bets::value_bets::HandicapPushMode;
use football_value_bets::{fetch_snapshot, run_snapshot, MarketSnapshot};
use std::path::PathBuf;

/// Find value bets in upcoming football fixtures
#[derive(Debug, Parser)]
struct Args {
    /// Snapshot JSON (fixtures + quotes) to price instead of fetching odds
    #[clap(short = 'i', long)]
    input: Option<PathBuf>,

    /// Loosely-typed quotes JSON to use with the fixtures of --input
    #[clap(long, requires = "input")]
    quotes: Option<PathBuf>,

    /// Reuse cache/snapshot.json when present
    #[clap(long)]
    use_cache: bool,

    /// Write picks and model probabilities as CSV under cache/
    #[clap(long)]
    save_csv: bool,

    /// Comma-separated leagues, e.g. "EPL,SerieA"
    #[clap(short = 'l', long)]
    leagues: Option<String>,

    #[clap(long)]
    hours_ahead: Option<i64>,

    /// Minimum edge over the implied probability
    #[clap(short = 'e', long)]
    edge: Option<f64>,

    /// Only consider books whose name contains this text
    #[clap(short = 'b', long)]
    book: Option<String>,

    #[clap(short = 'n', long)]
    max_picks: Option<usize>,

    #[clap(long)]
    bankroll: Option<f64>,

    /// How Asian handicap pushes count: ignore or refund
    #[clap(long)]
    push_mode: Option<HandicapPushMode>,

    /// Print the remaining Odds API quota and exit
    #[clap(long)]
    usage: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        config.use_cache |= self.use_cache;
        config.save_csv |= self.save_csv;
        if let Some(leagues) = &self.leagues {
            config.leagues = parse_leagues(leagues);
        }
        if let Some(hours) = self.hours_ahead {
            config.hours_ahead = hours;
        }

        let engine = &mut config.engine;
        if let Some(edge) = self.edge {
            engine.detector.edge_threshold = edge;
        }
        if let Some(book) = &self.book {
            engine.detector.book_filter = Some(book.clone()).filter(|b| !b.trim().is_empty());
        }
        if let Some(max) = self.max_picks {
            engine.detector.max_picks = Some(max);
        }
        if let Some(bankroll) = self.bankroll {
            engine.bankroll = bankroll;
        }
        if let Some(mode) = self.push_mode {
            engine.detector.push_mode = mode;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = AppConfig::from_env()?;
    args.apply(&mut config);

    if args.usage {
        let client = OddsApiClient::new(config.require_api_key()?.to_string(), config.regions.clone());
        let usage = client.check_usage().await?;
        println!(
            "Odds API requests remaining: {}, used: {}",
            usage.requests_remaining.as_deref().unwrap_or("?"),
            usage.requests_used.as_deref().unwrap_or("?")
        );
        return Ok(());
    }

    println!("Football Value Bet Finder\n");

    let snapshot = match &args.input {
        Some(path) => {
            println!("Loading snapshot from {}\n", path.display());
            let mut snapshot: MarketSnapshot = load_snapshot_from_cache(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            if let Some(quotes) = &args.quotes {
                snapshot.quotes = load_raw_quotes(quotes)?;
            }
            snapshot
        }
        None => {
            println!("Fetching fixtures and odds for {}...\n", config.leagues.join(", "));
            fetch_snapshot(&config).await?
        }
    };

    let report = run_snapshot(&snapshot, &config)?;

    println!(
        "{} fixtures, {} quotes, {} best prices\n",
        report.fixtures, report.quotes, report.best_quotes
    );
    if !report.skipped_fixtures.is_empty() {
        println!("Skipped fixtures: {}\n", report.skipped_fixtures.join(", "));
    }

    if report.picks.is_empty() {
        println!("No value bets found.");
    } else {
        println!("Top {} Value Bets:\n", report.picks.len());
        for (i, staked) in report.picks.iter().enumerate() {
            println!("{}. {}", i + 1, staked.format());
        }
    }

    if config.save_csv {
        println!(
            "\nSaved picks to {} and model probabilities to {}",
            football_value_bets::PICKS_CSV_FILE,
            football_value_bets::MODEL_CSV_FILE
        );
    }

    Ok(())
}
