use crate::models::{MarketSnapshot, ModelRow, Quote, RawQuote, StakedPick};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::warn;

/// Column order of the picks CSV
pub const PICKS_CSV_HEADER: [&str; 16] = [
    "utc_kickoff",
    "match",
    "market",
    "selection",
    "price",
    "book",
    "model_prob",
    "implied",
    "edge",
    "expected_value",
    "stake_pct",
    "stake_amt",
    "league",
    "home",
    "away",
    "match_id",
];

/// Column order of the model probabilities CSV
pub const MODEL_CSV_HEADER: [&str; 5] = ["match_id", "market", "selection", "probability", "push"];

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Save a fixtures + quotes snapshot to a JSON cache file
pub fn save_snapshot_to_cache(snapshot: &MarketSnapshot, cache_file: impl AsRef<Path>) -> Result<()> {
    let path = cache_file.as_ref();
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
    std::fs::write(path, json).context("Failed to write cache file")?;
    Ok(())
}

/// Load a snapshot from a JSON cache file
pub fn load_snapshot_from_cache(cache_file: impl AsRef<Path>) -> Result<MarketSnapshot> {
    let json = std::fs::read_to_string(cache_file.as_ref()).context("Failed to read cache file")?;
    let snapshot: MarketSnapshot =
        serde_json::from_str(&json).context("Failed to deserialize snapshot")?;
    Ok(snapshot)
}

/// Load loosely-typed quotes from JSON and keep the ones that convert.
/// Rejected rows are logged and skipped.
pub fn load_raw_quotes(json_file: impl AsRef<Path>) -> Result<Vec<Quote>> {
    let json = std::fs::read_to_string(json_file.as_ref()).context("Failed to read quotes file")?;
    let raw: Vec<RawQuote> = serde_json::from_str(&json).context("Failed to parse quotes")?;
    Ok(convert_raw_quotes(raw))
}

pub fn convert_raw_quotes(raw: Vec<RawQuote>) -> Vec<Quote> {
    raw.into_iter()
        .filter_map(|r| {
            let match_id = r.match_id.clone();
            match Quote::try_from(r) {
                Ok(q) => Some(q),
                Err(e) => {
                    warn!("Skipping quote for {}: {}", match_id, e);
                    None
                }
            }
        })
        .collect()
}

/// Save staked picks as pretty JSON
pub fn save_picks_to_json(picks: &[StakedPick], filename: impl AsRef<Path>) -> Result<()> {
    let path = filename.as_ref();
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(picks).context("Failed to serialize picks")?;
    std::fs::write(path, json).context("Failed to write picks file")?;
    Ok(())
}

#[derive(Serialize)]
struct PickRow<'a> {
    utc_kickoff: String,
    #[serde(rename = "match")]
    match_label: String,
    market: String,
    selection: String,
    price: f64,
    book: &'a str,
    model_prob: String,
    implied: String,
    edge: String,
    expected_value: String,
    stake_pct: String,
    stake_amt: String,
    league: &'a str,
    home: &'a str,
    away: &'a str,
    match_id: &'a str,
}

impl<'a> From<&'a StakedPick> for PickRow<'a> {
    fn from(staked: &'a StakedPick) -> Self {
        let p = &staked.pick;
        Self {
            utc_kickoff: p.utc_kickoff.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            match_label: p.match_label(),
            market: p.market.to_string(),
            selection: p.selection.to_string(),
            price: p.price,
            book: &p.book,
            model_prob: format!("{:.4}", p.model_prob),
            implied: format!("{:.4}", p.implied_prob),
            edge: format!("{:.4}", p.edge),
            expected_value: format!("{:.4}", p.expected_value),
            stake_pct: format!("{:.4}", staked.stake_pct),
            stake_amt: format!("{:.2}", staked.stake_amt),
            league: &p.league,
            home: &p.home,
            away: &p.away,
            match_id: &p.match_id,
        }
    }
}

/// Write staked picks as CSV rows
pub fn write_picks_csv<W: std::io::Write>(picks: &[StakedPick], writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(PICKS_CSV_HEADER)
        .context("Failed to write CSV header")?;
    for staked in picks {
        wtr.serialize(PickRow::from(staked))
            .context("Failed to write CSV row")?;
    }
    wtr.flush().context("Failed to flush CSV")?;
    Ok(())
}

/// Save staked picks to a CSV file
pub fn save_picks_to_csv(picks: &[StakedPick], filename: impl AsRef<Path>) -> Result<()> {
    let path = filename.as_ref();
    ensure_parent_dir(path)?;
    let file = File::create(path).context("Failed to create CSV file")?;
    write_picks_csv(picks, file)
}

#[derive(Serialize)]
struct ModelCsvRow<'a> {
    match_id: &'a str,
    market: String,
    selection: String,
    probability: String,
    push: Option<String>,
}

/// Write model probabilities as CSV rows; `push` is blank outside handicaps
pub fn write_model_csv<W: std::io::Write>(rows: &[ModelRow], writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(MODEL_CSV_HEADER)
        .context("Failed to write CSV header")?;
    for row in rows {
        wtr.serialize(ModelCsvRow {
            match_id: &row.match_id,
            market: row.market.to_string(),
            selection: row.selection.to_string(),
            probability: format!("{:.6}", row.probability),
            push: row.push.map(|p| format!("{:.6}", p)),
        })
        .context("Failed to write CSV row")?;
    }
    wtr.flush().context("Failed to flush CSV")?;
    Ok(())
}

/// Save model probabilities to a CSV file
pub fn save_model_to_csv(rows: &[ModelRow], filename: impl AsRef<Path>) -> Result<()> {
    let path = filename.as_ref();
    ensure_parent_dir(path)?;
    let file = File::create(path).context("Failed to create CSV file")?;
    write_model_csv(rows, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fixture, Line, Market, Selection, ValuePick};
    use chrono::{TimeZone, Utc};

    fn staked() -> StakedPick {
        StakedPick {
            pick: ValuePick {
                match_id: "evt1".to_string(),
                league: "EPL".to_string(),
                utc_kickoff: Utc.with_ymd_and_hms(2026, 10, 24, 15, 0, 0).unwrap(),
                home: "Arsenal".to_string(),
                away: "Chelsea".to_string(),
                market: Market::AsianHandicap {
                    line: Line::new(-0.25).unwrap(),
                },
                selection: Selection::Home,
                price: 2.1,
                book: "Pinnacle".to_string(),
                model_prob: 0.55,
                implied_prob: 1.0 / 2.1,
                edge: 0.55 - 1.0 / 2.1,
                expected_value: 0.155,
            },
            stake_pct: 0.025,
            stake_amt: 12.5,
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("fvb_test_{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_picks_csv_layout() {
        let mut out = Vec::new();
        write_picks_csv(&[staked()], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), PICKS_CSV_HEADER.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("2026-10-24T15:00:00Z,Arsenal vs Chelsea,AH-0.25,Home,2.1,Pinnacle,0.5500,"));
        assert!(row.ends_with(",0.0250,12.50,EPL,Arsenal,Chelsea,evt1"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_picks_still_write_header() {
        let mut out = Vec::new();
        write_picks_csv(&[], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim_end(), PICKS_CSV_HEADER.join(","));
    }

    #[test]
    fn test_snapshot_cache_round_trip() {
        let snapshot = MarketSnapshot {
            fixtures: vec![Fixture {
                match_id: "evt1".to_string(),
                league: "EPL".to_string(),
                utc_kickoff: Utc.with_ymd_and_hms(2026, 10, 24, 15, 0, 0).unwrap(),
                home: "Arsenal".to_string(),
                away: "Chelsea".to_string(),
            }],
            quotes: vec![Quote {
                match_id: "evt1".to_string(),
                market: Market::Totals {
                    line: Line::new(2.5).unwrap(),
                },
                selection: Selection::Over,
                price: 1.95,
                book: "Bet365".to_string(),
            }],
        };
        let path = temp_path("snapshot.json");
        save_snapshot_to_cache(&snapshot, &path).unwrap();
        let loaded = load_snapshot_from_cache(&path).unwrap();
        assert_eq!(loaded, snapshot);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_convert_raw_quotes_skips_bad_rows() {
        let raw = vec![
            RawQuote {
                match_id: "evt1".to_string(),
                market: "OU".to_string(),
                selection: "Over".to_string(),
                price: 1.9,
                book: "A".to_string(),
                line: Some(2.5),
                ..Default::default()
            },
            RawQuote {
                match_id: "evt1".to_string(),
                market: "Corners".to_string(),
                selection: "Over".to_string(),
                price: 1.9,
                book: "A".to_string(),
                ..Default::default()
            },
        ];
        let quotes = convert_raw_quotes(raw);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].selection, Selection::Over);
    }

    #[test]
    fn test_model_csv_layout() {
        let rows = vec![
            ModelRow {
                match_id: "evt1".to_string(),
                market: Market::Moneyline,
                selection: Selection::Draw,
                probability: 0.2566816,
                push: None,
            },
            ModelRow {
                match_id: "evt1".to_string(),
                market: Market::AsianHandicap {
                    line: Line::new(0.0).unwrap(),
                },
                selection: Selection::Home,
                probability: 0.45,
                push: Some(0.25),
            },
        ];
        let mut out = Vec::new();
        write_model_csv(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "match_id,market,selection,probability,push");
        assert_eq!(lines[1], "evt1,1X2,Draw,0.256682,");
        assert_eq!(lines[2], "evt1,AH+0,Home,0.450000,0.250000");
        assert_eq!(lines.len(), 3);
    }
}
