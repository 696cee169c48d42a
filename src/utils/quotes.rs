use crate::models::{BestQuote, MarketKey, Quote};
use crate::utils::ev_calculator::decimal_odds_to_probability;
use std::collections::HashMap;
use tracing::debug;

/// Case-insensitive substring match of a book name against a filter.
/// An empty filter matches every book.
pub fn book_matches(book: &str, filter: &str) -> bool {
    let needle = filter.trim().to_lowercase();
    needle.is_empty() || book.to_lowercase().contains(&needle)
}

/// Keep only quotes from books matching `filter`
pub fn filter_books(quotes: &[Quote], filter: Option<&str>) -> Vec<Quote> {
    match filter {
        Some(filter) => quotes
            .iter()
            .filter(|q| book_matches(&q.book, filter))
            .cloned()
            .collect(),
        None => quotes.to_vec(),
    }
}

/// Reduce quotes to the single best price per (fixture, market, selection).
///
/// Ties keep the first quote seen. Quotes with a non-finite price or a price
/// of 1.0 or below are dropped. Output follows the order in which each outcome
/// was first seen with a valid price.
pub fn reconcile(quotes: &[Quote]) -> Vec<BestQuote> {
    let mut index: HashMap<(&str, MarketKey), usize> = HashMap::new();
    let mut best: Vec<BestQuote> = Vec::new();

    for quote in quotes {
        let Some(implied_prob) = decimal_odds_to_probability(quote.price) else {
            debug!(
                "dropping quote {} {} from {} with price {}",
                quote.match_id,
                quote.key(),
                quote.book,
                quote.price
            );
            continue;
        };

        let signature = (quote.match_id.as_str(), quote.key());
        match index.get(&signature) {
            Some(&slot) => {
                if quote.price > best[slot].quote.price {
                    best[slot] = BestQuote {
                        quote: quote.clone(),
                        implied_prob,
                    };
                }
            }
            None => {
                index.insert(signature, best.len());
                best.push(BestQuote {
                    quote: quote.clone(),
                    implied_prob,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Line, Market, Selection};

    fn quote(match_id: &str, market: Market, selection: Selection, price: f64, book: &str) -> Quote {
        Quote {
            match_id: match_id.to_string(),
            market,
            selection,
            price,
            book: book.to_string(),
        }
    }

    fn sample_quotes() -> Vec<Quote> {
        let ou = Market::Totals {
            line: Line::new(2.5).unwrap(),
        };
        vec![
            quote("m1", Market::Moneyline, Selection::Home, 2.05, "Bet365"),
            quote("m1", Market::Moneyline, Selection::Home, 2.15, "Pinnacle"),
            quote("m1", Market::Moneyline, Selection::Home, 2.15, "Unibet"),
            quote("m1", Market::Moneyline, Selection::Away, 3.40, "Bet365"),
            quote("m1", ou, Selection::Over, 1.90, "Bet365"),
            quote("m2", Market::Moneyline, Selection::Home, 1.80, "Bet365"),
            quote("m1", ou, Selection::Over, f64::NAN, "Broken"),
            quote("m1", ou, Selection::Under, 0.95, "Broken"),
        ]
    }

    #[test]
    fn test_best_price_per_outcome() {
        let best = reconcile(&sample_quotes());
        assert_eq!(best.len(), 4);

        let home = &best[0];
        assert_eq!(home.quote.price, 2.15);
        // Tie on 2.15: first seen wins
        assert_eq!(home.quote.book, "Pinnacle");
        assert!((home.implied_prob - 1.0 / 2.15).abs() < 1e-12);

        let over = best
            .iter()
            .find(|b| b.quote.selection == Selection::Over)
            .unwrap();
        assert_eq!(over.quote.book, "Bet365");
    }

    #[test]
    fn test_invalid_prices_never_survive() {
        let best = reconcile(&sample_quotes());
        assert!(best.iter().all(|b| b.quote.price > 1.0 && b.quote.price.is_finite()));
        assert!(best.iter().all(|b| b.quote.book != "Broken"));

        let only_bad = vec![
            quote("m1", Market::BothTeamsScore, Selection::Yes, 1.0, "a"),
            quote("m1", Market::BothTeamsScore, Selection::Yes, f64::INFINITY, "b"),
            quote("m1", Market::BothTeamsScore, Selection::Yes, -3.0, "c"),
        ];
        assert!(reconcile(&only_bad).is_empty());
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let once = reconcile(&sample_quotes());
        let again: Vec<Quote> = once.iter().map(|b| b.quote.clone()).collect();
        assert_eq!(reconcile(&again), once);
    }

    #[test]
    fn test_book_filter() {
        assert!(book_matches("Pinnacle", "pinn"));
        assert!(book_matches("Pinnacle", ""));
        assert!(!book_matches("Bet365", "pinnacle"));

        let filtered = filter_books(&sample_quotes(), Some("BET365"));
        assert_eq!(filtered.len(), 4);
        assert_eq!(filter_books(&sample_quotes(), None).len(), 8);
    }
}
