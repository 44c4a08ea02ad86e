//! Shape 1: HTML with server-side data, parsed with a CSS-selector library.
//! Covers' consensus page lists one `<div class="consensus-pick">` per
//! matchup, each carrying the teams, the majority side, and a confidence
//! label in plain text nodes.

use chrono::{DateTime, NaiveDate, Utc};
use scraper::{Html, Selector};

use crate::models::{Confidence, PickType, RawPrediction, Side};

use super::{Adapter, AdapterConfig, Backoff, BackoffKind};
use crate::models::FetchMethod;
use std::collections::HashMap;

pub fn adapter() -> Adapter {
    let mut paths = HashMap::new();
    paths.insert("nba".to_string(), "/picks/nba/consensus".to_string());
    paths.insert("nfl".to_string(), "/picks/nfl/consensus".to_string());

    Adapter {
        config: AdapterConfig {
            id: "covers-consensus".to_string(),
            name: "Covers Consensus".to_string(),
            base_url: "https://www.covers.com".to_string(),
            fetch_method: FetchMethod::Http,
            paths,
            cron: "0 */15 * * * *".to_string(),
            rate_limit_ms: 4000,
            max_retries: 3,
            backoff: Backoff {
                kind: BackoffKind::Exponential,
                delay_ms: 1000,
            },
        },
        parse: Box::new(parse),
        discover_urls: None,
    }
}

fn parse(html: &[u8], sport: &str, fetched_at: DateTime<Utc>) -> Vec<RawPrediction> {
    let Ok(text) = std::str::from_utf8(html) else {
        return vec![];
    };
    let document = Html::parse_document(text);
    let Ok(card_selector) = Selector::parse("div.consensus-pick") else {
        return vec![];
    };
    let home_sel = Selector::parse(".home-team").unwrap();
    let away_sel = Selector::parse(".away-team").unwrap();
    let side_sel = Selector::parse(".pick-side").unwrap();
    let date_sel = Selector::parse(".game-date").unwrap();
    let confidence_sel = Selector::parse(".confidence").unwrap();

    let mut out = Vec::new();
    for card in document.select(&card_selector) {
        let home = card.select(&home_sel).next().map(|e| e.text().collect::<String>());
        let away = card.select(&away_sel).next().map(|e| e.text().collect::<String>());
        let side_text = card.select(&side_sel).next().map(|e| e.text().collect::<String>());
        let date_text = card.select(&date_sel).next().map(|e| e.text().collect::<String>());

        let (Some(home), Some(away), Some(side_text), Some(date_text)) =
            (home, away, side_text, date_text)
        else {
            continue;
        };

        let Some(game_date) = parse_consensus_date(date_text.trim()) else {
            continue;
        };
        let Some(side) = parse_side(side_text.trim(), &home, &away) else {
            continue;
        };

        let confidence = card
            .select(&confidence_sel)
            .next()
            .map(|e| e.text().collect::<String>())
            .and_then(|text| map_confidence(text.trim()));

        out.push(RawPrediction {
            source_id: String::new(),
            sport: sport.to_string(),
            home_team_raw: home.trim().to_string(),
            away_team_raw: away.trim().to_string(),
            game_date,
            game_time: None,
            pick_type: PickType::Moneyline,
            side,
            value: None,
            picker_name: "Covers Consensus".to_string(),
            confidence,
            reasoning: None,
            fetched_at,
        });
    }
    out
}

fn parse_consensus_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%b %d, %Y").ok()
}

fn parse_side(raw: &str, home: &str, away: &str) -> Option<Side> {
    let normalized = raw.to_lowercase();
    if normalized.contains(&home.to_lowercase()) {
        Some(Side::Home)
    } else if normalized.contains(&away.to_lowercase()) {
        Some(Side::Away)
    } else {
        None
    }
}

fn map_confidence(raw: &str) -> Option<Confidence> {
    match raw.to_lowercase().as_str() {
        "best bet" => Some(Confidence::BestBet),
        "strong" | "high" => Some(Confidence::High),
        "lean" | "medium" => Some(Confidence::Medium),
        _ => Some(Confidence::Low),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_html() -> &'static str {
        r#"
        <html><body>
            <div class="consensus-pick">
                <span class="home-team">Celtics</span>
                <span class="away-team">Lakers</span>
                <span class="pick-side">Celtics</span>
                <span class="game-date">Feb 16, 2026</span>
                <span class="confidence">Best Bet</span>
            </div>
            <div class="consensus-pick">
                <span class="home-team">Heat</span>
                <!-- missing away team, must be dropped -->
                <span class="pick-side">Heat</span>
                <span class="game-date">Feb 17, 2026</span>
            </div>
        </body></html>
        "#
    }

    #[test]
    fn parses_one_well_formed_card_and_drops_the_malformed_one() {
        let preds = parse(fixture_html().as_bytes(), "nba", Utc::now());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].home_team_raw, "Celtics");
        assert_eq!(preds[0].side, Side::Home);
        assert_eq!(preds[0].confidence, Some(Confidence::BestBet));
    }

    #[test]
    fn empty_document_yields_no_predictions() {
        assert!(parse(b"<html></html>", "nba", Utc::now()).is_empty());
    }

    #[test]
    fn non_utf8_bytes_are_tolerated_not_panicked_on() {
        let garbage: &[u8] = &[0xff, 0xfe, 0x00];
        assert!(parse(garbage, "nba", Utc::now()).is_empty());
    }
}
