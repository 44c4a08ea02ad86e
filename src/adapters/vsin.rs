//! Shape 3: raw JSON endpoint. VSiN exposes a `/api/picks` feed directly;
//! no HTML parsing involved. Response fields are `#[serde(default)]`
//! throughout so a partial payload degrades to fewer predictions instead
//! of a parse failure (§4.C).

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::models::{Confidence, PickType, RawPrediction, Side};

use super::{Adapter, AdapterConfig, Backoff, BackoffKind};
use crate::models::FetchMethod;

pub fn adapter() -> Adapter {
    let mut paths = HashMap::new();
    paths.insert("nba".to_string(), "/api/picks?sport=nba".to_string());
    paths.insert("mlb".to_string(), "/api/picks?sport=mlb".to_string());

    Adapter {
        config: AdapterConfig {
            id: "vsin".to_string(),
            name: "VSiN".to_string(),
            base_url: "https://data.vsin.com".to_string(),
            fetch_method: FetchMethod::Http,
            paths,
            cron: "0 0 */1 * * *".to_string(),
            rate_limit_ms: 2000,
            max_retries: 3,
            backoff: Backoff {
                kind: BackoffKind::Exponential,
                delay_ms: 800,
            },
        },
        parse: Box::new(parse),
        discover_urls: None,
    }
}

#[derive(Debug, Default, Deserialize)]
struct VsinFeed {
    #[serde(default)]
    picks: Vec<VsinPick>,
}

#[derive(Debug, Default, Deserialize)]
struct VsinPick {
    #[serde(default)]
    home: String,
    #[serde(default)]
    away: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    market: String,
    #[serde(default)]
    selection: String,
    #[serde(default)]
    line: Option<f64>,
    #[serde(default)]
    analyst: String,
    #[serde(default)]
    rating: Option<String>,
}

fn parse(json_bytes: &[u8], sport: &str, fetched_at: DateTime<Utc>) -> Vec<RawPrediction> {
    let feed: VsinFeed = match serde_json::from_slice(json_bytes) {
        Ok(feed) => feed,
        Err(_) => return vec![],
    };

    feed.picks
        .into_iter()
        .filter_map(|pick| to_raw_prediction(pick, sport, fetched_at))
        .collect()
}

fn to_raw_prediction(
    pick: VsinPick,
    sport: &str,
    fetched_at: DateTime<Utc>,
) -> Option<RawPrediction> {
    if pick.home.is_empty() || pick.away.is_empty() || pick.analyst.is_empty() {
        return None;
    }
    let game_date = NaiveDate::parse_from_str(&pick.date, "%Y-%m-%d").ok()?;
    let pick_type = map_market(&pick.market)?;
    let side: Side = pick.selection.parse().ok()?;
    let confidence = pick.rating.as_deref().and_then(|r| r.parse::<Confidence>().ok());

    Some(RawPrediction {
        source_id: String::new(),
        sport: sport.to_string(),
        home_team_raw: pick.home,
        away_team_raw: pick.away,
        game_date,
        game_time: None,
        pick_type,
        side,
        value: pick.line,
        picker_name: pick.analyst,
        confidence,
        reasoning: None,
        fetched_at,
    })
}

fn map_market(market: &str) -> Option<PickType> {
    match market.to_lowercase().as_str() {
        "ml" | "moneyline" => Some(PickType::Moneyline),
        "spread" | "ats" => Some(PickType::Spread),
        "total" | "over_under" | "ou" => Some(PickType::OverUnder),
        "prop" => Some(PickType::Prop),
        "parlay" => Some(PickType::Parlay),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_json() -> &'static str {
        r#"{"picks":[
            {"home":"Yankees","away":"Dodgers","date":"2026-06-01","market":"ml",
             "selection":"home","analyst":"VSiN Staff","rating":"medium"},
            {"home":"","away":"Dodgers","date":"2026-06-01","market":"ml","selection":"home","analyst":"Bad Row"}
        ]}"#
    }

    #[test]
    fn parses_valid_rows_and_drops_malformed_ones() {
        let preds = parse(fixture_json().as_bytes(), "mlb", Utc::now());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].pick_type, PickType::Moneyline);
        assert_eq!(preds[0].confidence, Some(Confidence::Medium));
    }

    #[test]
    fn garbage_json_yields_no_predictions_not_a_panic() {
        assert!(parse(b"not json at all", "mlb", Utc::now()).is_empty());
    }

    #[test]
    fn unknown_market_token_drops_the_row() {
        let json = r#"{"picks":[{"home":"A","away":"B","date":"2026-06-01","market":"teaser","selection":"home","analyst":"X"}]}"#;
        assert!(parse(json.as_bytes(), "mlb", Utc::now()).is_empty());
    }
}
