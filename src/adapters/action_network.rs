//! Shape 2: HTML containing embedded JSON (Next.js `__NEXT_DATA__`).
//! The page ships its picks inside `props.pageProps.picks[]`; we extract
//! that blob with the shared framework helper and deserialize it with
//! `#[serde(default)]` fields throughout so a shifted upstream shape
//! drops fields rather than failing the whole page.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::models::{Confidence, PickType, RawPrediction, Side};

use super::framework::extract_next_data;
use super::{Adapter, AdapterConfig, Backoff, BackoffKind};
use crate::models::FetchMethod;

pub fn adapter() -> Adapter {
    let mut paths = HashMap::new();
    paths.insert("nba".to_string(), "/nba/picks".to_string());
    paths.insert("nfl".to_string(), "/nfl/picks".to_string());

    Adapter {
        config: AdapterConfig {
            id: "action-network".to_string(),
            name: "Action Network".to_string(),
            base_url: "https://www.actionnetwork.com".to_string(),
            fetch_method: FetchMethod::Browser,
            paths,
            cron: "0 */10 * * * *".to_string(),
            rate_limit_ms: 5000,
            max_retries: 4,
            backoff: Backoff {
                kind: BackoffKind::Exponential,
                delay_ms: 1500,
            },
        },
        parse: Box::new(parse),
        discover_urls: None,
    }
}

#[derive(Debug, Default, Deserialize)]
struct NextDataRoot {
    #[serde(default)]
    props: PageProps,
}

#[derive(Debug, Default, Deserialize)]
struct PageProps {
    #[serde(default, rename = "pageProps")]
    page_props: PicksPayload,
}

#[derive(Debug, Default, Deserialize)]
struct PicksPayload {
    #[serde(default)]
    picks: Vec<PickJson>,
}

#[derive(Debug, Default, Deserialize)]
struct PickJson {
    #[serde(default)]
    home_team: String,
    #[serde(default)]
    away_team: String,
    #[serde(default)]
    game_date: String,
    #[serde(default)]
    pick_type: String,
    #[serde(default)]
    side: String,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    picker_name: String,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

fn parse(html: &[u8], sport: &str, fetched_at: DateTime<Utc>) -> Vec<RawPrediction> {
    let Ok(text) = std::str::from_utf8(html) else {
        return vec![];
    };
    let Some(json) = extract_next_data(text) else {
        return vec![];
    };
    let root: NextDataRoot = match serde_json::from_value(json) {
        Ok(root) => root,
        Err(_) => return vec![],
    };

    root.props
        .page_props
        .picks
        .into_iter()
        .filter_map(|pick| to_raw_prediction(pick, sport, fetched_at))
        .collect()
}

fn to_raw_prediction(
    pick: PickJson,
    sport: &str,
    fetched_at: DateTime<Utc>,
) -> Option<RawPrediction> {
    if pick.home_team.is_empty() || pick.away_team.is_empty() || pick.picker_name.is_empty() {
        return None;
    }
    let game_date = NaiveDate::parse_from_str(&pick.game_date, "%Y-%m-%d").ok()?;
    let pick_type: PickType = pick.pick_type.parse().ok()?;
    let side: Side = pick.side.parse().ok()?;
    let confidence = pick.confidence.as_deref().and_then(|c| c.parse().ok());

    Some(RawPrediction {
        source_id: String::new(),
        sport: sport.to_string(),
        home_team_raw: pick.home_team,
        away_team_raw: pick.away_team,
        game_date,
        game_time: None,
        pick_type,
        side,
        value: pick.value,
        picker_name: pick.picker_name,
        confidence,
        reasoning: pick.reasoning,
        fetched_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_html() -> &'static str {
        r#"<html><body><script id="__NEXT_DATA__" type="application/json">
        {"props":{"pageProps":{"picks":[
            {"home_team":"Lakers","away_team":"Celtics","game_date":"2026-02-16",
             "pick_type":"spread","side":"home","value":-6.5,
             "picker_name":"Action Staff","confidence":"high","reasoning":"Predicted: 105-99"},
            {"home_team":"","away_team":"Celtics","game_date":"2026-02-16",
             "pick_type":"spread","side":"home","picker_name":"Bad Row"}
        ]}}}
        </script></body></html>"#
    }

    #[test]
    fn parses_well_formed_pick_and_drops_the_incomplete_one() {
        let preds = parse(fixture_html().as_bytes(), "nba", Utc::now());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].home_team_raw, "Lakers");
        assert_eq!(preds[0].value, Some(-6.5));
        assert_eq!(preds[0].confidence, Some(Confidence::High));
    }

    #[test]
    fn missing_next_data_script_yields_empty() {
        assert!(parse(b"<html><body>nothing here</body></html>", "nba", Utc::now()).is_empty());
    }
}
