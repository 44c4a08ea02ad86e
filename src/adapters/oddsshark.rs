//! Two-stage source (§4.C): the landing page lists article URLs; each
//! article embeds JSON-LD describing a single pick. `discover_urls` scans
//! the landing page for article links; the worker fetches each one under
//! the same source's rate-limit bucket (§4.H step 7) and runs `parse`
//! against the article body.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::models::{PickType, RawPrediction, Side};

use super::framework::extract_json_ld;
use super::{Adapter, AdapterConfig, Backoff, BackoffKind};
use crate::models::FetchMethod;

pub fn adapter() -> Adapter {
    let mut paths = HashMap::new();
    paths.insert("nba".to_string(), "/picks/nba".to_string());
    paths.insert("nfl".to_string(), "/picks/nfl".to_string());

    Adapter {
        config: AdapterConfig {
            id: "oddsshark".to_string(),
            name: "OddsShark".to_string(),
            base_url: "https://www.oddsshark.com".to_string(),
            fetch_method: FetchMethod::Http,
            paths,
            cron: "0 */20 * * * *".to_string(),
            rate_limit_ms: 3000,
            max_retries: 3,
            backoff: Backoff {
                kind: BackoffKind::Exponential,
                delay_ms: 1000,
            },
        },
        parse: Box::new(parse_article),
        discover_urls: Some(Box::new(discover_urls)),
    }
}

fn discover_urls(landing_html: &str, _sport: &str) -> Vec<String> {
    let document = Html::parse_document(landing_html);
    let Ok(selector) = Selector::parse("a.pick-article-link") else {
        return vec![];
    };
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href").map(|s| s.to_string()))
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ArticleJsonLd {
    #[serde(default, rename = "homeTeam")]
    home_team: String,
    #[serde(default, rename = "awayTeam")]
    away_team: String,
    #[serde(default, rename = "gameDate")]
    game_date: String,
    #[serde(default, rename = "pickType")]
    pick_type: String,
    #[serde(default)]
    side: String,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    author: String,
}

fn parse_article(html: &[u8], sport: &str, fetched_at: DateTime<Utc>) -> Vec<RawPrediction> {
    let Ok(text) = std::str::from_utf8(html) else {
        return vec![];
    };
    extract_json_ld(text)
        .into_iter()
        .filter_map(|block| serde_json::from_value::<ArticleJsonLd>(block).ok())
        .filter_map(|article| to_raw_prediction(article, sport, fetched_at))
        .collect()
}

fn to_raw_prediction(
    article: ArticleJsonLd,
    sport: &str,
    fetched_at: DateTime<Utc>,
) -> Option<RawPrediction> {
    if article.home_team.is_empty() || article.away_team.is_empty() || article.author.is_empty() {
        return None;
    }
    let game_date = NaiveDate::parse_from_str(&article.game_date, "%Y-%m-%d").ok()?;
    let pick_type: PickType = article.pick_type.parse().ok()?;
    let side: Side = article.side.parse().ok()?;

    Some(RawPrediction {
        source_id: String::new(),
        sport: sport.to_string(),
        home_team_raw: article.home_team,
        away_team_raw: article.away_team,
        game_date,
        game_time: None,
        pick_type,
        side,
        value: article.value,
        picker_name: article.author,
        confidence: None,
        reasoning: None,
        fetched_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_article_links_from_landing_page() {
        let html = r#"<html><body>
            <a class="pick-article-link" href="/picks/nba/lakers-celtics">Lakers vs Celtics</a>
            <a class="pick-article-link" href="/picks/nba/heat-bucks">Heat vs Bucks</a>
            <a class="footer-link" href="/about">About</a>
        </body></html>"#;
        let urls = discover_urls(html, "nba");
        assert_eq!(urls, vec!["/picks/nba/lakers-celtics", "/picks/nba/heat-bucks"]);
    }

    #[test]
    fn parses_article_json_ld_into_one_prediction() {
        let html = r#"<script type="application/ld+json">
            {"homeTeam":"Lakers","awayTeam":"Celtics","gameDate":"2026-02-16",
             "pickType":"moneyline","side":"away","author":"J. Smith"}
        </script>"#;
        let preds = parse_article(html.as_bytes(), "nba", Utc::now());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].away_team_raw, "Celtics");
        assert_eq!(preds[0].side, Side::Away);
    }

    #[test]
    fn article_missing_author_is_dropped() {
        let html = r#"<script type="application/ld+json">
            {"homeTeam":"Lakers","awayTeam":"Celtics","gameDate":"2026-02-16","pickType":"moneyline","side":"away"}
        </script>"#;
        assert!(parse_article(html.as_bytes(), "nba", Utc::now()).is_empty());
    }
}
