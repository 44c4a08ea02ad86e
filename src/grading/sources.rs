//! A single JSON-scoreboard `ResultSource` (§9): production would wire one
//! of these per league, each pointed at a different final-scores endpoint.
//! Kept separate from `grading::run_once` so the grading loop stays
//! oblivious to how results are actually sourced.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::ResultSource;
use crate::error::GradeError;
use crate::models::{MatchStatus, RawResult};

#[derive(Debug, Deserialize)]
struct ScoreboardEntry {
    home_team: String,
    away_team: String,
    home_score: i32,
    away_score: i32,
    #[serde(default = "default_status")]
    status: String,
}

fn default_status() -> String {
    "final".to_string()
}

/// Fetches `{base_url}/{sport}/{date}.json`, a flat array of
/// `ScoreboardEntry`. `result_source` on the returned `RawResult`s is always
/// `base_url`, matching how `Source.slug` tags everything else in §4.F.
pub struct HttpResultSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResultSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ResultSource for HttpResultSource {
    async fn fetch_final_scores(
        &self,
        sport: &str,
        date: NaiveDate,
    ) -> Result<Vec<RawResult>, GradeError> {
        let url = format!(
            "{}/{}/{}.json",
            self.base_url.trim_end_matches('/'),
            sport,
            date.format("%Y-%m-%d")
        );
        let entries: Vec<ScoreboardEntry> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|_| GradeError::ResultUnmatched)?
            .json()
            .await
            .map_err(|_| GradeError::ResultUnmatched)?;

        Ok(entries
            .into_iter()
            .map(|entry| RawResult {
                home_team_raw: entry.home_team,
                away_team_raw: entry.away_team,
                home_score: entry.home_score,
                away_score: entry.away_score,
                status: entry.status.parse().unwrap_or(MatchStatus::Final),
                game_date: date,
                result_source: self.base_url.clone(),
            })
            .collect())
    }
}
