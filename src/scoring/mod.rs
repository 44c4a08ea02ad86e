//! Scoring Engine (§4.J): nine independent factor functions, composed into
//! a 0-100 composite per match. Each factor is pure and takes already
//! fetched inputs, mirroring the Grader's rule-per-function style so the
//! composite is directly unit-testable without a database.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::db;
use crate::error::ScoringError;
use crate::models::{AccuracyStat, Confidence, Match, PickType, Prediction, Side};

const ACCURACY_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const RESULT_CACHE_TTL_SECS: u64 = 5 * 60;
const MIN_DECIDED_FOR_ACCURACY: i64 = 10;

pub const TOP_PICKS_THRESHOLD: u32 = 30;
pub const BEST_MULTIS_THRESHOLD: u32 = 50;

// ---- factor functions (§4.J) ----

/// Majority ML side wins `favSide`; full agreement uses the flat table,
/// any dissent applies the `majority*5 - minority*8` penalty instead.
pub fn factor_source_agreement(moneyline_sides: &[Side]) -> (f64, Option<Side>) {
    let mut counts: HashMap<Side, u32> = HashMap::new();
    for side in moneyline_sides {
        *counts.entry(*side).or_insert(0) += 1;
    }
    let Some((&fav_side, &majority)) = counts.iter().max_by_key(|(_, count)| **count) else {
        return (0.0, None);
    };
    let minority: u32 = counts.values().sum::<u32>() - majority;
    let score = if minority == 0 {
        match majority {
            m if m >= 4 => 20.0,
            3 => 18.0,
            2 => 14.0,
            _ => 5.0,
        }
    } else {
        ((majority as f64) * 5.0 - (minority as f64) * 8.0).clamp(0.0, 20.0)
    };
    (score, Some(fav_side))
}

pub fn factor_confidence(confidences: &[Confidence]) -> f64 {
    if confidences.is_empty() {
        return 3.0;
    }
    let points: Vec<f64> = confidences.iter().map(|c| c.points()).collect();
    let max = points.iter().cloned().fold(0.0_f64, f64::max);
    let mean = points.iter().sum::<f64>() / points.len() as f64;
    (0.7 * max + 0.3 * mean).round()
}

/// `avg` is the mean of the absolute `Predicted: H-A` margins parsed from
/// reasoning text across backing sources.
pub fn factor_predicted_margin(margins: &[f64], sport: &str, predicted_draw: bool) -> f64 {
    if predicted_draw {
        return 2.0;
    }
    if margins.is_empty() {
        return 0.0;
    }
    let avg = margins.iter().sum::<f64>() / margins.len() as f64;
    match sport.to_lowercase().as_str() {
        "football" => {
            if avg >= 3.0 {
                25.0
            } else if avg >= 2.0 {
                20.0
            } else if avg >= 1.0 {
                12.0
            } else {
                3.0
            }
        }
        _ => {
            if avg >= 12.0 {
                25.0
            } else if avg >= 8.0 {
                20.0
            } else if avg >= 5.0 {
                15.0
            } else {
                8.0
            }
        }
    }
}

pub fn american_to_decimal(american_odds: f64) -> f64 {
    if american_odds >= 0.0 {
        1.0 + american_odds / 100.0
    } else {
        1.0 + 100.0 / american_odds.abs()
    }
}

/// Blends source track-record accuracy with the agreement ratio, plus
/// small backing-count and confidence bonuses, clamped to `[0.15, 0.92]`.
pub fn estimate_probability(
    accuracy_pct: Option<f64>,
    agreement_ratio: f64,
    backing_count: u32,
    avg_confidence_points: f64,
) -> f64 {
    let w = (agreement_ratio.clamp(0.0, 1.0) * 1.2).min(1.0);
    let acc = accuracy_pct.unwrap_or(50.0) / 100.0;
    let mut prob = acc * w + 0.5 * (1.0 - w);
    prob += ((backing_count as f64) * 0.01).min(0.05);
    prob += (avg_confidence_points / 30.0 * 0.04).min(0.04);
    prob.clamp(0.15, 0.92)
}

pub fn factor_value(prob: f64, best_decimal_odds: Option<f64>) -> f64 {
    let Some(odds) = best_decimal_odds else {
        return 0.0;
    };
    let ev_pct = (prob * odds - 1.0) * 100.0;
    if ev_pct >= 20.0 {
        20.0
    } else if ev_pct >= 12.0 {
        17.0
    } else if ev_pct >= 6.0 {
        14.0
    } else if ev_pct >= 2.0 {
        10.0
    } else if ev_pct >= 0.0 {
        6.0
    } else if ev_pct >= -5.0 {
        3.0
    } else {
        0.0
    }
}

pub fn factor_source_accuracy(avg_win_rate: Option<f64>) -> f64 {
    let Some(rate) = avg_win_rate else {
        return 5.0;
    };
    let pct = rate * 100.0;
    if pct >= 65.0 {
        15.0
    } else if pct >= 58.0 {
        12.0
    } else if pct >= 52.0 {
        9.0
    } else if pct >= 48.0 {
        6.0
    } else {
        3.0
    }
}

pub fn factor_alignment(
    fav_side: Option<Side>,
    spread_side: Option<Side>,
    btts_side: Option<Side>,
    over_under_side: Option<Side>,
    avg_goals: Option<f64>,
) -> f64 {
    let mut score = 0.0;
    if let (Some(ml), Some(spread)) = (fav_side, spread_side) {
        if ml == spread {
            score += 4.0;
        }
    }
    match (btts_side, over_under_side) {
        (Some(Side::Yes), Some(Side::Over)) => score += 4.0,
        (Some(Side::No), Some(Side::Under)) => score += 4.0,
        _ => {}
    }
    if let Some(avg_goals) = avg_goals {
        match over_under_side {
            Some(Side::Over) if avg_goals >= 2.5 => score += 2.0,
            Some(Side::Under) if avg_goals < 2.0 => score += 2.0,
            _ => {}
        }
    }
    score.min(10.0)
}

fn current_streak(last_results_most_recent_first: &[bool]) -> u32 {
    let mut streak = 0;
    for &won in last_results_most_recent_first {
        if won {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

pub fn factor_form(last10: &[bool]) -> f64 {
    if last10.is_empty() {
        return 0.0;
    }
    let wins = last10.iter().filter(|w| **w).count() as f64;
    let base = wins / 10.0 * 7.0;
    let streak = current_streak(last10);
    let bonus = if streak >= 5 {
        3.0
    } else if streak >= 3 {
        2.0
    } else if streak >= 2 {
        1.0
    } else {
        0.0
    };
    (base + bonus).min(10.0)
}

pub fn factor_h2h(fav_side_won_per_meeting: &[bool]) -> f64 {
    if fav_side_won_per_meeting.len() < 2 {
        return 0.0;
    }
    let wins = fav_side_won_per_meeting.iter().filter(|w| **w).count() as f64;
    let rate = wins / fav_side_won_per_meeting.len() as f64;
    if rate >= 0.8 {
        5.0
    } else if rate >= 0.6 {
        3.0
    } else if rate >= 0.5 {
        1.0
    } else {
        0.0
    }
}

pub fn factor_home_advantage(games: i64, wins: i64) -> f64 {
    if games < 5 {
        return 0.0;
    }
    let rate = wins as f64 / games as f64;
    if rate >= 0.75 {
        5.0
    } else if rate >= 0.60 {
        3.0
    } else if rate >= 0.50 {
        1.0
    } else {
        0.0
    }
}

// ---- composite ----

#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoreBreakdown {
    pub source_agreement: f64,
    pub confidence: f64,
    pub predicted_margin: f64,
    pub value: f64,
    pub source_accuracy: f64,
    pub alignment: f64,
    pub form: f64,
    pub head_to_head: f64,
    pub home_advantage: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoredMatch {
    pub match_id: String,
    pub sport: String,
    pub game_date: NaiveDate,
    pub composite: u32,
    pub recommendation: Side,
    pub breakdown: ScoreBreakdown,
}

/// Already-fetched inputs for one match's group of predictions — gathered
/// by `gather_inputs`, then composed by the pure `score_match`.
#[derive(Debug, Clone, Default)]
pub struct ScoringInputs {
    pub match_id: String,
    pub sport: String,
    pub game_date: Option<NaiveDate>,
    pub moneyline_sides: Vec<Side>,
    pub confidences: Vec<Confidence>,
    pub predicted_margins: Vec<f64>,
    pub predicted_draw: bool,
    pub backing_count: u32,
    pub best_decimal_odds: Option<f64>,
    pub avg_source_win_rate: Option<f64>,
    pub spread_side: Option<Side>,
    pub btts_side: Option<Side>,
    pub over_under_side: Option<Side>,
    pub avg_goals: Option<f64>,
    pub favored_team_form: Vec<bool>,
    pub h2h_meetings: Vec<bool>,
    pub venue_games: i64,
    pub venue_wins: i64,
}

pub fn score_match(inputs: &ScoringInputs) -> ScoredMatch {
    let (agreement_score, fav_side) = factor_source_agreement(&inputs.moneyline_sides);
    let fav_side = fav_side.unwrap_or(Side::Home);

    let confidence_score = factor_confidence(&inputs.confidences);
    let margin_score =
        factor_predicted_margin(&inputs.predicted_margins, &inputs.sport, inputs.predicted_draw);

    let total_sources = inputs.moneyline_sides.len().max(1) as f64;
    let majority_count = inputs
        .moneyline_sides
        .iter()
        .filter(|side| **side == fav_side)
        .count() as f64;
    let agreement_ratio = majority_count / total_sources;
    let avg_confidence_points = if inputs.confidences.is_empty() {
        0.0
    } else {
        inputs.confidences.iter().map(|c| c.points()).sum::<f64>() / inputs.confidences.len() as f64
    };
    let accuracy_pct = inputs.avg_source_win_rate.map(|r| r * 100.0);
    let prob = estimate_probability(
        accuracy_pct,
        agreement_ratio,
        inputs.backing_count,
        avg_confidence_points,
    );
    let value_score = factor_value(prob, inputs.best_decimal_odds);

    let accuracy_score = factor_source_accuracy(inputs.avg_source_win_rate);
    let alignment_score = factor_alignment(
        Some(fav_side),
        inputs.spread_side,
        inputs.btts_side,
        inputs.over_under_side,
        inputs.avg_goals,
    );
    let form_score = factor_form(&inputs.favored_team_form);
    let h2h_score = factor_h2h(&inputs.h2h_meetings);
    let home_advantage_score = factor_home_advantage(inputs.venue_games, inputs.venue_wins);

    let raw = agreement_score
        + confidence_score
        + margin_score
        + value_score
        + accuracy_score
        + alignment_score
        + form_score
        + h2h_score
        + home_advantage_score;
    let composite = (raw / 140.0 * 100.0).round().clamp(0.0, 100.0) as u32;

    ScoredMatch {
        match_id: inputs.match_id.clone(),
        sport: inputs.sport.clone(),
        game_date: inputs.game_date.unwrap_or_else(|| chrono::Utc::now().date_naive()),
        composite,
        recommendation: fav_side,
        breakdown: ScoreBreakdown {
            source_agreement: agreement_score,
            confidence: confidence_score,
            predicted_margin: margin_score,
            value: value_score,
            source_accuracy: accuracy_score,
            alignment: alignment_score,
            form: form_score,
            head_to_head: h2h_score,
            home_advantage: home_advantage_score,
        },
    }
}

fn parse_predicted_margin(reasoning: &str) -> Option<(f64, bool)> {
    let idx = reasoning.find("Predicted:")?;
    let rest = reasoning[idx + "Predicted:".len()..].trim();
    let token = rest.split_whitespace().next()?;
    let mut parts = token.splitn(2, '-');
    let home: f64 = parts.next()?.trim().parse().ok()?;
    let away: f64 = parts.next()?.trim().parse().ok()?;
    let margin = (home - away).abs();
    Some((margin, margin < f64::EPSILON))
}

// ---- source-accuracy cache (§4.J, 30-minute TTL) ----

pub struct AccuracyCache {
    entries: RwLock<HashMap<(String, String), (AccuracyStat, Instant)>>,
}

impl AccuracyCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Prefers a sport-specific stat with `>= 10` decided picks, falls back
    /// to the source's cross-sport aggregate under the same threshold,
    /// else `None`.
    pub async fn win_rate(
        &self,
        pool: &SqlitePool,
        source_id: &str,
        sport: &str,
    ) -> Result<Option<f64>, ScoringError> {
        if let Some(stat) = self.lookup(pool, source_id, Some(sport)).await? {
            return Ok(Some(stat.win_rate));
        }
        if let Some(stat) = self.lookup(pool, source_id, None).await? {
            return Ok(Some(stat.win_rate));
        }
        Ok(None)
    }

    async fn lookup(
        &self,
        pool: &SqlitePool,
        source_id: &str,
        sport: Option<&str>,
    ) -> Result<Option<AccuracyStat>, ScoringError> {
        let key = (source_id.to_string(), sport.unwrap_or("*").to_string());
        if let Some((stat, cached_at)) = self.entries.read().await.get(&key) {
            if cached_at.elapsed() < ACCURACY_CACHE_TTL {
                return Ok(Some(stat.clone()));
            }
        }
        let stat = db::get_source_accuracy(pool, source_id, sport, MIN_DECIDED_FOR_ACCURACY).await?;
        if let Some(stat) = &stat {
            self.entries
                .write()
                .await
                .insert(key, (stat.clone(), Instant::now()));
        }
        Ok(stat)
    }
}

impl Default for AccuracyCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---- result cache (§4.J, 5-minute TTL, md5 ETag, SCAN-delete invalidation) ----

pub struct ResultCache {
    conn: ConnectionManager,
}

impl ResultCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn cache_key(sport: &str, date: &str, view: &str, limit: Option<u32>) -> String {
        format!("scored:{sport}:{date}:{view}:{}", limit.unwrap_or(0))
    }

    /// Returns the cached JSON payload and its ETag, if present and fresh.
    pub async fn get(
        &self,
        sport: &str,
        date: &str,
        view: &str,
        limit: Option<u32>,
    ) -> Result<Option<(String, String)>, ScoringError> {
        let mut conn = self.conn.clone();
        let key = Self::cache_key(sport, date, view, limit);
        let payload: Option<String> = conn.get(&key).await?;
        Ok(payload.map(|body| {
            let etag = Self::etag(&body);
            (body, etag)
        }))
    }

    pub async fn set(
        &self,
        sport: &str,
        date: &str,
        view: &str,
        limit: Option<u32>,
        payload: &str,
    ) -> Result<(), ScoringError> {
        let mut conn = self.conn.clone();
        let key = Self::cache_key(sport, date, view, limit);
        let _: () = conn.set_ex(key, payload, RESULT_CACHE_TTL_SECS).await?;
        Ok(())
    }

    pub fn etag(payload: &str) -> String {
        format!("{:x}", md5::compute(payload.as_bytes()))
    }

    /// Invalidates every cached view for `(sport, date)` when new
    /// predictions land for that slice.
    pub async fn invalidate(&self, sport: &str, date: &str) -> Result<(), ScoringError> {
        let mut conn = self.conn.clone();
        let pattern = format!("scored:{sport}:{date}:*");
        let mut keys: Vec<String> = Vec::new();
        let mut iter: redis::AsyncIter<String> = conn.scan_match(&pattern).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        drop(iter);
        if !keys.is_empty() {
            let _: () = conn.del(keys).await?;
        }
        Ok(())
    }
}

// ---- batch orchestration ----

async fn gather_inputs(
    pool: &SqlitePool,
    accuracy_cache: &AccuracyCache,
    match_row: &Match,
    predictions: &[Prediction],
) -> Result<ScoringInputs, ScoringError> {
    let mut moneyline_sides = Vec::new();
    let mut confidences = Vec::new();
    let mut predicted_margins = Vec::new();
    let mut predicted_draw = false;
    let mut spread_side = None;
    let mut btts_side = None;
    let mut over_under_side = None;
    let mut source_ids = std::collections::HashSet::new();
    let mut american_odds_candidates = Vec::new();

    for prediction in predictions {
        source_ids.insert(prediction.source_id.clone());
        let side: Side = prediction.side.parse().unwrap_or(Side::Home);
        let pick_type: PickType = prediction.pick_type.parse().unwrap_or(PickType::Moneyline);
        if let Some(confidence) = prediction.confidence.as_deref().and_then(|c| c.parse().ok()) {
            confidences.push(confidence);
        }
        if let Some(reasoning) = &prediction.reasoning {
            if let Some((margin, is_draw)) = parse_predicted_margin(reasoning) {
                predicted_margins.push(margin);
                predicted_draw |= is_draw;
            }
        }
        match pick_type {
            PickType::Moneyline => {
                moneyline_sides.push(side);
                if let Some(value) = prediction.value {
                    american_odds_candidates.push(american_to_decimal(value));
                }
            }
            PickType::Spread => spread_side = Some(side),
            PickType::OverUnder => over_under_side = Some(side),
            PickType::Prop => btts_side = Some(side),
            PickType::Parlay => {}
        }
    }

    let sport = match_row.sport.clone();
    let mut win_rates = Vec::new();
    for source_id in &source_ids {
        if let Some(rate) = accuracy_cache.win_rate(pool, source_id, &sport).await? {
            win_rates.push(rate);
        }
    }
    let avg_source_win_rate = if win_rates.is_empty() {
        None
    } else {
        Some(win_rates.iter().sum::<f64>() / win_rates.len() as f64)
    };

    let best_decimal_odds = american_odds_candidates
        .into_iter()
        .fold(None, |best: Option<f64>, odds| match best {
            Some(current) if current >= odds => Some(current),
            _ => Some(odds),
        });

    let h2h_rows =
        db::get_h2h_results(pool, &match_row.home_team_id, &match_row.away_team_id, 10).await?;
    let avg_goals = if h2h_rows.is_empty() {
        None
    } else {
        Some(
            h2h_rows
                .iter()
                .map(|(_, home, away)| (home + away) as f64)
                .sum::<f64>()
                / h2h_rows.len() as f64,
        )
    };

    let (_, fav_side) = factor_source_agreement(&moneyline_sides);
    let fav_side = fav_side.unwrap_or(Side::Home);
    let favored_team_id = if fav_side == Side::Home {
        &match_row.home_team_id
    } else {
        &match_row.away_team_id
    };
    let favored_team_form = db::get_team_form(pool, favored_team_id, 10).await?;

    let h2h_meetings: Vec<bool> = h2h_rows
        .iter()
        .map(|(home_team_id, home_score, away_score)| {
            let favored_was_home = home_team_id == favored_team_id;
            if favored_was_home {
                home_score > away_score
            } else {
                away_score > home_score
            }
        })
        .collect();

    let (venue_games, venue_wins) = if fav_side == Side::Home {
        db::get_home_split(pool, favored_team_id).await?
    } else {
        db::get_away_split(pool, favored_team_id).await?
    };

    Ok(ScoringInputs {
        match_id: match_row.id.clone(),
        sport,
        game_date: Some(match_row.game_date),
        moneyline_sides,
        confidences,
        predicted_margins,
        predicted_draw,
        backing_count: source_ids.len() as u32,
        best_decimal_odds,
        avg_source_win_rate,
        spread_side,
        btts_side,
        over_under_side,
        avg_goals,
        favored_team_form,
        h2h_meetings,
        venue_games,
        venue_wins,
    })
}

/// Scores every match with predictions on or after `today - 1 day`,
/// optionally filtered by sport/date, in bounded-parallel batches of 10
/// (§4.J concurrency). Sorted by composite descending.
pub async fn score_predictions(
    pool: &SqlitePool,
    accuracy_cache: &AccuracyCache,
    sport: Option<&str>,
    date: Option<NaiveDate>,
) -> Result<Vec<ScoredMatch>, ScoringError> {
    let matches = db::get_matches(pool, sport, date).await?;
    let cutoff = chrono::Utc::now().date_naive() - chrono::Duration::days(1);
    let matches: Vec<_> = matches.into_iter().filter(|m| m.game_date >= cutoff).collect();

    let scored = stream::iter(matches.into_iter().map(|match_row| {
        let pool = pool.clone();
        async move {
            let predictions = db::get_predictions_for_match(&pool, &match_row.id).await?;
            if predictions.is_empty() {
                return Ok::<Option<ScoredMatch>, ScoringError>(None);
            }
            let inputs = gather_inputs(&pool, accuracy_cache, &match_row, &predictions).await?;
            Ok(Some(score_match(&inputs)))
        }
    }))
    .buffer_unordered(10)
    .collect::<Vec<_>>()
    .await;

    let mut results: Vec<ScoredMatch> = Vec::new();
    for outcome in scored {
        if let Some(scored_match) = outcome? {
            results.push(scored_match);
        }
    }
    results.sort_by(|a, b| b.composite.cmp(&a.composite));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maxed_inputs() -> ScoringInputs {
        ScoringInputs {
            match_id: "m1".to_string(),
            sport: "nba".to_string(),
            game_date: NaiveDate::from_ymd_opt(2026, 2, 16),
            moneyline_sides: vec![Side::Home; 4],
            confidences: vec![Confidence::BestBet; 4],
            predicted_margins: vec![14.0, 13.0],
            predicted_draw: false,
            backing_count: 5,
            best_decimal_odds: Some(3.5),
            avg_source_win_rate: Some(0.70),
            spread_side: Some(Side::Home),
            btts_side: Some(Side::Yes),
            over_under_side: Some(Side::Over),
            avg_goals: Some(3.0),
            favored_team_form: vec![true; 10],
            h2h_meetings: vec![true; 10],
            venue_games: 20,
            venue_wins: 18,
        }
    }

    fn zeroed_inputs() -> ScoringInputs {
        ScoringInputs {
            match_id: "m2".to_string(),
            sport: "nba".to_string(),
            game_date: NaiveDate::from_ymd_opt(2026, 2, 16),
            moneyline_sides: vec![],
            confidences: vec![],
            predicted_margins: vec![],
            predicted_draw: false,
            backing_count: 0,
            best_decimal_odds: None,
            avg_source_win_rate: None,
            spread_side: None,
            btts_side: None,
            over_under_side: None,
            avg_goals: None,
            favored_team_form: vec![],
            h2h_meetings: vec![],
            venue_games: 0,
            venue_wins: 0,
        }
    }

    #[test]
    fn moneyline_grading_scenario_composite_above_threshold() {
        // 4 sources picking home, all medium confidence, predicted margin
        // averaging 8 (NBA), decent odds, ≥55% source accuracy, aligned
        // alignment across ML+spread+over.
        let inputs = ScoringInputs {
            match_id: "m3".to_string(),
            sport: "nba".to_string(),
            game_date: NaiveDate::from_ymd_opt(2026, 2, 16),
            moneyline_sides: vec![Side::Home; 4],
            confidences: vec![Confidence::Medium; 4],
            predicted_margins: vec![8.0, 8.0],
            predicted_draw: false,
            backing_count: 4,
            best_decimal_odds: Some(1.80),
            avg_source_win_rate: Some(0.55),
            spread_side: Some(Side::Home),
            btts_side: None,
            over_under_side: Some(Side::Over),
            avg_goals: Some(225.0),
            favored_team_form: vec![true, true, true, false, true, true, false, true, true, true],
            h2h_meetings: vec![true, true, true, false, true],
            venue_games: 20,
            venue_wins: 15,
        };
        let scored = score_match(&inputs);
        assert!(scored.composite >= 60, "composite was {}", scored.composite);
        assert_eq!(scored.recommendation, Side::Home);
    }

    #[test]
    fn maxed_factors_reach_the_composite_ceiling() {
        let scored = score_match(&maxed_inputs());
        assert_eq!(scored.composite, 100);
    }

    #[test]
    fn zeroed_factors_reach_the_composite_floor() {
        // confidence and source_accuracy fall back to their neutral/no-data
        // table values (3, 5) rather than 0, so the floor isn't 0: raw =
        // 3.0 + 5.0 = 8.0, composite = round(8.0 / 140.0 * 100.0) = 6.
        let scored = score_match(&zeroed_inputs());
        assert_eq!(scored.composite, 6);
    }

    #[test]
    fn composite_is_monotonic_in_a_single_factor() {
        let mut low = zeroed_inputs();
        low.favored_team_form = vec![true, true, true, true, true, false, false, false, false, false];
        let mut high = low.clone();
        high.favored_team_form = vec![true; 10];

        let low_score = score_match(&low).composite;
        let high_score = score_match(&high).composite;
        assert!(high_score > low_score);
    }

    #[test]
    fn source_agreement_favors_majority_with_no_dissent() {
        let (score, side) = factor_source_agreement(&[Side::Home, Side::Home, Side::Home, Side::Home]);
        assert_eq!(score, 20.0);
        assert_eq!(side, Some(Side::Home));
    }

    #[test]
    fn source_agreement_penalizes_dissent() {
        // majority=2, minority=1: 2*5 - 1*8 = 2, well below the 14-point
        // table value a clean 2-0 split would earn.
        let (score, _) = factor_source_agreement(&[Side::Home, Side::Home, Side::Away]);
        assert_eq!(score, 2.0);
    }

    #[test]
    fn grading_scenario_parses_predicted_margin() {
        let (margin, is_draw) = parse_predicted_margin("Predicted: 110-102, strong home form").unwrap();
        assert_eq!(margin, 8.0);
        assert!(!is_draw);
    }

    #[test]
    fn american_odds_convert_to_decimal() {
        assert_eq!(american_to_decimal(150.0), 2.5);
        assert_eq!(american_to_decimal(-200.0), 1.5);
    }
}
