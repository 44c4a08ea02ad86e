//! Thin read-only HTTP layer (§6): `axum` routes that project §4.F
//! persistence and §4.J scoring over JSON, reusing the teacher's
//! `Router<AppState>` + `ServiceBuilder` layering and `ApiResponse<T>`
//! envelope. Holds no scoring or grading logic itself.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::NaiveDate;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db;
use crate::models::{ApiResponse, Prediction};
use crate::scoring::{self, AccuracyCache, ResultCache, ScoredMatch};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub kv: ConnectionManager,
    pub config: Arc<Config>,
    pub accuracy_cache: Arc<AccuracyCache>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/predictions/stats", get(get_stats_handler))
        .route("/predictions/matches", get(get_matches_handler))
        .route("/predictions/top-picks", get(get_top_picks_handler))
        .route("/predictions/best-multis", get(get_best_multis_handler))
        .route("/predictions/accuracy", get(get_accuracy_handler))
        .route("/predictions/accuracy/history", get(get_accuracy_history_handler))
        .route("/predictions", get(get_predictions_handler))
        .route("/predictions/{match_id}", get(get_predictions_for_match_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> &'static str {
    "pickforge API is running"
}

/// Serializes `data` to JSON, computes an `md5` ETag, and either returns
/// `304 NOT MODIFIED` (when it matches `If-None-Match`) or `200` with
/// `ETag`/`Cache-Control: public, max-age=300` set (§6).
fn etag_response<T: Serialize>(headers: &HeaderMap, data: &ApiResponse<T>) -> Response {
    let body = match serde_json::to_string(data) {
        Ok(body) => body,
        Err(error) => {
            tracing::error!(%error, "failed to serialize response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let etag = format!("\"{}\"", ResultCache::etag(&body));

    if let Some(if_none_match) = headers.get(axum::http::header::IF_NONE_MATCH) {
        if if_none_match.to_str().ok() == Some(etag.as_str()) {
            return StatusCode::NOT_MODIFIED.into_response();
        }
    }

    let mut response = (StatusCode::OK, body).into_response();
    response
        .headers_mut()
        .insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(&etag) {
        response.headers_mut().insert(axum::http::header::ETAG, value);
    }
    response.headers_mut().insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=300"),
    );
    response
}

fn error_response(error: sqlx::Error) -> Response {
    tracing::error!(%error, "database error serving request");
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(ApiResponse::<()>::error(error.to_string()))).into_response()
}

#[derive(Debug, Deserialize)]
struct SportDateSourceQuery {
    sport: Option<String>,
    date: Option<NaiveDate>,
    source: Option<String>,
}

// GET /predictions — raw predictions list.
async fn get_predictions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SportDateSourceQuery>,
) -> Response {
    match db::get_predictions(&state.pool, query.sport.as_deref(), query.date, query.source.as_deref()).await {
        Ok(predictions) => etag_response(&headers, &ApiResponse::success(predictions)),
        Err(error) => error_response(error),
    }
}

// GET /predictions/:matchId — raw predictions for one match.
async fn get_predictions_for_match_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(match_id): Path<String>,
) -> Response {
    match db::get_predictions_for_match(&state.pool, &match_id).await {
        Ok(predictions) => etag_response(&headers, &ApiResponse::success(predictions)),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Serialize)]
struct PredictionStats {
    sport: String,
    source_id: String,
    pick_type: String,
    count: i64,
}

// GET /predictions/stats — totals by sport, source, pickType.
async fn get_stats_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SportDateSourceQuery>,
) -> Response {
    let predictions = match db::get_predictions(&state.pool, query.sport.as_deref(), query.date, query.source.as_deref()).await {
        Ok(predictions) => predictions,
        Err(error) => return error_response(error),
    };

    let mut totals: std::collections::HashMap<(String, String, String), i64> = std::collections::HashMap::new();
    for prediction in &predictions {
        *totals
            .entry((prediction.sport.clone(), prediction.source_id.clone(), prediction.pick_type.clone()))
            .or_insert(0) += 1;
    }
    let stats: Vec<PredictionStats> = totals
        .into_iter()
        .map(|((sport, source_id, pick_type), count)| PredictionStats { sport, source_id, pick_type, count })
        .collect();

    etag_response(&headers, &ApiResponse::success(stats))
}

#[derive(Debug, Serialize)]
struct TipBreakdown {
    pick_type: String,
    side: String,
    count: i64,
    best_confidence: Option<String>,
    avg_value: Option<f64>,
}

#[derive(Debug, Serialize)]
struct MatchWithTips {
    match_id: String,
    sport: String,
    game_date: NaiveDate,
    home_team_id: String,
    away_team_id: String,
    prediction_count: usize,
    tips: Vec<TipBreakdown>,
}

// GET /predictions/matches — matches with counts and a tips breakdown.
async fn get_matches_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SportDateSourceQuery>,
) -> Response {
    let matches = match db::get_matches(&state.pool, query.sport.as_deref(), query.date).await {
        Ok(matches) => matches,
        Err(error) => return error_response(error),
    };

    let mut results = Vec::with_capacity(matches.len());
    for match_row in matches {
        let predictions = match db::get_predictions_for_match(&state.pool, &match_row.id).await {
            Ok(predictions) => predictions,
            Err(error) => return error_response(error),
        };
        let filtered: Vec<&Prediction> = predictions
            .iter()
            .filter(|prediction| match query.source.as_deref() {
                Some(source) => prediction.source_id == source,
                None => true,
            })
            .collect();

        let mut groups: std::collections::HashMap<(String, String), Vec<&Prediction>> = std::collections::HashMap::new();
        for prediction in &filtered {
            groups
                .entry((prediction.pick_type.clone(), prediction.side.clone()))
                .or_default()
                .push(prediction);
        }
        let tips: Vec<TipBreakdown> = groups
            .into_iter()
            .map(|((pick_type, side), group)| {
                let best_confidence = group
                    .iter()
                    .filter_map(|p| p.confidence.as_deref().and_then(|c| c.parse::<crate::models::Confidence>().ok()))
                    .max()
                    .map(|c| c.as_str().to_string());
                let values: Vec<f64> = group.iter().filter_map(|p| p.value).collect();
                let avg_value = if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum::<f64>() / values.len() as f64)
                };
                TipBreakdown {
                    pick_type,
                    side,
                    count: group.len() as i64,
                    best_confidence,
                    avg_value,
                }
            })
            .collect();

        results.push(MatchWithTips {
            match_id: match_row.id,
            sport: match_row.sport,
            game_date: match_row.game_date,
            home_team_id: match_row.home_team_id,
            away_team_id: match_row.away_team_id,
            prediction_count: filtered.len(),
            tips,
        });
    }

    etag_response(&headers, &ApiResponse::success(results))
}

#[derive(Debug, Deserialize)]
struct TopPicksQuery {
    sport: Option<String>,
    date: Option<NaiveDate>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct TopPick {
    rank: usize,
    score: u32,
    #[serde(rename = "match")]
    match_id: String,
    sport: String,
    date: NaiveDate,
    pick: String,
    analysis: String,
    breakdown: scoring::ScoreBreakdown,
}

fn analysis_for(scored: &ScoredMatch) -> String {
    format!(
        "Composite {} favors {} on {} ({})",
        scored.composite,
        scored.recommendation.as_str(),
        scored.match_id,
        scored.sport
    )
}

async fn scored_matches_for(
    state: &AppState,
    sport: Option<&str>,
    date: Option<NaiveDate>,
) -> Result<Vec<ScoredMatch>, sqlx::Error> {
    scoring::score_predictions(&state.pool, &state.accuracy_cache, sport, date)
        .await
        .map_err(|error| match error {
            crate::error::ScoringError::DbUnavailable(source) => source,
            other => sqlx::Error::Protocol(other.to_string()),
        })
}

// GET /predictions/top-picks — flat top-N scored matches.
async fn get_top_picks_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TopPicksQuery>,
) -> Response {
    let scored = match scored_matches_for(&state, query.sport.as_deref(), query.date).await {
        Ok(scored) => scored,
        Err(error) => return error_response(error),
    };
    let limit = query.limit.unwrap_or(10).min(100);

    let picks: Vec<TopPick> = scored
        .into_iter()
        .filter(|scored_match| scored_match.composite >= scoring::TOP_PICKS_THRESHOLD)
        .take(limit)
        .enumerate()
        .map(|(index, scored_match)| TopPick {
            rank: index + 1,
            score: scored_match.composite,
            match_id: scored_match.match_id.clone(),
            sport: scored_match.sport.clone(),
            date: scored_match.game_date,
            pick: scored_match.recommendation.as_str().to_string(),
            analysis: analysis_for(&scored_match),
            breakdown: scored_match.breakdown,
        })
        .collect();

    etag_response(&headers, &ApiResponse::success(picks))
}

#[derive(Debug, Serialize)]
struct BestMultisForDate {
    date: NaiveDate,
    picks: Vec<ScoredMatch>,
}

// GET /predictions/best-multis — scored matches grouped by date, above the
// higher parlay-grade threshold.
async fn get_best_multis_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TopPicksQuery>,
) -> Response {
    let scored = match scored_matches_for(&state, query.sport.as_deref(), query.date).await {
        Ok(scored) => scored,
        Err(error) => return error_response(error),
    };

    let mut by_date: std::collections::BTreeMap<NaiveDate, Vec<ScoredMatch>> = std::collections::BTreeMap::new();
    for scored_match in scored {
        if scored_match.composite >= scoring::BEST_MULTIS_THRESHOLD {
            by_date.entry(scored_match.game_date).or_default().push(scored_match);
        }
    }
    let grouped: Vec<BestMultisForDate> = by_date
        .into_iter()
        .map(|(date, picks)| BestMultisForDate { date, picks })
        .collect();

    etag_response(&headers, &ApiResponse::success(grouped))
}

#[derive(Debug, Deserialize)]
struct AccuracyQuery {
    sport: Option<String>,
    #[serde(rename = "pickType")]
    pick_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct AccuracySummary {
    wins: i64,
    losses: i64,
    pushes: i64,
    voids: i64,
    win_rate: f64,
}

// GET /predictions/accuracy — summarized wins/losses/pushes/voids.
async fn get_accuracy_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AccuracyQuery>,
) -> Response {
    match db::get_accuracy_stats(&state.pool, query.sport.as_deref(), query.pick_type.as_deref()).await {
        Ok((wins, losses, pushes, voids)) => {
            let decided = wins + losses;
            let win_rate = if decided > 0 { wins as f64 / decided as f64 } else { 0.0 };
            etag_response(
                &headers,
                &ApiResponse::success(AccuracySummary { wins, losses, pushes, voids, win_rate }),
            )
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct AccuracyHistoryQuery {
    days: Option<i64>,
}

#[derive(Debug, Serialize)]
struct AccuracyHistoryDay {
    day: String,
    wins: i64,
    losses: i64,
    pushes: i64,
    voids: i64,
}

// GET /predictions/accuracy/history — daily wins/losses/pushes/voids.
async fn get_accuracy_history_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AccuracyHistoryQuery>,
) -> Response {
    let days = query.days.unwrap_or(30).clamp(1, 365);
    match db::get_accuracy_history(&state.pool, days).await {
        Ok(rows) => {
            let history: Vec<AccuracyHistoryDay> = rows
                .into_iter()
                .map(|(day, wins, losses, pushes, voids)| AccuracyHistoryDay { day, wins, losses, pushes, voids })
                .collect();
            etag_response(&headers, &ApiResponse::success(history))
        }
        Err(error) => error_response(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let pool = db::create_pool("sqlite::memory:", 5).await.unwrap();
        db::init_database(&pool).await.unwrap();
        crate::db::seed::seed_data(&pool).await.unwrap();
        let kv = ConnectionManager::new(redis::Client::open("redis://127.0.0.1:6379").unwrap())
            .await
            .expect("a local redis is reachable in test environments that exercise the API layer");
        AppState {
            pool,
            kv,
            config: Arc::new(Config::default()),
            accuracy_cache: Arc::new(AccuracyCache::new()),
        }
    }

    #[tokio::test]
    #[ignore = "requires a local redis instance"]
    async fn health_check_returns_ok() {
        let state = test_state().await;
        let app = create_router(state);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    #[ignore = "requires a local redis instance"]
    async fn predictions_matches_groups_tips_by_pick_type_and_side() {
        let state = test_state().await;
        let app = create_router(state);
        let response = app
            .oneshot(Request::builder().uri("/predictions/matches").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
