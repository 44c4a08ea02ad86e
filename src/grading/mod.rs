//! Grader (§4.I): pure per-pick-type grading rules plus the scheduled loop
//! that applies them to ungraded predictions. Each `grade_*` function takes
//! primitive values and returns a `Grade` with no I/O, directly testable
//! against the concrete scenarios without a database.

pub mod sources;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db;
use crate::error::GradeError;
use crate::models::{Grade, MatchStatus, PickType, RawResult, Side};
use crate::normalize;

/// `side=home|away` straight win; `side=draw` only wins on a tied score.
pub fn grade_moneyline(home_score: i32, away_score: i32, side: Side) -> Grade {
    match side {
        Side::Draw => {
            if home_score == away_score {
                Grade::Win
            } else {
                Grade::Loss
            }
        }
        Side::Home if home_score == away_score => Grade::Push,
        Side::Away if home_score == away_score => Grade::Push,
        Side::Home => {
            if home_score > away_score {
                Grade::Win
            } else {
                Grade::Loss
            }
        }
        Side::Away => {
            if away_score > home_score {
                Grade::Win
            } else {
                Grade::Loss
            }
        }
        _ => Grade::Void,
    }
}

/// `adjustedMargin = (homeMargin if side=home else -homeMargin) + line`.
pub fn grade_spread(home_score: i32, away_score: i32, side: Side, line: Option<f64>) -> Grade {
    let Some(line) = line else {
        return Grade::Void;
    };
    let home_margin = (home_score - away_score) as f64;
    let adjusted_margin = match side {
        Side::Home => home_margin + line,
        Side::Away => -home_margin + line,
        _ => return Grade::Void,
    };
    if adjusted_margin > 0.0 {
        Grade::Win
    } else if adjusted_margin < 0.0 {
        Grade::Loss
    } else {
        Grade::Push
    }
}

/// `total = home + away` compared to `line`; push on exact.
pub fn grade_over_under(home_score: i32, away_score: i32, side: Side, line: Option<f64>) -> Grade {
    let Some(line) = line else {
        return Grade::Void;
    };
    let total = (home_score + away_score) as f64;
    match side {
        Side::Over if total > line => Grade::Win,
        Side::Over if total < line => Grade::Loss,
        Side::Under if total < line => Grade::Win,
        Side::Under if total > line => Grade::Loss,
        Side::Over | Side::Under => Grade::Push,
        _ => Grade::Void,
    }
}

/// Both-teams-to-score prop: `yes` wins iff both teams scored.
pub fn grade_prop(home_score: i32, away_score: i32, side: Side) -> Grade {
    let both_scored = home_score > 0 && away_score > 0;
    match side {
        Side::Yes if both_scored => Grade::Win,
        Side::Yes => Grade::Loss,
        Side::No if !both_scored => Grade::Win,
        Side::No => Grade::Loss,
        _ => Grade::Void,
    }
}

/// Parlays are not graded at the leaf level.
pub fn grade_parlay() -> Grade {
    Grade::Void
}

fn grade_for(
    pick_type: PickType,
    side: Side,
    value: Option<f64>,
    home_score: i32,
    away_score: i32,
) -> Grade {
    match pick_type {
        PickType::Moneyline => grade_moneyline(home_score, away_score, side),
        PickType::Spread => grade_spread(home_score, away_score, side, value),
        PickType::OverUnder => grade_over_under(home_score, away_score, side, value),
        PickType::Prop => grade_prop(home_score, away_score, side),
        PickType::Parlay => grade_parlay(),
    }
}

/// One collaborator per sport family; a real deployment would wire up one
/// JSON-endpoint scoreboard per league. Production fetches only raw,
/// unresolved team names — Team Resolver (§4.D) maps them afterward.
#[async_trait]
pub trait ResultSource: Send + Sync {
    async fn fetch_final_scores(
        &self,
        sport: &str,
        date: NaiveDate,
    ) -> Result<Vec<RawResult>, GradeError>;
}

/// Runs one grading pass: resolves each final result's teams, upserts the
/// match result, then grades every ungraded prediction for that match.
/// Idempotent: re-running is a no-op because `getUngradedPredictions`
/// excludes already-graded rows.
pub async fn run_once(
    pool: &sqlx::SqlitePool,
    result_source: &dyn ResultSource,
    sport: &str,
    date: NaiveDate,
) -> Result<u32, GradeError> {
    let results = result_source.fetch_final_scores(sport, date).await?;
    let mut graded_count = 0;

    for result in results {
        if result.status != MatchStatus::Final {
            continue;
        }
        let home_team_id = normalize::resolve_team_id(pool, &result.home_team_raw, sport)
            .await
            .map_err(|_| GradeError::ResultUnmatched)?;
        let away_team_id = normalize::resolve_team_id(pool, &result.away_team_raw, sport)
            .await
            .map_err(|_| GradeError::ResultUnmatched)?;
        let (Some(home_team_id), Some(away_team_id)) = (home_team_id, away_team_id) else {
            tracing::debug!(home = %result.home_team_raw, away = %result.away_team_raw, "grader could not resolve teams, skipping");
            continue;
        };

        let match_id =
            db::find_or_create_match(pool, sport, &home_team_id, &away_team_id, result.game_date, None)
                .await?;

        db::insert_match_result(
            pool,
            &match_id,
            result.home_score,
            result.away_score,
            result.status.as_str(),
            &result.result_source,
        )
        .await?;

        let ungraded = db::get_ungraded_predictions(pool, &match_id).await?;
        for prediction in ungraded {
            let pick_type: PickType = prediction.pick_type.parse().unwrap_or(PickType::Moneyline);
            let side: Side = prediction.side.parse().unwrap_or(Side::Home);
            let grade = grade_for(pick_type, side, prediction.value, result.home_score, result.away_score);
            db::update_prediction_grade(pool, &prediction.id, grade.as_str(), chrono::Utc::now()).await?;
            graded_count += 1;
        }
    }

    Ok(graded_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moneyline_scenario() {
        // Lakers 100 @ Celtics 103, away wins.
        assert_eq!(grade_moneyline(100, 103, Side::Away), Grade::Win);
        assert_eq!(grade_moneyline(100, 103, Side::Home), Grade::Loss);
    }

    #[test]
    fn moneyline_tie_pushes_home_away_but_wins_draw() {
        assert_eq!(grade_moneyline(100, 100, Side::Home), Grade::Push);
        assert_eq!(grade_moneyline(100, 100, Side::Away), Grade::Push);
        assert_eq!(grade_moneyline(100, 100, Side::Draw), Grade::Win);
        assert_eq!(grade_moneyline(100, 99, Side::Draw), Grade::Loss);
    }

    #[test]
    fn spread_scenario() {
        // Lakers 100 @ Celtics 103.
        assert_eq!(grade_spread(100, 103, Side::Away, Some(-6.5)), Grade::Loss);
        assert_eq!(grade_spread(100, 103, Side::Home, Some(6.5)), Grade::Win);
    }

    #[test]
    fn spread_missing_line_voids() {
        assert_eq!(grade_spread(100, 103, Side::Home, None), Grade::Void);
    }

    #[test]
    fn over_under_scenario() {
        assert_eq!(grade_over_under(100, 103, Side::Over, Some(200.5)), Grade::Win);
        assert_eq!(grade_over_under(100, 103, Side::Under, Some(200.5)), Grade::Loss);
        assert_eq!(grade_over_under(100, 103, Side::Over, Some(203.0)), Grade::Push);
    }

    #[test]
    fn prop_btts_scenario() {
        assert_eq!(grade_prop(1, 1, Side::Yes), Grade::Win);
        assert_eq!(grade_prop(1, 0, Side::Yes), Grade::Loss);
        assert_eq!(grade_prop(0, 0, Side::No), Grade::Win);
    }

    #[test]
    fn parlay_is_always_void() {
        assert_eq!(grade_parlay(), Grade::Void);
    }

    #[test]
    fn grading_is_idempotent() {
        let first = grade_moneyline(100, 103, Side::Away);
        let second = grade_moneyline(100, 103, Side::Away);
        assert_eq!(first, second);
    }

    #[test]
    fn moneyline_side_swap_law() {
        assert_eq!(grade_moneyline(100, 103, Side::Home), Grade::Loss);
        assert_eq!(grade_moneyline(103, 100, Side::Away), Grade::Loss);
    }
}
