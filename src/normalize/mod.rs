//! Team Resolver (§4.D) and Normalizer (§4.E): turn a `RawPrediction` into
//! a persisted `predictions` row keyed to a `matches` row, resolving team
//! names against the roster and computing the dedup key.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::db;
use crate::error::NormalizeError;
use crate::models::{team_space, RawPrediction, TeamSpace};

/// `resolveTeamId(rawName, sport)`. Ordered, stops on first hit:
/// exact alias, abbreviation, longest-substring alias, then (for
/// unbounded sports only) auto-create.
pub async fn resolve_team_id(
    pool: &SqlitePool,
    raw_name: &str,
    sport: &str,
) -> Result<Option<String>, NormalizeError> {
    let normalized = normalize_name(raw_name);
    if normalized.is_empty() {
        return Ok(None);
    }

    if let Some(team) = db::get_team_by_alias(pool, &normalized, sport).await? {
        return Ok(Some(team.id));
    }
    if let Some(team) = db::get_team_by_abbreviation(pool, &normalized, sport).await? {
        return Ok(Some(team.id));
    }
    if let Some(team_id) = substring_match(pool, &normalized, sport).await? {
        return Ok(Some(team_id));
    }

    match team_space(sport) {
        TeamSpace::Unbounded => {
            let team_id = db::create_team_with_alias(
                pool,
                raw_name,
                raw_name,
                sport,
                &normalized,
            )
            .await?;
            Ok(Some(team_id))
        }
        TeamSpace::Curated => Ok(None),
    }
}

fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The largest alias for the sport that is a substring of the normalized
/// raw name, or vice versa; ties broken by the longer alias. A direct
/// generalization of a single fixed two-way `contains` check across every
/// alias on file for the sport.
async fn substring_match(
    pool: &SqlitePool,
    normalized: &str,
    sport: &str,
) -> Result<Option<String>, NormalizeError> {
    let aliases = db::get_aliases_for_sport(pool, sport).await?;
    let mut best: Option<(usize, &str)> = None;

    for alias in &aliases {
        let candidate = alias.alias.as_str();
        let matches = normalized.contains(candidate) || candidate.contains(normalized);
        if !matches {
            continue;
        }
        let len = candidate.len();
        if best.map(|(best_len, _)| len > best_len).unwrap_or(true) {
            best = Some((len, alias.team_id.as_str()));
        }
    }

    Ok(best.map(|(_, team_id)| team_id.to_string()))
}

/// Deterministic six-tuple hash (§4.E step 3), stable across processes and
/// Rust versions — unlike a `DefaultHasher`-based hash, which explicitly
/// makes no such guarantee.
pub fn dedup_key(
    source_slug: &str,
    match_id: &str,
    picker_name: &str,
    pick_type: &str,
    side: &str,
    value: Option<f64>,
    game_date: NaiveDate,
) -> String {
    let value_token = value.map(|v| v.to_string()).unwrap_or_default();
    let joined = format!(
        "{source_slug}\u{1f}{match_id}\u{1f}{picker_name}\u{1f}{pick_type}\u{1f}{side}\u{1f}{value_token}\u{1f}{game_date}"
    );
    blake3::hash(joined.as_bytes()).to_hex().to_string()
}

/// Runs the Normalizer over one `RawPrediction`. Returns `Ok(Some(true))`
/// for a newly inserted row, `Ok(Some(false))` for an expected duplicate,
/// `Ok(None)` when a team could not be resolved (row silently dropped per
/// §4.E step 1).
pub async fn normalize(
    pool: &SqlitePool,
    source_slug: &str,
    prediction: &RawPrediction,
) -> Result<Option<bool>, NormalizeError> {
    let home_team_id = resolve_team_id(pool, &prediction.home_team_raw, &prediction.sport).await?;
    let away_team_id = resolve_team_id(pool, &prediction.away_team_raw, &prediction.sport).await?;
    let (Some(home_team_id), Some(away_team_id)) = (home_team_id, away_team_id) else {
        return Ok(None);
    };

    let match_id = db::find_or_create_match(
        pool,
        &prediction.sport,
        &home_team_id,
        &away_team_id,
        prediction.game_date,
        prediction.game_time.as_deref(),
    )
    .await?;

    let key = dedup_key(
        source_slug,
        &match_id,
        &prediction.picker_name,
        prediction.pick_type.as_str(),
        prediction.side.as_str(),
        prediction.value,
        prediction.game_date,
    );

    let inserted = db::insert_prediction(
        pool,
        &prediction.source_id,
        &match_id,
        &prediction.sport,
        &home_team_id,
        &away_team_id,
        prediction.pick_type.as_str(),
        prediction.side.as_str(),
        prediction.value,
        &prediction.picker_name,
        prediction.confidence.map(|c| c.as_str()),
        prediction.reasoning.as_deref(),
        &key,
        prediction.fetched_at,
    )
    .await?;

    Ok(Some(inserted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, init_database};
    use crate::models::{PickType, Side};
    use chrono::Utc;

    async fn test_pool() -> SqlitePool {
        let pool = create_pool("sqlite::memory:", 1).await.unwrap();
        init_database(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn resolves_exact_alias_then_abbreviation_then_substring() {
        let pool = test_pool().await;
        let team_id = db::create_team_with_alias(&pool, "Boston Celtics", "BOS", "nba", "celtics")
            .await
            .unwrap();

        assert_eq!(
            resolve_team_id(&pool, "Celtics", "nba").await.unwrap(),
            Some(team_id.clone())
        );
        assert_eq!(
            resolve_team_id(&pool, "BOS", "nba").await.unwrap(),
            Some(team_id.clone())
        );
        assert_eq!(
            resolve_team_id(&pool, "Boston Celtics (home)", "nba")
                .await
                .unwrap(),
            Some(team_id)
        );
    }

    #[tokio::test]
    async fn curated_sport_returns_none_for_unknown_team() {
        let pool = test_pool().await;
        assert_eq!(resolve_team_id(&pool, "Nonexistent Team", "nba").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unbounded_sport_auto_creates_unknown_team() {
        let pool = test_pool().await;
        let team_id = resolve_team_id(&pool, "Some FC", "football")
            .await
            .unwrap()
            .expect("unbounded sport should auto-create");
        // Re-resolving is idempotent and returns the same team.
        assert_eq!(
            resolve_team_id(&pool, "Some FC", "football").await.unwrap(),
            Some(team_id)
        );
    }

    #[tokio::test]
    async fn normalize_inserts_once_and_dedups_on_repeat() {
        let pool = test_pool().await;
        db::create_team_with_alias(&pool, "Boston Celtics", "BOS", "nba", "celtics")
            .await
            .unwrap();
        db::create_team_with_alias(&pool, "Miami Heat", "MIA", "nba", "heat")
            .await
            .unwrap();

        let raw = RawPrediction {
            source_id: "src-1".to_string(),
            sport: "nba".to_string(),
            home_team_raw: "Celtics".to_string(),
            away_team_raw: "Heat".to_string(),
            game_date: NaiveDate::from_ymd_opt(2026, 2, 16).unwrap(),
            game_time: None,
            pick_type: PickType::Moneyline,
            side: Side::Home,
            value: None,
            picker_name: "J. Smith".to_string(),
            confidence: None,
            reasoning: None,
            fetched_at: Utc::now(),
        };

        let first = normalize(&pool, "covers-consensus", &raw).await.unwrap();
        assert_eq!(first, Some(true));
        let second = normalize(&pool, "covers-consensus", &raw).await.unwrap();
        assert_eq!(second, Some(false));
    }
}
