pub mod seed;

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{
    AccuracyStat, Job, JobKind, Match, MatchResult, Prediction, Source, Team, TeamAlias,
};

/// Mirrors the teacher's `create_pool`: strip sqlite prefixes, create the
/// parent directory if needed, then open a bounded connection pool.
pub async fn create_pool(database_url: &str, pool_size: u32) -> Result<SqlitePool, sqlx::Error> {
    let path_part = database_url
        .trim_start_matches("sqlite:///")
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");

    if path_part != ":memory:" {
        if let Some(parent) = Path::new(path_part).parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
    }

    let url = if database_url.starts_with("sqlite:") && path_part != ":memory:" {
        format!("sqlite://{path_part}?mode=rwc")
    } else {
        database_url.to_string()
    };

    SqlitePoolOptions::new()
        .max_connections(pool_size)
        .connect(&url)
        .await
}

pub async fn init_database(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            base_url TEXT NOT NULL,
            fetch_method TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            last_fetched_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            abbreviation TEXT NOT NULL,
            sport TEXT NOT NULL,
            UNIQUE(abbreviation, sport)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS team_aliases (
            team_id TEXT NOT NULL REFERENCES teams(id),
            alias TEXT NOT NULL,
            UNIQUE(alias, team_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_team_aliases_alias ON team_aliases(alias)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            id TEXT PRIMARY KEY,
            sport TEXT NOT NULL,
            home_team_id TEXT NOT NULL REFERENCES teams(id),
            away_team_id TEXT NOT NULL REFERENCES teams(id),
            game_date TEXT NOT NULL,
            game_time TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(sport, home_team_id, away_team_id, game_date)
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_game_date ON matches(game_date)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS predictions (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL REFERENCES sources(id),
            match_id TEXT NOT NULL REFERENCES matches(id),
            sport TEXT NOT NULL,
            home_team_id TEXT NOT NULL,
            away_team_id TEXT NOT NULL,
            pick_type TEXT NOT NULL,
            side TEXT NOT NULL,
            value REAL,
            picker_name TEXT NOT NULL,
            confidence TEXT,
            reasoning TEXT,
            dedup_key TEXT NOT NULL UNIQUE,
            fetched_at TEXT NOT NULL,
            grade TEXT,
            graded_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_predictions_match_id ON predictions(match_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_predictions_grade ON predictions(grade)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_predictions_source_sport ON predictions(source_id, sport)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS match_results (
            match_id TEXT PRIMARY KEY REFERENCES matches(id),
            home_score INTEGER NOT NULL,
            away_score INTEGER NOT NULL,
            status TEXT NOT NULL,
            result_source TEXT NOT NULL,
            settled_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            adapter_id TEXT NOT NULL,
            sport TEXT NOT NULL,
            path TEXT NOT NULL,
            url TEXT NOT NULL,
            is_sub_url BOOLEAN NOT NULL DEFAULT 0,
            attempt INTEGER NOT NULL DEFAULT 0,
            next_fire_at TEXT NOT NULL,
            payload TEXT,
            claimed BOOLEAN NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_next_fire_at ON jobs(kind, claimed, next_fire_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn row_to_source(row: SqliteRow) -> Source {
    Source {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        base_url: row.get("base_url"),
        fetch_method: row.get("fetch_method"),
        is_active: row.get("is_active"),
        last_fetched_at: row.get("last_fetched_at"),
    }
}

pub async fn get_source_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Source>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM sources WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_source))
}

pub async fn get_source_by_slug(
    pool: &SqlitePool,
    slug: &str,
) -> Result<Option<Source>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM sources WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_source))
}

pub async fn upsert_source(
    pool: &SqlitePool,
    slug: &str,
    name: &str,
    base_url: &str,
    fetch_method: &str,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO sources (id, slug, name, base_url, fetch_method, is_active)
        VALUES (?, ?, ?, ?, ?, 1)
        ON CONFLICT(slug) DO UPDATE SET name = excluded.name, base_url = excluded.base_url
        "#,
    )
    .bind(&id)
    .bind(slug)
    .bind(name)
    .bind(base_url)
    .bind(fetch_method)
    .execute(pool)
    .await?;

    let row_id: String = sqlx::query_scalar("SELECT id FROM sources WHERE slug = ?")
        .bind(slug)
        .fetch_one(pool)
        .await?;
    Ok(row_id)
}

pub async fn update_source_last_fetched(
    pool: &SqlitePool,
    source_id: &str,
    when: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sources SET last_fetched_at = ? WHERE id = ?")
        .bind(when.to_rfc3339())
        .bind(source_id)
        .execute(pool)
        .await?;
    Ok(())
}

fn row_to_team(row: SqliteRow) -> Team {
    Team {
        id: row.get("id"),
        name: row.get("name"),
        abbreviation: row.get("abbreviation"),
        sport: row.get("sport"),
    }
}

pub async fn get_team_by_alias(
    pool: &SqlitePool,
    alias: &str,
    sport: &str,
) -> Result<Option<Team>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT t.* FROM teams t
        JOIN team_aliases a ON a.team_id = t.id
        WHERE LOWER(a.alias) = LOWER(?) AND t.sport = ?
        LIMIT 1
        "#,
    )
    .bind(alias)
    .bind(sport)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_team))
}

pub async fn get_team_by_abbreviation(
    pool: &SqlitePool,
    abbreviation: &str,
    sport: &str,
) -> Result<Option<Team>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM teams WHERE LOWER(abbreviation) = LOWER(?) AND sport = ?")
        .bind(abbreviation)
        .bind(sport)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_team))
}

pub async fn get_aliases_for_sport(
    pool: &SqlitePool,
    sport: &str,
) -> Result<Vec<TeamAlias>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT a.team_id as team_id, a.alias as alias
        FROM team_aliases a
        JOIN teams t ON t.id = a.team_id
        WHERE t.sport = ?
        "#,
    )
    .bind(sport)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| TeamAlias {
            team_id: row.get("team_id"),
            alias: row.get("alias"),
        })
        .collect())
}

/// Insert-or-fetch a team keyed by `(abbreviation, sport)`, with a seed
/// alias, in one idempotent round trip. Safe under concurrent callers.
pub async fn create_team_with_alias(
    pool: &SqlitePool,
    name: &str,
    abbreviation: &str,
    sport: &str,
    seed_alias: &str,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO teams (id, name, abbreviation, sport)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(abbreviation, sport) DO UPDATE SET name = name
        "#,
    )
    .bind(&id)
    .bind(name)
    .bind(abbreviation)
    .bind(sport)
    .execute(pool)
    .await?;

    let team_id: String =
        sqlx::query_scalar("SELECT id FROM teams WHERE abbreviation = ? AND sport = ?")
            .bind(abbreviation)
            .bind(sport)
            .fetch_one(pool)
            .await?;

    sqlx::query(
        "INSERT INTO team_aliases (team_id, alias) VALUES (?, ?) ON CONFLICT(alias, team_id) DO NOTHING",
    )
    .bind(&team_id)
    .bind(seed_alias.to_lowercase())
    .execute(pool)
    .await?;

    Ok(team_id)
}

pub async fn get_teams_by_sport(pool: &SqlitePool, sport: &str) -> Result<Vec<Team>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM teams WHERE sport = ?")
        .bind(sport)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(row_to_team).collect())
}

/// Folds `loser` into `winner`: repoints aliases, matches, and predictions,
/// then drops the now-orphaned team row. Used by the operator-run
/// alias-merge job, never by the automatic pipeline.
pub async fn merge_teams(pool: &SqlitePool, winner_id: &str, loser_id: &str) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE OR IGNORE team_aliases SET team_id = ? WHERE team_id = ?")
        .bind(winner_id)
        .bind(loser_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM team_aliases WHERE team_id = ?")
        .bind(loser_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE matches SET home_team_id = ? WHERE home_team_id = ?")
        .bind(winner_id)
        .bind(loser_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE matches SET away_team_id = ? WHERE away_team_id = ?")
        .bind(winner_id)
        .bind(loser_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE predictions SET home_team_id = ? WHERE home_team_id = ?")
        .bind(winner_id)
        .bind(loser_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE predictions SET away_team_id = ? WHERE away_team_id = ?")
        .bind(winner_id)
        .bind(loser_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM teams WHERE id = ?")
        .bind(loser_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn add_alias(pool: &SqlitePool, team_id: &str, alias: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO team_aliases (team_id, alias) VALUES (?, ?) ON CONFLICT(alias, team_id) DO NOTHING",
    )
    .bind(team_id)
    .bind(alias.to_lowercase())
    .execute(pool)
    .await?;
    Ok(())
}

fn row_to_match(row: SqliteRow) -> Match {
    Match {
        id: row.get("id"),
        sport: row.get("sport"),
        home_team_id: row.get("home_team_id"),
        away_team_id: row.get("away_team_id"),
        game_date: row.get("game_date"),
        game_time: row.get("game_time"),
        created_at: row.get("created_at"),
    }
}

/// Idempotent upsert on the `(sport, home_team_id, away_team_id, game_date)`
/// natural key (§4.E step 2).
pub async fn find_or_create_match(
    pool: &SqlitePool,
    sport: &str,
    home_team_id: &str,
    away_team_id: &str,
    game_date: NaiveDate,
    game_time: Option<&str>,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO matches (id, sport, home_team_id, away_team_id, game_date, game_time, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(sport, home_team_id, away_team_id, game_date)
        DO UPDATE SET game_time = COALESCE(excluded.game_time, matches.game_time)
        "#,
    )
    .bind(&id)
    .bind(sport)
    .bind(home_team_id)
    .bind(away_team_id)
    .bind(game_date.to_string())
    .bind(game_time)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    let match_id: String = sqlx::query_scalar(
        "SELECT id FROM matches WHERE sport = ? AND home_team_id = ? AND away_team_id = ? AND game_date = ?",
    )
    .bind(sport)
    .bind(home_team_id)
    .bind(away_team_id)
    .bind(game_date.to_string())
    .fetch_one(pool)
    .await?;

    Ok(match_id)
}

pub async fn get_match(pool: &SqlitePool, match_id: &str) -> Result<Option<Match>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM matches WHERE id = ?")
        .bind(match_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_match))
}

pub async fn get_matches(
    pool: &SqlitePool,
    sport: Option<&str>,
    date: Option<NaiveDate>,
) -> Result<Vec<Match>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM matches
        WHERE (? IS NULL OR sport = ?)
          AND (? IS NULL OR game_date = ?)
        ORDER BY game_date ASC
        "#,
    )
    .bind(sport)
    .bind(sport)
    .bind(date.map(|d| d.to_string()))
    .bind(date.map(|d| d.to_string()))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(row_to_match).collect())
}

fn row_to_prediction(row: SqliteRow) -> Prediction {
    Prediction {
        id: row.get("id"),
        source_id: row.get("source_id"),
        match_id: row.get("match_id"),
        sport: row.get("sport"),
        home_team_id: row.get("home_team_id"),
        away_team_id: row.get("away_team_id"),
        pick_type: row.get("pick_type"),
        side: row.get("side"),
        value: row.get("value"),
        picker_name: row.get("picker_name"),
        confidence: row.get("confidence"),
        reasoning: row.get("reasoning"),
        dedup_key: row.get("dedup_key"),
        fetched_at: row.get("fetched_at"),
        grade: row.get("grade"),
        graded_at: row.get("graded_at"),
    }
}

/// Conflict-do-nothing insert on `dedup_key`. Returns `true` if a new row
/// was actually inserted, `false` for an expected duplicate (§4.E step 4,
/// §7 `DB-unique-conflict`).
#[allow(clippy::too_many_arguments)]
pub async fn insert_prediction(
    pool: &SqlitePool,
    source_id: &str,
    match_id: &str,
    sport: &str,
    home_team_id: &str,
    away_team_id: &str,
    pick_type: &str,
    side: &str,
    value: Option<f64>,
    picker_name: &str,
    confidence: Option<&str>,
    reasoning: Option<&str>,
    dedup_key: &str,
    fetched_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let result = sqlx::query(
        r#"
        INSERT INTO predictions
            (id, source_id, match_id, sport, home_team_id, away_team_id, pick_type, side,
             value, picker_name, confidence, reasoning, dedup_key, fetched_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(dedup_key) DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(source_id)
    .bind(match_id)
    .bind(sport)
    .bind(home_team_id)
    .bind(away_team_id)
    .bind(pick_type)
    .bind(side)
    .bind(value)
    .bind(picker_name)
    .bind(confidence)
    .bind(reasoning)
    .bind(dedup_key)
    .bind(fetched_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_predictions_for_match(
    pool: &SqlitePool,
    match_id: &str,
) -> Result<Vec<Prediction>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM predictions WHERE match_id = ?")
        .bind(match_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(row_to_prediction).collect())
}

pub async fn get_predictions(
    pool: &SqlitePool,
    sport: Option<&str>,
    date: Option<NaiveDate>,
    source_id: Option<&str>,
) -> Result<Vec<Prediction>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT p.* FROM predictions p
        JOIN matches m ON m.id = p.match_id
        WHERE (? IS NULL OR p.sport = ?)
          AND (? IS NULL OR m.game_date = ?)
          AND (? IS NULL OR p.source_id = ?)
        ORDER BY p.fetched_at DESC
        "#,
    )
    .bind(sport)
    .bind(sport)
    .bind(date.map(|d| d.to_string()))
    .bind(date.map(|d| d.to_string()))
    .bind(source_id)
    .bind(source_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(row_to_prediction).collect())
}

/// Predictions for `matchId` with no grade yet (§4.F, §4.I). Already-graded
/// rows are excluded, which is what makes the grader re-runnable as a no-op.
pub async fn get_ungraded_predictions(
    pool: &SqlitePool,
    match_id: &str,
) -> Result<Vec<Prediction>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM predictions WHERE match_id = ? AND grade IS NULL")
        .bind(match_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(row_to_prediction).collect())
}

pub async fn update_prediction_grade(
    pool: &SqlitePool,
    prediction_id: &str,
    grade: &str,
    graded_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE predictions SET grade = ?, graded_at = ? WHERE id = ?")
        .bind(grade)
        .bind(graded_at.to_rfc3339())
        .bind(prediction_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_match_result(
    pool: &SqlitePool,
    match_id: &str,
    home_score: i32,
    away_score: i32,
    status: &str,
    result_source: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO match_results (match_id, home_score, away_score, status, result_source, settled_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(match_id) DO UPDATE SET
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            status = excluded.status,
            settled_at = excluded.settled_at
        "#,
    )
    .bind(match_id)
    .bind(home_score)
    .bind(away_score)
    .bind(status)
    .bind(result_source)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_match_result(
    pool: &SqlitePool,
    match_id: &str,
) -> Result<Option<MatchResult>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM match_results WHERE match_id = ?")
        .bind(match_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| MatchResult {
        match_id: row.get("match_id"),
        home_score: row.get("home_score"),
        away_score: row.get("away_score"),
        status: row.get("status"),
        result_source: row.get("result_source"),
        settled_at: row.get("settled_at"),
    }))
}

/// Average historical win-rate of `sourceId` on `favSide`'s pick type for
/// `sport`, requiring at least `min_decided` decided picks (§4.J source
/// accuracy factor).
pub async fn get_source_accuracy(
    pool: &SqlitePool,
    source_id: &str,
    sport: Option<&str>,
    min_decided: i64,
) -> Result<Option<AccuracyStat>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE grade IN ('win', 'loss')) as decided,
            COUNT(*) FILTER (WHERE grade = 'win') as won
        FROM predictions
        WHERE source_id = ? AND (? IS NULL OR sport = ?)
        "#,
    )
    .bind(source_id)
    .bind(sport)
    .bind(sport)
    .fetch_one(pool)
    .await?;

    let decided: i64 = row.get("decided");
    let won: i64 = row.get("won");
    if decided < min_decided {
        return Ok(None);
    }
    Ok(Some(AccuracyStat {
        source_id: source_id.to_string(),
        sport: sport.unwrap_or("*").to_string(),
        decided,
        won,
        win_rate: won as f64 / decided as f64,
    }))
}

pub async fn get_accuracy_stats(
    pool: &SqlitePool,
    sport: Option<&str>,
    pick_type: Option<&str>,
) -> Result<(i64, i64, i64, i64), sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE grade = 'win') as wins,
            COUNT(*) FILTER (WHERE grade = 'loss') as losses,
            COUNT(*) FILTER (WHERE grade = 'push') as pushes,
            COUNT(*) FILTER (WHERE grade = 'void') as voids
        FROM predictions
        WHERE (? IS NULL OR sport = ?) AND (? IS NULL OR pick_type = ?)
        "#,
    )
    .bind(sport)
    .bind(sport)
    .bind(pick_type)
    .bind(pick_type)
    .fetch_one(pool)
    .await?;
    Ok((
        row.get("wins"),
        row.get("losses"),
        row.get("pushes"),
        row.get("voids"),
    ))
}

pub async fn get_accuracy_history(
    pool: &SqlitePool,
    days: i64,
) -> Result<Vec<(String, i64, i64, i64, i64)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT
            date(graded_at) as day,
            COUNT(*) FILTER (WHERE grade = 'win') as wins,
            COUNT(*) FILTER (WHERE grade = 'loss') as losses,
            COUNT(*) FILTER (WHERE grade = 'push') as pushes,
            COUNT(*) FILTER (WHERE grade = 'void') as voids
        FROM predictions
        WHERE graded_at IS NOT NULL AND date(graded_at) >= date('now', ? || ' days')
        GROUP BY day
        ORDER BY day DESC
        "#,
    )
    .bind(format!("-{days}"))
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            (
                row.get("day"),
                row.get("wins"),
                row.get("losses"),
                row.get("pushes"),
                row.get("voids"),
            )
        })
        .collect())
}

/// Last `limit` decided results for a team, most recent first — used by
/// the Form factor (§4.J).
pub async fn get_team_form(
    pool: &SqlitePool,
    team_id: &str,
    limit: i64,
) -> Result<Vec<bool>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT
            m.home_team_id as home_team_id,
            r.home_score as home_score,
            r.away_score as away_score
        FROM match_results r
        JOIN matches m ON m.id = r.match_id
        WHERE (m.home_team_id = ? OR m.away_team_id = ?) AND r.status = 'final'
        ORDER BY m.game_date DESC
        LIMIT ?
        "#,
    )
    .bind(team_id)
    .bind(team_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let home_team_id: String = row.get("home_team_id");
            let home_score: i32 = row.get("home_score");
            let away_score: i32 = row.get("away_score");
            let is_home = home_team_id == team_id;
            if is_home {
                home_score > away_score
            } else {
                away_score > home_score
            }
        })
        .collect())
}

/// Up to `limit` historical meetings between the two teams regardless of
/// venue, most recent first — used by the Head-to-head factor (§4.J).
pub async fn get_h2h_results(
    pool: &SqlitePool,
    team_a: &str,
    team_b: &str,
    limit: i64,
) -> Result<Vec<(String, i32, i32)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT m.home_team_id as home_team_id, r.home_score as home_score, r.away_score as away_score
        FROM match_results r
        JOIN matches m ON m.id = r.match_id
        WHERE r.status = 'final'
          AND ((m.home_team_id = ? AND m.away_team_id = ?) OR (m.home_team_id = ? AND m.away_team_id = ?))
        ORDER BY m.game_date DESC
        LIMIT ?
        "#,
    )
    .bind(team_a)
    .bind(team_b)
    .bind(team_b)
    .bind(team_a)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("home_team_id"), row.get("home_score"), row.get("away_score")))
        .collect())
}

async fn venue_split(
    pool: &SqlitePool,
    team_id: &str,
    as_home: bool,
) -> Result<(i64, i64), sqlx::Error> {
    let (col, cmp) = if as_home {
        ("m.home_team_id", "r.home_score > r.away_score")
    } else {
        ("m.away_team_id", "r.away_score > r.home_score")
    };
    let query = format!(
        r#"
        SELECT
            COUNT(*) as games,
            COUNT(*) FILTER (WHERE {cmp}) as wins
        FROM match_results r
        JOIN matches m ON m.id = r.match_id
        WHERE {col} = ? AND r.status = 'final'
        "#
    );
    let row = sqlx::query(&query).bind(team_id).fetch_one(pool).await?;
    Ok((row.get("games"), row.get("wins")))
}

/// `(games, wins)` with the team playing at home — Home advantage factor.
pub async fn get_home_split(pool: &SqlitePool, team_id: &str) -> Result<(i64, i64), sqlx::Error> {
    venue_split(pool, team_id, true).await
}

/// `(games, wins)` with the team playing away — Home advantage factor.
pub async fn get_away_split(pool: &SqlitePool, team_id: &str) -> Result<(i64, i64), sqlx::Error> {
    venue_split(pool, team_id, false).await
}

// ---- durable job queue (§3.1, §4.G, §4.H) ----

pub async fn enqueue_job(
    pool: &SqlitePool,
    kind: JobKind,
    adapter_id: &str,
    sport: &str,
    path: &str,
    url: &str,
    is_sub_url: bool,
    payload: Option<&str>,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO jobs (id, kind, adapter_id, sport, path, url, is_sub_url, attempt, next_fire_at, payload, claimed, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, 0, ?)
        "#,
    )
    .bind(&id)
    .bind(kind.as_str())
    .bind(adapter_id)
    .bind(sport)
    .bind(path)
    .bind(url)
    .bind(is_sub_url)
    .bind(Utc::now().to_rfc3339())
    .bind(payload)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn reschedule_job(
    pool: &SqlitePool,
    job_id: &str,
    next_fire_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE jobs SET attempt = attempt + 1, next_fire_at = ?, claimed = 0 WHERE id = ?")
        .bind(next_fire_at.to_rfc3339())
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_job(pool: &SqlitePool, job_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM jobs WHERE id = ?")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

fn row_to_job(row: SqliteRow) -> Job {
    Job {
        id: row.get("id"),
        kind: row.get("kind"),
        adapter_id: row.get("adapter_id"),
        sport: row.get("sport"),
        path: row.get("path"),
        url: row.get("url"),
        is_sub_url: row.get("is_sub_url"),
        attempt: row.get("attempt"),
        next_fire_at: row.get("next_fire_at"),
        payload: row.get("payload"),
        claimed: row.get("claimed"),
        created_at: row.get("created_at"),
    }
}

/// Atomically claims up to `limit` due, unclaimed jobs of `kind` so that two
/// concurrent workers never dispatch the same row twice.
pub async fn claim_jobs(
    pool: &SqlitePool,
    kind: JobKind,
    limit: i64,
) -> Result<Vec<Job>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM jobs
        WHERE kind = ? AND claimed = 0 AND next_fire_at <= ?
        ORDER BY next_fire_at ASC
        LIMIT ?
        "#,
    )
    .bind(kind.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    if ids.is_empty() {
        tx.commit().await?;
        return Ok(vec![]);
    }

    for id in &ids {
        sqlx::query("UPDATE jobs SET claimed = 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let query = format!("SELECT * FROM jobs WHERE id IN ({placeholders})");
    let mut q = sqlx::query(&query);
    for id in &ids {
        q = q.bind(id);
    }
    let rows = q.fetch_all(pool).await?;
    Ok(rows.into_iter().map(row_to_job).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        let pool = create_pool("sqlite::memory:", 1).await.unwrap();
        init_database(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn find_or_create_match_is_idempotent() {
        let pool = memory_pool().await;
        let home = create_team_with_alias(&pool, "Lakers", "LAL", "nba", "lakers")
            .await
            .unwrap();
        let away = create_team_with_alias(&pool, "Celtics", "BOS", "nba", "celtics")
            .await
            .unwrap();
        let date = NaiveDate::from_str("2026-02-16").unwrap();

        let id1 = find_or_create_match(&pool, "nba", &home, &away, date, None)
            .await
            .unwrap();
        let id2 = find_or_create_match(&pool, "nba", &home, &away, date, Some("19:30"))
            .await
            .unwrap();
        assert_eq!(id1, id2);

        let m = get_match(&pool, &id1).await.unwrap().unwrap();
        assert_eq!(m.game_time.as_deref(), Some("19:30"));
    }

    #[tokio::test]
    async fn insert_prediction_deduplicates_on_conflict() {
        let pool = memory_pool().await;
        let home = create_team_with_alias(&pool, "Lakers", "LAL", "nba", "lakers")
            .await
            .unwrap();
        let away = create_team_with_alias(&pool, "Celtics", "BOS", "nba", "celtics")
            .await
            .unwrap();
        let date = NaiveDate::from_str("2026-02-16").unwrap();
        let match_id = find_or_create_match(&pool, "nba", &home, &away, date, None)
            .await
            .unwrap();
        let source_id = upsert_source(&pool, "demo", "Demo", "https://demo", "http")
            .await
            .unwrap();

        let first = insert_prediction(
            &pool, &source_id, &match_id, "nba", &home, &away, "moneyline", "home", None,
            "Demo Picker", Some("high"), None, "fixed-key", Utc::now(),
        )
        .await
        .unwrap();
        let second = insert_prediction(
            &pool, &source_id, &match_id, "nba", &home, &away, "moneyline", "home", None,
            "Demo Picker", Some("high"), None, "fixed-key", Utc::now(),
        )
        .await
        .unwrap();

        assert!(first);
        assert!(!second);
        let preds = get_predictions_for_match(&pool, &match_id).await.unwrap();
        assert_eq!(preds.len(), 1);
    }

    #[tokio::test]
    async fn claim_jobs_marks_rows_claimed() {
        let pool = memory_pool().await;
        enqueue_job(&pool, JobKind::Fetch, "demo", "nba", "/picks", "https://demo/picks", false, None)
            .await
            .unwrap();

        let first = claim_jobs(&pool, JobKind::Fetch, 10).await.unwrap();
        let second = claim_jobs(&pool, JobKind::Fetch, 10).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 0);
    }
}
