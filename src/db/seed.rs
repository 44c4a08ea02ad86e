use anyhow::Result;
use sqlx::SqlitePool;

use crate::db;

/// Curated NBA roster, seeded once. Football clubs are deliberately not
/// seeded here — that sport is unbounded (§4.D) and teams are
/// auto-created by the Team Resolver on first sighting.
const NBA_TEAMS: &[(&str, &str)] = &[
    ("Los Angeles Lakers", "LAL"),
    ("Boston Celtics", "BOS"),
    ("Golden State Warriors", "GSW"),
    ("Miami Heat", "MIA"),
    ("Denver Nuggets", "DEN"),
    ("Milwaukee Bucks", "MIL"),
    ("Phoenix Suns", "PHX"),
    ("Dallas Mavericks", "DAL"),
];

const NFL_TEAMS: &[(&str, &str)] = &[
    ("Kansas City Chiefs", "KC"),
    ("San Francisco 49ers", "SF"),
    ("Philadelphia Eagles", "PHI"),
    ("Buffalo Bills", "BUF"),
    ("Dallas Cowboys", "DAL"),
    ("Baltimore Ravens", "BAL"),
];

const MLB_TEAMS: &[(&str, &str)] = &[
    ("New York Yankees", "NYY"),
    ("Los Angeles Dodgers", "LAD"),
    ("Atlanta Braves", "ATL"),
    ("Houston Astros", "HOU"),
];

const NHL_TEAMS: &[(&str, &str)] = &[
    ("Boston Bruins", "BOS"),
    ("Colorado Avalanche", "COL"),
    ("Edmonton Oilers", "EDM"),
    ("Vegas Golden Knights", "VGK"),
];

const SOURCES: &[(&str, &str, &str, &str)] = &[
    ("covers-consensus", "Covers Consensus", "https://www.covers.com", "http"),
    ("action-network", "Action Network", "https://www.actionnetwork.com", "browser"),
    ("vsin", "VSiN", "https://www.vsin.com", "http"),
    ("oddsshark", "OddsShark", "https://www.oddsshark.com", "http"),
];

async fn seed_roster(pool: &SqlitePool, sport: &str, roster: &[(&str, &str)]) -> Result<()> {
    for (name, abbr) in roster {
        db::create_team_with_alias(pool, name, abbr, sport, name).await?;
        db::create_team_with_alias(pool, name, abbr, sport, abbr).await?;
    }
    Ok(())
}

/// Seed curated rosters and demo sources. Idempotent: re-running is a
/// no-op thanks to the `(abbreviation, sport)` / `slug` conflict clauses.
pub async fn seed_data(pool: &SqlitePool) -> Result<()> {
    seed_roster(pool, "nba", NBA_TEAMS).await?;
    seed_roster(pool, "nfl", NFL_TEAMS).await?;
    seed_roster(pool, "mlb", MLB_TEAMS).await?;
    seed_roster(pool, "nhl", NHL_TEAMS).await?;

    for (slug, name, base_url, fetch_method) in SOURCES {
        db::upsert_source(pool, slug, name, base_url, fetch_method).await?;
    }

    tracing::info!("seeded curated rosters and demo sources");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seed_is_idempotent() {
        let pool = db::create_pool("sqlite::memory:", 1).await.unwrap();
        db::init_database(&pool).await.unwrap();
        seed_data(&pool).await.unwrap();
        seed_data(&pool).await.unwrap();

        let team = db::get_team_by_abbreviation(&pool, "LAL", "nba")
            .await
            .unwrap();
        assert!(team.is_some());
    }
}
