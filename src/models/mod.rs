use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A free-text league/sport token (`"nba"`, `"nfl"`, `"football"`, ...).
///
/// Deliberately not a closed enum: new sports are added by seeding sources
/// and teams, not by a code change. `TeamSpace` classifies a sport for the
/// Team Resolver's policy on auto-creating unmatched teams.
pub type Sport = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamSpace {
    /// Leagues with a fixed, small roster of franchises (NBA/NFL/MLB/NHL).
    Curated,
    /// Leagues with effectively unbounded team identities (football clubs).
    Unbounded,
}

pub fn team_space(sport: &str) -> TeamSpace {
    match sport.to_lowercase().as_str() {
        "nba" | "nfl" | "mlb" | "nhl" => TeamSpace::Curated,
        _ => TeamSpace::Unbounded,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMethod {
    Http,
    Browser,
}

impl FetchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMethod::Http => "http",
            FetchMethod::Browser => "browser",
        }
    }
}

impl std::str::FromStr for FetchMethod {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(FetchMethod::Http),
            "browser" => Ok(FetchMethod::Browser),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickType {
    Moneyline,
    Spread,
    OverUnder,
    Prop,
    Parlay,
}

impl PickType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickType::Moneyline => "moneyline",
            PickType::Spread => "spread",
            PickType::OverUnder => "over_under",
            PickType::Prop => "prop",
            PickType::Parlay => "parlay",
        }
    }
}

impl std::str::FromStr for PickType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "moneyline" => Ok(PickType::Moneyline),
            "spread" => Ok(PickType::Spread),
            "over_under" => Ok(PickType::OverUnder),
            "prop" => Ok(PickType::Prop),
            "parlay" => Ok(PickType::Parlay),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
    Draw,
    Over,
    Under,
    Yes,
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
            Side::Draw => "draw",
            Side::Over => "over",
            Side::Under => "under",
            Side::Yes => "yes",
            Side::No => "no",
        }
    }
}

impl std::str::FromStr for Side {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(Side::Home),
            "away" => Ok(Side::Away),
            "draw" => Ok(Side::Draw),
            "over" => Ok(Side::Over),
            "under" => Ok(Side::Under),
            "yes" => Ok(Side::Yes),
            "no" => Ok(Side::No),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
    BestBet,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
            Confidence::BestBet => "best_bet",
        }
    }

    /// Point value used by the scoring engine's Confidence factor (§4.J).
    pub fn points(&self) -> f64 {
        match self {
            Confidence::BestBet => 30.0,
            Confidence::High => 22.0,
            Confidence::Medium => 12.0,
            Confidence::Low => 4.0,
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best_bet" => Ok(Confidence::BestBet),
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Final,
    Postponed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Final => "final",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for MatchStatus {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(MatchStatus::Scheduled),
            "final" => Ok(MatchStatus::Final),
            "postponed" => Ok(MatchStatus::Postponed),
            "cancelled" => Ok(MatchStatus::Cancelled),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Win,
    Loss,
    Push,
    Void,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Win => "win",
            Grade::Loss => "loss",
            Grade::Push => "push",
            Grade::Void => "void",
        }
    }
}

impl std::str::FromStr for Grade {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(Grade::Win),
            "loss" => Ok(Grade::Loss),
            "push" => Ok(Grade::Push),
            "void" => Ok(Grade::Void),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Source {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub base_url: String,
    pub fetch_method: String,
    pub is_active: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
    pub sport: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct TeamAlias {
    pub team_id: String,
    pub alias: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Match {
    pub id: String,
    pub sport: String,
    pub home_team_id: String,
    pub away_team_id: String,
    pub game_date: NaiveDate,
    pub game_time: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Adapter output, transient — never persisted as-is.
#[derive(Debug, Clone)]
pub struct RawPrediction {
    pub source_id: String,
    pub sport: Sport,
    pub home_team_raw: String,
    pub away_team_raw: String,
    pub game_date: NaiveDate,
    pub game_time: Option<String>,
    pub pick_type: PickType,
    pub side: Side,
    pub value: Option<f64>,
    pub picker_name: String,
    pub confidence: Option<Confidence>,
    pub reasoning: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Prediction {
    pub id: String,
    pub source_id: String,
    pub match_id: String,
    pub sport: String,
    pub home_team_id: String,
    pub away_team_id: String,
    pub pick_type: String,
    pub side: String,
    pub value: Option<f64>,
    pub picker_name: String,
    pub confidence: Option<String>,
    pub reasoning: Option<String>,
    pub dedup_key: String,
    pub fetched_at: DateTime<Utc>,
    pub grade: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MatchResult {
    pub match_id: String,
    pub home_score: i32,
    pub away_score: i32,
    pub status: String,
    pub result_source: String,
    pub settled_at: DateTime<Utc>,
}

/// A pure, unresolved scoreboard result as returned by a `ResultSource`
/// collaborator, before team names are mapped to internal ids.
#[derive(Debug, Clone)]
pub struct RawResult {
    pub home_team_raw: String,
    pub away_team_raw: String,
    pub game_date: NaiveDate,
    pub home_score: i32,
    pub away_score: i32,
    pub status: MatchStatus,
    pub result_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub source_id: String,
    pub sport: Sport,
    pub url: String,
    pub fetch_method: FetchMethod,
    pub http_status: Option<u16>,
    pub duration_ms: u64,
    pub size_bytes: u64,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Fetch,
    Parse,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Fetch => "fetch",
            JobKind::Parse => "parse",
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetch" => Ok(JobKind::Fetch),
            "parse" => Ok(JobKind::Parse),
            _ => Err(()),
        }
    }
}

/// A durable queue row. Survives process restart because it lives in the
/// same database as the rest of persistence rather than an in-memory broker.
#[derive(Debug, Clone, FromRow)]
pub struct Job {
    pub id: String,
    pub kind: String,
    pub adapter_id: String,
    pub sport: String,
    pub path: String,
    pub url: String,
    pub is_sub_url: bool,
    pub attempt: i64,
    pub next_fire_at: DateTime<Utc>,
    pub payload: Option<String>,
    pub claimed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyStat {
    pub source_id: String,
    pub sport: Sport,
    pub decided: i64,
    pub won: i64,
    pub win_rate: f64,
}

// ---- API response envelope, reused by the thin HTTP layer (§6) ----

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_space_classifies_curated_leagues() {
        assert_eq!(team_space("nba"), TeamSpace::Curated);
        assert_eq!(team_space("NFL"), TeamSpace::Curated);
        assert_eq!(team_space("football"), TeamSpace::Unbounded);
        assert_eq!(team_space("rugby"), TeamSpace::Unbounded);
    }

    #[test]
    fn confidence_ordering_matches_glossary() {
        assert!(Confidence::BestBet > Confidence::High);
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
    }

    #[test]
    fn confidence_points_match_scoring_table() {
        assert_eq!(Confidence::BestBet.points(), 30.0);
        assert_eq!(Confidence::High.points(), 22.0);
        assert_eq!(Confidence::Medium.points(), 12.0);
        assert_eq!(Confidence::Low.points(), 4.0);
    }

    #[test]
    fn pick_type_round_trips_through_str() {
        for s in ["moneyline", "spread", "over_under", "prop", "parlay"] {
            let parsed: PickType = s.parse().unwrap();
            assert_eq!(parsed.as_str(), s);
        }
    }
}
