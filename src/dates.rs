//! Game-date parsing. Sources format dates three different ways —
//! `"Feb 16, 2026"`, `"16/02"` (day/month, no year), and ISO 8601 — and the
//! day/month form needs a sport-aware guess at which year it belongs to
//! since most leagues' seasons straddle a calendar year boundary.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Parses a raw date token as it appears on a source page. `fetched_at` is
/// used to infer the year for day/month-only tokens: a month earlier than
/// the fetch month rolls forward into next year (handles the NBA/NHL
/// season crossing December into January).
pub fn parse_game_date(raw: &str, sport: &str, fetched_at: DateTime<Utc>) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some(date) = raw.split('T').next().and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()) {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%b %d, %Y") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%B %d, %Y") {
        return Some(date);
    }
    if let Some(date) = parse_day_month(raw, sport, fetched_at) {
        return Some(date);
    }
    None
}

/// `"16/02"` (day/month, no year) — covers football schedules. Infers the
/// year from `fetched_at`, rolling forward a year when the parsed month
/// precedes the fetch month by more than a season-length gap (i.e. the
/// game is evidently in next year's slice of the season).
fn parse_day_month(raw: &str, _sport: &str, fetched_at: DateTime<Utc>) -> Option<NaiveDate> {
    let mut parts = raw.splitn(2, '/');
    let day: u32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let fetch_date = fetched_at.date_naive();
    let fetch_year = fetch_date.year();
    let fetch_month = fetch_date.month();

    let year = if month + 6 < fetch_month {
        fetch_year + 1
    } else if fetch_month + 6 < month {
        fetch_year - 1
    } else {
        fetch_year
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_iso8601() {
        let fetched = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(
            parse_game_date("2026-02-16", "nba", fetched),
            NaiveDate::from_ymd_opt(2026, 2, 16)
        );
        assert_eq!(
            parse_game_date("2026-02-16T19:00:00Z", "nba", fetched),
            NaiveDate::from_ymd_opt(2026, 2, 16)
        );
    }

    #[test]
    fn parses_month_name_form() {
        let fetched = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(
            parse_game_date("Feb 16, 2026", "nba", fetched),
            NaiveDate::from_ymd_opt(2026, 2, 16)
        );
    }

    #[test]
    fn infers_year_for_day_month_rolling_forward_into_next_season() {
        // Fetched in December; a January fixture belongs to next year.
        let fetched = Utc.with_ymd_and_hms(2025, 12, 20, 0, 0, 0).unwrap();
        assert_eq!(
            parse_game_date("10/01", "football", fetched),
            NaiveDate::from_ymd_opt(2026, 1, 10)
        );
    }

    #[test]
    fn infers_year_for_day_month_same_year() {
        let fetched = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            parse_game_date("15/03", "football", fetched),
            NaiveDate::from_ymd_opt(2026, 3, 15)
        );
    }

    #[test]
    fn rejects_garbage() {
        let fetched = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_game_date("not a date", "nba", fetched), None);
    }
}
