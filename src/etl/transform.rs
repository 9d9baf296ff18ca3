//! Staging-to-star transforms
//!
//! Every statement reads only from the staging tables, so their order does
//! not matter beyond running after both staging loads.

use serde::{Deserialize, Serialize};

use crate::statement::{Phase, Statement};
use crate::warehouse::schema::{ARTISTS, SONGPLAYS, SONGS, STAGING_EVENTS, STAGING_SONGS, TIME, USERS};
use crate::warehouse::Dialect;

/// How the time dimension's `weekday` column is computed.
///
/// The warehouse historically filled `weekday` with the week-of-year number;
/// downstream consumers may rely on it, so that stays the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekdayRule {
    /// `weekday` = ISO week of year, same as `week`
    #[default]
    WeekNumber,
    /// `weekday` = day of week, Sunday = 0
    DayOfWeek,
}

impl WeekdayRule {
    fn date_part(&self) -> &'static str {
        match self {
            WeekdayRule::WeekNumber => "week",
            WeekdayRule::DayOfWeek => "dow",
        }
    }
}

/// Epoch milliseconds in `ts` as an absolute timestamp, keeping the
/// millisecond fraction.
fn start_time(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Redshift => "TIMESTAMP 'epoch' + (se.ts / 1000.0) * INTERVAL '1 second'",
        Dialect::Sqlite => "strftime('%Y-%m-%d %H:%M:%f', se.ts / 1000.0, 'unixepoch')",
    }
}

fn extract(dialect: Dialect, part: &str, column: &str) -> String {
    match dialect {
        Dialect::Redshift => format!("EXTRACT({} FROM {})", part, column),
        Dialect::Sqlite => format!("date_part('{}', {})", part, column),
    }
}

fn songplay_insert(dialect: Dialect) -> String {
    format!(
        "INSERT INTO {SONGPLAYS} (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT DISTINCT {start} AS start_time,
       se.userId       AS user_id,
       se.level        AS level,
       ss.song_id      AS song_id,
       ss.artist_id    AS artist_id,
       se.sessionId    AS session_id,
       se.location     AS location,
       se.userAgent    AS user_agent
FROM {STAGING_EVENTS} AS se
JOIN {STAGING_SONGS} AS ss
    ON (se.artist = ss.artist_name)
WHERE se.page = 'NextSong';",
        start = start_time(dialect),
    )
}

fn user_insert() -> String {
    format!(
        "INSERT INTO {USERS} (user_id, first_name, last_name, gender, level)
SELECT DISTINCT se.userId    AS user_id,
       se.firstName AS first_name,
       se.lastName  AS last_name,
       se.gender    AS gender,
       se.level     AS level
FROM {STAGING_EVENTS} AS se
WHERE se.page = 'NextSong';"
    )
}

fn song_insert() -> String {
    format!(
        "INSERT INTO {SONGS} (song_id, title, artist_id, year, duration)
SELECT DISTINCT ss.song_id   AS song_id,
       ss.title     AS title,
       ss.artist_id AS artist_id,
       ss.year      AS year,
       ss.duration  AS duration
FROM {STAGING_SONGS} AS ss;"
    )
}

fn artist_insert() -> String {
    format!(
        "INSERT INTO {ARTISTS} (artist_id, name, location, latitude, longitude)
SELECT DISTINCT ss.artist_id        AS artist_id,
       ss.artist_name      AS name,
       ss.artist_location  AS location,
       ss.artist_latitude  AS latitude,
       ss.artist_longitude AS longitude
FROM {STAGING_SONGS} AS ss;"
    )
}

fn time_insert(dialect: Dialect, weekday: WeekdayRule) -> String {
    let part = |name: &str| extract(dialect, name, "t.start_time");
    format!(
        "INSERT INTO {TIME} (start_time, hour, day, week, month, year, weekday)
SELECT DISTINCT t.start_time,
       {hour} AS hour,
       {day} AS day,
       {week} AS week,
       {month} AS month,
       {year} AS year,
       {weekday} AS weekday
FROM (
    SELECT {start} AS start_time
    FROM {STAGING_EVENTS} AS se
    WHERE se.page = 'NextSong'
) AS t;",
        hour = part("hour"),
        day = part("day"),
        week = part("week"),
        month = part("month"),
        year = part("year"),
        weekday = part(weekday.date_part()),
        start = start_time(dialect),
    )
}

/// Insert-via-select statements: songplays, users, songs, artists, time.
pub fn insert_statements(dialect: Dialect, weekday: WeekdayRule) -> Vec<Statement> {
    vec![
        Statement::new(Phase::Insert, SONGPLAYS, songplay_insert(dialect)),
        Statement::new(Phase::Insert, USERS, user_insert()),
        Statement::new(Phase::Insert, SONGS, song_insert()),
        Statement::new(Phase::Insert, ARTISTS, artist_insert()),
        Statement::new(Phase::Insert, TIME, time_insert(dialect, weekday)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_order() {
        let labels: Vec<String> = insert_statements(Dialect::Redshift, WeekdayRule::default())
            .into_iter()
            .map(|s| s.label)
            .collect();
        assert_eq!(labels, vec![SONGPLAYS, USERS, SONGS, ARTISTS, TIME]);
    }

    #[test]
    fn test_event_driven_tables_filter_next_song() {
        let statements = insert_statements(Dialect::Redshift, WeekdayRule::default());
        for statement in statements.iter().filter(|s| [SONGPLAYS, USERS, TIME].contains(&s.label.as_str())) {
            assert!(statement.sql.contains("WHERE se.page = 'NextSong'"), "{}", statement.label);
        }
        for statement in statements.iter().filter(|s| [SONGS, ARTISTS].contains(&s.label.as_str())) {
            assert!(!statement.sql.contains(STAGING_EVENTS), "{}", statement.label);
        }
    }

    #[test]
    fn test_redshift_time_reproduces_week_as_weekday() {
        let sql = time_insert(Dialect::Redshift, WeekdayRule::WeekNumber);
        assert!(sql.contains("EXTRACT(week FROM t.start_time) AS week"));
        assert!(sql.contains("EXTRACT(week FROM t.start_time) AS weekday"));
        assert!(sql.contains("TIMESTAMP 'epoch' + (se.ts / 1000.0) * INTERVAL '1 second' AS start_time"));
    }

    #[test]
    fn test_day_of_week_rule() {
        let sql = time_insert(Dialect::Redshift, WeekdayRule::DayOfWeek);
        assert!(sql.contains("EXTRACT(dow FROM t.start_time) AS weekday"));

        let sql = time_insert(Dialect::Sqlite, WeekdayRule::DayOfWeek);
        assert!(sql.contains("date_part('dow', t.start_time) AS weekday"));
    }

    #[test]
    fn test_songplay_join_is_exact_artist_match() {
        let sql = songplay_insert(Dialect::Sqlite);
        assert!(sql.contains("ON (se.artist = ss.artist_name)"));
        assert!(sql.contains("strftime('%Y-%m-%d %H:%M:%f', se.ts / 1000.0, 'unixepoch') AS start_time"));
    }

    #[test]
    fn test_weekday_rule_names() {
        let rule: WeekdayRule = serde_yaml::from_str("day_of_week").unwrap();
        assert_eq!(rule, WeekdayRule::DayOfWeek);
        let rule: WeekdayRule = serde_yaml::from_str("week_number").unwrap();
        assert_eq!(rule, WeekdayRule::WeekNumber);
    }
}
