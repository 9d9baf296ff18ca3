//! Star schema definition
//!
//! Two staging tables receive the raw bulk loads; one fact table and four
//! dimensions are filled from them. Tables are described as data and
//! rendered per dialect: Redshift keeps the distribution and sort keys,
//! SQLite drops them and turns identity columns into rowid aliases.

use tracing::info;

use super::{Dialect, Session};
use crate::error::Result;
use crate::statement::{run_statements, Phase, Statement};

pub const STAGING_EVENTS: &str = "stagingevents_tab";
pub const STAGING_SONGS: &str = "stagingsongs_tab";
pub const SONGPLAYS: &str = "songplays_tab";
pub const USERS: &str = "users_tab";
pub const SONGS: &str = "songs_tab";
pub const ARTISTS: &str = "artists_tab";
pub const TIME: &str = "time_tab";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    SmallInt,
    Integer,
    BigInt,
    /// Unbounded when `None` (the engine default length)
    Varchar(Option<u16>),
    Decimal(u8, u8),
    Timestamp,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt | ColumnType::Decimal(..)
        )
    }

    fn sql(&self) -> String {
        match self {
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Varchar(None) => "VARCHAR".to_string(),
            ColumnType::Varchar(Some(len)) => format!("VARCHAR({})", len),
            ColumnType::Decimal(precision, scale) => format!("DECIMAL({},{})", precision, scale),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    /// Generated surrogate key, never loaded from a source
    pub identity: bool,
    pub sort_key: bool,
    pub dist_key: bool,
}

impl Column {
    fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
            identity: false,
            sort_key: false,
            dist_key: false,
        }
    }

    fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    fn identity(mut self) -> Self {
        self.identity = true;
        self.nullable = false;
        self
    }

    fn sort_key(mut self) -> Self {
        self.sort_key = true;
        self
    }

    fn dist_key(mut self) -> Self {
        self.dist_key = true;
        self
    }

    fn render(&self, dialect: Dialect) -> String {
        if self.identity && dialect == Dialect::Sqlite {
            return format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", self.name);
        }

        let mut sql = format!("{} {}", self.name, self.ty.sql());
        if self.identity {
            sql.push_str(" IDENTITY(0,1)");
        }
        sql.push_str(if self.nullable { " NULL" } else { " NOT NULL" });
        if dialect == Dialect::Redshift {
            if self.sort_key {
                sql.push_str(" SORTKEY");
            }
            if self.dist_key {
                sql.push_str(" DISTKEY");
            }
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Staging,
    Fact,
    Dimension,
}

/// How rows are spread across cluster nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistStyle {
    /// Engine default, or by the column flagged as dist key
    Auto,
    /// Full copy on every node, for small dimensions joined often
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub kind: TableKind,
    pub columns: Vec<Column>,
    pub dist_style: DistStyle,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns a bulk load fills, in declaration order
    pub fn loadable_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.identity)
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {};", self.name)
    }

    pub fn create_sql(&self, dialect: Dialect) -> String {
        let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", self.name);
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {}", c.render(dialect)))
            .collect();
        sql.push_str(&columns.join(",\n"));
        sql.push_str("\n)");
        if dialect == Dialect::Redshift && self.dist_style == DistStyle::All {
            sql.push_str(" DISTSTYLE ALL");
        }
        sql.push(';');
        sql
    }
}

// ============================================
// TABLES
// ============================================

/// Every warehouse table, staging first.
pub fn warehouse_tables() -> Vec<Table> {
    use ColumnType::*;

    vec![
        Table {
            name: STAGING_EVENTS,
            kind: TableKind::Staging,
            dist_style: DistStyle::Auto,
            columns: vec![
                Column::new("event_id", BigInt).identity(),
                Column::new("artist", Varchar(None)),
                Column::new("auth", Varchar(None)),
                Column::new("firstName", Varchar(None)),
                Column::new("gender", Varchar(None)),
                Column::new("itemInSession", Varchar(None)),
                Column::new("lastName", Varchar(None)),
                Column::new("length", Varchar(None)),
                Column::new("level", Varchar(None)),
                Column::new("location", Varchar(None)),
                Column::new("method", Varchar(None)),
                Column::new("page", Varchar(None)),
                Column::new("registration", Varchar(None)),
                Column::new("sessionId", Integer).not_null().sort_key().dist_key(),
                Column::new("song", Varchar(None)),
                Column::new("status", Integer),
                Column::new("ts", BigInt).not_null(),
                Column::new("userAgent", Varchar(None)),
                Column::new("userId", Integer),
            ],
        },
        Table {
            name: STAGING_SONGS,
            kind: TableKind::Staging,
            dist_style: DistStyle::Auto,
            columns: vec![
                Column::new("num_songs", Integer),
                Column::new("artist_id", Varchar(None)).not_null().sort_key().dist_key(),
                Column::new("artist_latitude", Varchar(None)),
                Column::new("artist_longitude", Varchar(None)),
                Column::new("artist_location", Varchar(Some(500))),
                Column::new("artist_name", Varchar(Some(500))),
                Column::new("song_id", Varchar(None)).not_null(),
                Column::new("title", Varchar(Some(500))),
                Column::new("duration", Decimal(10, 5)),
                Column::new("year", Integer),
            ],
        },
        Table {
            name: SONGPLAYS,
            kind: TableKind::Fact,
            dist_style: DistStyle::Auto,
            columns: vec![
                Column::new("songplay_id", Integer).identity().sort_key(),
                Column::new("start_time", Timestamp).not_null(),
                Column::new("user_id", Varchar(Some(50))).not_null().dist_key(),
                Column::new("level", Varchar(Some(10))).not_null(),
                Column::new("song_id", Varchar(Some(40))).not_null(),
                Column::new("artist_id", Varchar(Some(50))).not_null(),
                Column::new("session_id", Varchar(Some(50))).not_null(),
                Column::new("location", Varchar(Some(100))),
                Column::new("user_agent", Varchar(Some(255))),
            ],
        },
        Table {
            name: USERS,
            kind: TableKind::Dimension,
            dist_style: DistStyle::All,
            columns: vec![
                Column::new("user_id", Integer).not_null().sort_key(),
                Column::new("first_name", Varchar(Some(50))),
                Column::new("last_name", Varchar(Some(80))),
                Column::new("gender", Varchar(Some(10))),
                Column::new("level", Varchar(Some(10))),
            ],
        },
        Table {
            name: SONGS,
            kind: TableKind::Dimension,
            dist_style: DistStyle::Auto,
            columns: vec![
                Column::new("song_id", Varchar(Some(50))).not_null().sort_key(),
                Column::new("title", Varchar(Some(500))).not_null(),
                Column::new("artist_id", Varchar(Some(50))).not_null(),
                Column::new("year", Integer).not_null(),
                Column::new("duration", Decimal(10, 5)).not_null(),
            ],
        },
        Table {
            name: ARTISTS,
            kind: TableKind::Dimension,
            dist_style: DistStyle::All,
            columns: vec![
                Column::new("artist_id", Varchar(Some(50))).not_null().sort_key(),
                Column::new("name", Varchar(Some(500))),
                Column::new("location", Varchar(Some(500))),
                Column::new("latitude", Decimal(9, 5)),
                Column::new("longitude", Decimal(9, 5)),
            ],
        },
        Table {
            name: TIME,
            kind: TableKind::Dimension,
            dist_style: DistStyle::All,
            columns: vec![
                Column::new("start_time", Timestamp).not_null().sort_key(),
                Column::new("hour", SmallInt),
                Column::new("day", SmallInt),
                Column::new("week", SmallInt),
                Column::new("month", SmallInt),
                Column::new("year", SmallInt),
                Column::new("weekday", SmallInt),
            ],
        },
    ]
}

/// Look up a table by name
pub fn table(name: &str) -> Option<Table> {
    warehouse_tables().into_iter().find(|t| t.name == name)
}

// ============================================
// STATEMENTS
// ============================================

pub fn drop_statements() -> Vec<Statement> {
    warehouse_tables()
        .iter()
        .map(|t| Statement::new(Phase::Drop, t.name, t.drop_sql()))
        .collect()
}

pub fn create_statements(dialect: Dialect) -> Vec<Statement> {
    warehouse_tables()
        .iter()
        .map(|t| Statement::new(Phase::Create, t.name, t.create_sql(dialect)))
        .collect()
}

/// Drop every table, then create every table, committing one statement at a
/// time. A failure part way leaves the schema partially applied; running
/// again converges.
pub fn rebuild(session: &mut dyn Session, dialect: Dialect) -> Result<usize> {
    let dropped = run_statements(session, &drop_statements())?;
    info!(count = dropped, "tables dropped");

    let created = run_statements(session, &create_statements(dialect))?;
    info!(count = created, %dialect, "tables created");

    Ok(dropped + created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seven_tables_staging_first() {
        let names: Vec<&str> = warehouse_tables().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![STAGING_EVENTS, STAGING_SONGS, SONGPLAYS, USERS, SONGS, ARTISTS, TIME]
        );
    }

    #[test]
    fn test_drops_run_in_table_order() {
        let drops = drop_statements();
        assert_eq!(drops.len(), 7);
        assert!(drops.iter().all(|s| s.phase == Phase::Drop));
        assert_eq!(drops[0].sql, "DROP TABLE IF EXISTS stagingevents_tab;");
        assert_eq!(drops[6].sql, "DROP TABLE IF EXISTS time_tab;");
    }

    #[test]
    fn test_redshift_dimension_ddl() {
        let sql = table(USERS).unwrap().create_sql(Dialect::Redshift);
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS users_tab (\n\
             \x20   user_id INTEGER NOT NULL SORTKEY,\n\
             \x20   first_name VARCHAR(50) NULL,\n\
             \x20   last_name VARCHAR(80) NULL,\n\
             \x20   gender VARCHAR(10) NULL,\n\
             \x20   level VARCHAR(10) NULL\n\
             ) DISTSTYLE ALL;"
        );
    }

    #[test]
    fn test_redshift_staging_keys_and_identity() {
        let sql = table(STAGING_EVENTS).unwrap().create_sql(Dialect::Redshift);
        assert!(sql.contains("event_id BIGINT IDENTITY(0,1) NOT NULL,"));
        assert!(sql.contains("sessionId INTEGER NOT NULL SORTKEY DISTKEY,"));
        assert!(sql.ends_with("\n);"));

        let sql = table(SONGPLAYS).unwrap().create_sql(Dialect::Redshift);
        assert!(sql.contains("songplay_id INTEGER IDENTITY(0,1) NOT NULL SORTKEY,"));
        assert!(sql.contains("user_id VARCHAR(50) NOT NULL DISTKEY,"));
    }

    #[test]
    fn test_sqlite_ddl_has_no_distribution() {
        for statement in create_statements(Dialect::Sqlite) {
            assert!(!statement.sql.contains("SORTKEY"), "{}", statement.sql);
            assert!(!statement.sql.contains("DISTKEY"), "{}", statement.sql);
            assert!(!statement.sql.contains("DISTSTYLE"), "{}", statement.sql);
            assert!(!statement.sql.contains("IDENTITY"), "{}", statement.sql);
        }
        let sql = table(SONGPLAYS).unwrap().create_sql(Dialect::Sqlite);
        assert!(sql.contains("songplay_id INTEGER PRIMARY KEY AUTOINCREMENT,"));
    }

    #[test]
    fn test_fractional_columns_keep_scale() {
        let songs = table(SONGS).unwrap();
        assert_eq!(songs.column("duration").unwrap().ty, ColumnType::Decimal(10, 5));
        let artists = table(ARTISTS).unwrap();
        assert_eq!(artists.column("latitude").unwrap().ty, ColumnType::Decimal(9, 5));
    }

    #[test]
    fn test_loadable_columns_skip_identity() {
        let events = table(STAGING_EVENTS).unwrap();
        let columns: Vec<&str> = events.loadable_columns().map(|c| c.name).collect();
        assert_eq!(columns.len(), 18);
        assert_eq!(columns[0], "artist");
        assert_eq!(columns[17], "userId");
    }
}
