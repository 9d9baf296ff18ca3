//! Staging bulk-copy specifications

use crate::config::SourceLocations;
use crate::statement::{quote_literal, Phase, Statement};
use crate::warehouse::schema::{STAGING_EVENTS, STAGING_SONGS};

/// How JSON records map onto staging columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonFormat {
    /// Positional mapping through a JSONPaths file at this location
    Paths(String),
    /// Keys matched against column names
    Auto,
}

/// One staging table's bulk load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySpec {
    pub table: &'static str,
    pub source: String,
    pub format: JsonFormat,
    /// Replacement for invalid UTF-8 characters; rejected when `None`
    pub invalid_char: Option<char>,
    /// Refresh planner statistics after the load
    pub stat_update: bool,
}

/// Staging loads in the order they must run: events, then songs.
pub fn copy_specs(sources: &SourceLocations) -> Vec<CopySpec> {
    vec![
        CopySpec {
            table: STAGING_EVENTS,
            source: unquote(&sources.log_data),
            format: JsonFormat::Paths(unquote(&sources.log_jsonpath)),
            invalid_char: None,
            stat_update: true,
        },
        CopySpec {
            table: STAGING_SONGS,
            source: unquote(&sources.song_data),
            format: JsonFormat::Auto,
            invalid_char: Some('^'),
            stat_update: true,
        },
    ]
}

// Older settings files carried locations already wrapped in quotes.
fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value)
        .to_string()
}

impl CopySpec {
    pub fn redshift_sql(&self, iam_role: &str, region: &str) -> String {
        let mut sql = format!(
            "COPY {} FROM {}\n    CREDENTIALS {}\n",
            self.table,
            quote_literal(&self.source),
            quote_literal(&format!("aws_iam_role={}", iam_role)),
        );

        match &self.format {
            JsonFormat::Paths(location) => {
                sql.push_str(&format!("    FORMAT AS JSON {}\n", quote_literal(location)))
            }
            JsonFormat::Auto => sql.push_str("    FORMAT AS JSON 'auto'\n"),
        }

        if let Some(c) = self.invalid_char {
            sql.push_str(&format!(
                "    ACCEPTINVCHARS AS {}\n",
                quote_literal(&c.to_string())
            ));
        }

        if self.stat_update {
            sql.push_str("    STATUPDATE ON\n");
        }

        sql.push_str(&format!("    REGION {};", quote_literal(region)));
        sql
    }
}

/// One COPY statement per staging table.
pub fn copy_statements(specs: &[CopySpec], iam_role: &str, region: &str) -> Vec<Statement> {
    specs
        .iter()
        .map(|spec| Statement::new(Phase::Copy, spec.table, spec.redshift_sql(iam_role, region)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> SourceLocations {
        SourceLocations {
            log_data: "s3://udacity-dend/log_data".to_string(),
            log_jsonpath: "'s3://udacity-dend/log_json_path.json'".to_string(),
            song_data: "s3://udacity-dend/song_data".to_string(),
        }
    }

    #[test]
    fn test_events_copy_uses_jsonpaths() {
        let statements = copy_statements(
            &copy_specs(&sources()),
            "arn:aws:iam::123456789012:role/dwhRole",
            "us-west-2",
        );

        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].label, STAGING_EVENTS);
        assert_eq!(
            statements[0].sql,
            "COPY stagingevents_tab FROM 's3://udacity-dend/log_data'\n\
             \x20   CREDENTIALS 'aws_iam_role=arn:aws:iam::123456789012:role/dwhRole'\n\
             \x20   FORMAT AS JSON 's3://udacity-dend/log_json_path.json'\n\
             \x20   STATUPDATE ON\n\
             \x20   REGION 'us-west-2';"
        );
    }

    #[test]
    fn test_songs_copy_is_auto_with_invalid_chars() {
        let specs = copy_specs(&sources());
        let sql = specs[1].redshift_sql("arn:role", "us-east-1");

        assert!(sql.starts_with("COPY stagingsongs_tab FROM 's3://udacity-dend/song_data'"));
        assert!(sql.contains("FORMAT AS JSON 'auto'\n"));
        assert!(sql.contains("ACCEPTINVCHARS AS '^'\n"));
        assert!(sql.contains("STATUPDATE ON\n"));
        assert!(sql.ends_with("REGION 'us-east-1';"));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'s3://a/b'"), "s3://a/b");
        assert_eq!(unquote(" s3://a/b "), "s3://a/b");
        assert_eq!(unquote("'"), "'");
    }
}
