//! Local bulk loader for the embedded engine
//!
//! Plays the part of the warehouse's COPY against files on disk: reads JSON
//! records from a file or directory tree, maps them onto the staging columns
//! the same way (JSONPaths or auto), and turns each staging table into
//! multi-row INSERTs of at most [`INSERT_BATCH_ROWS`] rows followed by
//! `ANALYZE`.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::copy::{CopySpec, JsonFormat};
use super::jsonpath::JsonPaths;
use super::LoadError;
use crate::statement::{quote_literal, Phase, Statement};
use crate::warehouse::schema::{self, Column, Table, TableKind};

/// Rows per generated INSERT statement
pub const INSERT_BATCH_ROWS: usize = 1000;

/// Build the staging statements for every copy, reading all sources now.
pub fn load_statements(specs: &[CopySpec]) -> Result<Vec<Statement>, LoadError> {
    let mut statements = Vec::new();

    for spec in specs {
        let table = schema::table(spec.table)
            .filter(|t| t.kind == TableKind::Staging)
            .ok_or_else(|| LoadError::UnknownTable(spec.table.to_string()))?;

        let records = read_records(Path::new(&spec.source), spec.invalid_char)?;
        let rows = map_records(&table, &spec.format, &records)?;
        info!(table = table.name, records = rows.len(), source = %spec.source, "staging records read");

        if rows.is_empty() {
            warn!(table = table.name, source = %spec.source, "no records to load");
        }
        for (i, batch) in rows.chunks(INSERT_BATCH_ROWS).enumerate() {
            let label = match i {
                0 => table.name.to_string(),
                _ => format!("{} batch {}", table.name, i + 1),
            };
            statements.push(Statement::new(Phase::Copy, label, insert_sql(&table, batch)));
        }

        if spec.stat_update {
            statements.push(Statement::new(
                Phase::Copy,
                format!("{} statistics", table.name),
                format!("ANALYZE {};", table.name),
            ));
        }
    }

    Ok(statements)
}

// ============================================
// READING
// ============================================

/// JSON files under `source`, sorted for a stable load order
fn source_files(source: &Path) -> Result<Vec<PathBuf>, LoadError> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    if !source.is_dir() {
        return Err(LoadError::Io {
            path: source.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|source_err| LoadError::Walk {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        let is_json = entry.path().extension().map_or(false, |ext| ext == "json");
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_records(source: &Path, invalid_char: Option<char>) -> Result<Vec<Value>, LoadError> {
    let mut records = Vec::new();

    for path in source_files(source)? {
        let bytes = std::fs::read(&path).map_err(|e| LoadError::Io {
            path: path.clone(),
            source: e,
        })?;
        let text = decode(bytes, invalid_char, &path)?;

        // Files may hold one object, several concatenated, or one per line.
        let before = records.len();
        for value in serde_json::Deserializer::from_str(&text).into_iter::<Value>() {
            let value = value.map_err(|e| LoadError::Json {
                path: path.clone(),
                source: e,
            })?;
            if !value.is_object() {
                return Err(LoadError::NotAnObject { path });
            }
            records.push(value);
        }
        debug!(path = %path.display(), records = records.len() - before, "read source file");
    }

    Ok(records)
}

/// Each invalid byte becomes one `invalid_char`; valid text is kept as is.
fn decode(bytes: Vec<u8>, invalid_char: Option<char>, path: &Path) -> Result<String, LoadError> {
    let bytes = match String::from_utf8(bytes) {
        Ok(text) => return Ok(text),
        Err(err) => err.into_bytes(),
    };
    let Some(replacement) = invalid_char else {
        return Err(LoadError::InvalidUtf8 {
            path: path.to_path_buf(),
        });
    };

    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
        text.extend(std::iter::repeat(replacement).take(chunk.invalid().len()));
    }
    Ok(text)
}

// ============================================
// MAPPING
// ============================================

fn map_records(
    table: &Table,
    format: &JsonFormat,
    records: &[Value],
) -> Result<Vec<Vec<String>>, LoadError> {
    let columns: Vec<&Column> = table.loadable_columns().collect();

    match format {
        JsonFormat::Auto => Ok(records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| literal(column, record.get(column.name.to_lowercase().as_str())))
                    .collect()
            })
            .collect()),
        JsonFormat::Paths(location) => {
            let path = Path::new(location);
            let paths = JsonPaths::from_file(path)?;
            if paths.len() != columns.len() {
                return Err(LoadError::ColumnCount {
                    path: path.to_path_buf(),
                    paths: paths.len(),
                    table: table.name,
                    columns: columns.len(),
                });
            }
            Ok(records
                .iter()
                .map(|record| {
                    columns
                        .iter()
                        .zip(paths.extract(record))
                        .map(|(column, value)| literal(column, value))
                        .collect()
                })
                .collect())
        }
    }
}

/// SQL literal for a JSON value headed for `column`.
///
/// Blank strings become NULL in numeric columns; nested values are stored as
/// their JSON text.
fn literal(column: &Column, value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::Bool(b)) if column.ty.is_numeric() => (if *b { "1" } else { "0" }).to_string(),
        Some(Value::Bool(b)) => quote_literal(&b.to_string()),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if column.ty.is_numeric() && s.trim().is_empty() => "NULL".to_string(),
        Some(Value::String(s)) => quote_literal(s),
        Some(nested) => quote_literal(&nested.to_string()),
    }
}

fn insert_sql(table: &Table, rows: &[Vec<String>]) -> String {
    let columns: Vec<&str> = table.loadable_columns().map(|c| c.name).collect();
    let values: Vec<String> = rows
        .iter()
        .map(|row| format!("({})", row.join(", ")))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES\n{};",
        table.name,
        columns.join(", "),
        values.join(",\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::schema::{STAGING_EVENTS, STAGING_SONGS};
    use serde_json::json;

    #[test]
    fn test_literal_by_column_type() {
        let songs = schema::table(STAGING_SONGS).unwrap();
        let year = songs.column("year").unwrap();
        let title = songs.column("title").unwrap();

        assert_eq!(literal(year, Some(&json!(2004))), "2004");
        assert_eq!(literal(year, Some(&json!(""))), "NULL");
        assert_eq!(literal(year, None), "NULL");
        assert_eq!(literal(title, Some(&json!(""))), "''");
        assert_eq!(literal(title, Some(&json!("Don't Stop"))), "'Don''t Stop'");
        assert_eq!(literal(title, Some(&json!(true))), "'true'");
        assert_eq!(literal(title, Some(&json!({"a": 1}))), "'{\"a\":1}'");
    }

    #[test]
    fn test_auto_mapping_matches_lowercase_columns() {
        let songs = schema::table(STAGING_SONGS).unwrap();
        let record = json!({
            "num_songs": 1,
            "artist_id": "ARJIE2Y1187B994AB7",
            "artist_latitude": null,
            "Artist_Name": "Line Renaud",
            "song_id": "SOUPIRU12A6D4FA1E1",
            "title": "Der Kleine Dompfaff",
            "duration": 152.92036,
            "year": 0
        });
        let rows = map_records(&songs, &JsonFormat::Auto, &[record]).unwrap();

        assert_eq!(
            rows[0],
            vec![
                "1",
                "'ARJIE2Y1187B994AB7'",
                "NULL",
                "NULL",
                "NULL",
                // Key case differs from the column name, so no match.
                "NULL",
                "'SOUPIRU12A6D4FA1E1'",
                "'Der Kleine Dompfaff'",
                "152.92036",
                "0",
            ]
        );
    }

    #[test]
    fn test_jsonpaths_column_count_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let paths = dir.path().join("paths.json");
        std::fs::write(&paths, r#"{"jsonpaths": ["$.artist"]}"#).unwrap();

        let events = schema::table(STAGING_EVENTS).unwrap();
        let format = JsonFormat::Paths(paths.to_string_lossy().into_owned());
        let err = map_records(&events, &format, &[json!({"artist": "x"})]).unwrap_err();
        assert!(matches!(err, LoadError::ColumnCount { paths: 1, columns: 18, .. }));
    }

    #[test]
    fn test_reads_concatenated_and_line_delimited_records() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("A")).unwrap();
        std::fs::write(dir.path().join("A").join("one.json"), "{\"a\": 1}{\"a\": 2}").unwrap();
        std::fs::write(dir.path().join("two.json"), "{\"a\": 3}\n{\"a\": 4}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not json").unwrap();

        let records = read_records(dir.path(), None).unwrap();
        let values: Vec<i64> = records.iter().map(|r| r["a"].as_i64().unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_invalid_utf8_needs_replacement_char() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("song.json");
        let mut bytes = b"{\"title\": \"Caf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"\"}");
        std::fs::write(&file, bytes).unwrap();

        let err = read_records(&file, None).unwrap_err();
        assert!(matches!(err, LoadError::InvalidUtf8 { .. }));

        let records = read_records(&file, Some('^')).unwrap();
        assert_eq!(records[0]["title"], json!("Caf^"));
    }

    #[test]
    fn test_replacement_leaves_valid_text_alone() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("song.json");
        // A literal U+FFFD is valid data; the two-byte run after "C" is not.
        let mut bytes = "{\"title\": \"A\u{FFFD}B\", \"x\": \"C".as_bytes().to_vec();
        bytes.extend_from_slice(&[0xE9, 0xFF]);
        bytes.extend_from_slice(b"\"}");
        std::fs::write(&file, bytes).unwrap();

        let records = read_records(&file, Some('^')).unwrap();
        assert_eq!(records[0]["title"], json!("A\u{FFFD}B"));
        assert_eq!(records[0]["x"], json!("C^^"));
    }

    #[test]
    fn test_large_sources_split_into_batches() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("songs.json");
        let lines: Vec<String> = (0..INSERT_BATCH_ROWS + 1)
            .map(|i| json!({"song_id": format!("SO{}", i), "year": 2000}).to_string())
            .collect();
        std::fs::write(&file, lines.join("\n")).unwrap();

        let spec = CopySpec {
            table: STAGING_SONGS,
            source: file.to_string_lossy().into_owned(),
            format: JsonFormat::Auto,
            invalid_char: None,
            stat_update: true,
        };
        let statements = load_statements(&[spec]).unwrap();

        let labels: Vec<&str> = statements.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "stagingsongs_tab",
                "stagingsongs_tab batch 2",
                "stagingsongs_tab statistics",
            ]
        );
        assert_eq!(statements[1].sql.matches("'SO").count(), 1);
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_records(&dir.path().join("nope"), None).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_non_object_record_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("list.json");
        std::fs::write(&file, "[1, 2]").unwrap();
        assert!(matches!(
            read_records(&file, None).unwrap_err(),
            LoadError::NotAnObject { .. }
        ));
    }
}
