//! JSONPaths mapping files
//!
//! A JSONPaths file lists one path expression per staging column, in column
//! order: `{"jsonpaths": ["$['artist']", "$.auth", ...]}`. Only the subset
//! bulk loaders accept is supported: dot members, bracketed quoted members
//! and array indexes.

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use super::LoadError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn select<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(record, |value, segment| match segment {
                Segment::Key(key) => value.get(key.as_str()),
                Segment::Index(index) => value.get(*index),
            })
    }
}

impl FromStr for JsonPath {
    type Err = String;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let rest = expr
            .trim()
            .strip_prefix('$')
            .ok_or_else(|| format!("'{}' does not start with '$'", expr))?;

        let mut chars = rest.chars().peekable();
        let mut segments = Vec::new();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    let mut key = String::new();
                    while let Some(&next) = chars.peek() {
                        if next == '.' || next == '[' {
                            break;
                        }
                        key.push(next);
                        chars.next();
                    }
                    if key.is_empty() {
                        return Err(format!("empty member name in '{}'", expr));
                    }
                    segments.push(Segment::Key(key));
                }
                '[' => match chars.next() {
                    Some(quote @ ('\'' | '"')) => {
                        let mut key = String::new();
                        loop {
                            match chars.next() {
                                Some(c) if c == quote => break,
                                Some(c) => key.push(c),
                                None => return Err(format!("unterminated quote in '{}'", expr)),
                            }
                        }
                        if chars.next() != Some(']') {
                            return Err(format!("expected ']' in '{}'", expr));
                        }
                        segments.push(Segment::Key(key));
                    }
                    Some(d) if d.is_ascii_digit() => {
                        let mut digits = d.to_string();
                        loop {
                            match chars.next() {
                                Some(']') => break,
                                Some(c) if c.is_ascii_digit() => digits.push(c),
                                _ => return Err(format!("invalid array index in '{}'", expr)),
                            }
                        }
                        let index = digits
                            .parse()
                            .map_err(|_| format!("array index out of range in '{}'", expr))?;
                        segments.push(Segment::Index(index));
                    }
                    _ => return Err(format!("invalid bracket expression in '{}'", expr)),
                },
                other => return Err(format!("unexpected '{}' in '{}'", other, expr)),
            }
        }

        if segments.is_empty() {
            return Err(format!("'{}' selects the whole record", expr));
        }

        Ok(Self { segments })
    }
}

#[derive(Deserialize)]
struct JsonPathsFile {
    jsonpaths: Vec<String>,
}

/// Ordered list of paths, one per loadable column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPaths(Vec<JsonPath>);

impl JsonPaths {
    pub fn parse(content: &str) -> Result<Self, String> {
        let file: JsonPathsFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
        if file.jsonpaths.is_empty() {
            return Err("no paths listed".to_string());
        }
        file.jsonpaths
            .iter()
            .map(|p| p.parse())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|reason| LoadError::JsonPaths {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// Values for each path; missing members come back as `None`.
    pub fn extract<'a>(&self, record: &'a Value) -> Vec<Option<&'a Value>> {
        self.0.iter().map(|path| path.select(record)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_forms() {
        let record = json!({
            "artist": "Des'ree",
            "user": {"name": "Ryan", "tags": ["a", "b"]},
        });

        let bracket: JsonPath = "$['artist']".parse().unwrap();
        assert_eq!(bracket.select(&record), Some(&json!("Des'ree")));

        let dotted: JsonPath = "$.user.name".parse().unwrap();
        assert_eq!(dotted.select(&record), Some(&json!("Ryan")));

        let indexed: JsonPath = "$[\"user\"].tags[1]".parse().unwrap();
        assert_eq!(indexed.select(&record), Some(&json!("b")));

        let missing: JsonPath = "$.song".parse().unwrap();
        assert_eq!(missing.select(&record), None);
    }

    #[test]
    fn test_invalid_paths() {
        assert!("artist".parse::<JsonPath>().is_err());
        assert!("$".parse::<JsonPath>().is_err());
        assert!("$['artist'".parse::<JsonPath>().is_err());
        assert!("$[x]".parse::<JsonPath>().is_err());
        assert!("$..artist".parse::<JsonPath>().is_err());
    }

    #[test]
    fn test_jsonpaths_file() {
        let paths = JsonPaths::parse(
            r#"{"jsonpaths": ["$['artist']", "$['auth']", "$['ts']"]}"#,
        )
        .unwrap();
        assert_eq!(paths.len(), 3);

        let record = json!({"artist": "Sydney Youngblood", "ts": 1541990258796_i64});
        let values = paths.extract(&record);
        assert_eq!(values[0], Some(&json!("Sydney Youngblood")));
        assert_eq!(values[1], None);
        assert_eq!(values[2], Some(&json!(1541990258796_i64)));
    }

    #[test]
    fn test_empty_jsonpaths_rejected() {
        assert!(JsonPaths::parse(r#"{"jsonpaths": []}"#).is_err());
        assert!(JsonPaths::parse(r#"{"paths": ["$.a"]}"#).is_err());
    }
}
