//! Settings file model with YAML support
//!
//! The file mirrors the groups the warehouse has always been configured with:
//! `CLUSTER`, `IAM_ROLE` and `S3`, plus an optional `WAREHOUSE` group for
//! engine selection and runtime options. Every field is optional at parse
//! time; [`Config::validate`] turns it into [`Settings`] or reports all
//! missing keys at once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::etl::WeekdayRule;
use crate::warehouse::Dialect;

const DEFAULT_CONFIG_FILE: &str = "dwh.yaml";
const USER_CONFIG_FILE: &str = "~/.config/sparkify-dwh/dwh.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no settings file found (searched: {})", .searched.join(", "))]
    NotFound { searched: Vec<String> },

    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Raw settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "CLUSTER", alias = "cluster", default)]
    pub cluster: ClusterConfig,

    #[serde(rename = "IAM_ROLE", alias = "iam_role", default)]
    pub iam_role: IamRoleConfig,

    #[serde(rename = "S3", alias = "s3", default)]
    pub s3: S3Config,

    #[serde(rename = "WAREHOUSE", alias = "warehouse", default)]
    pub warehouse: WarehouseConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct ClusterConfig {
    pub host: Option<String>,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct IamRoleConfig {
    pub arn: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct S3Config {
    pub log_data: Option<String>,
    pub log_jsonpath: Option<String>,
    pub song_data: Option<String>,
}

/// Engine and runtime options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub engine: Engine,

    #[serde(default)]
    pub sqlite_path: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub statement_timeout_secs: Option<u64>,

    #[serde(default)]
    pub weekday: WeekdayRule,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Redshift,
    Sqlite,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            sqlite_path: None,
            region: default_region(),
            statement_timeout_secs: None,
            weekday: WeekdayRule::default(),
        }
    }
}

fn search_paths(path: &str) -> Vec<String> {
    if path != DEFAULT_CONFIG_FILE {
        return vec![shellexpand::tilde(path).to_string()];
    }
    vec![
        DEFAULT_CONFIG_FILE.to_string(),
        shellexpand::tilde(USER_CONFIG_FILE).to_string(),
    ]
}

impl Config {
    /// Load settings from a YAML file
    ///
    /// An explicit path is the only place looked at. For the default name
    /// the search order is:
    /// 1. ./dwh.yaml (current directory)
    /// 2. ~/.config/sparkify-dwh/dwh.yaml
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::load_first(search_paths(path))
    }

    fn load_first(search_paths: Vec<String>) -> Result<Self, ConfigError> {
        for search_path in &search_paths {
            if Path::new(search_path).exists() {
                return Self::from_file(search_path);
            }
        }

        Err(ConfigError::NotFound {
            searched: search_paths,
        })
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Resolve every setting the configured engine needs.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let mut missing = Vec::new();

        let s3 = SourceLocations {
            log_data: require(&self.s3.log_data, "S3.LOG_DATA", &mut missing),
            log_jsonpath: require(&self.s3.log_jsonpath, "S3.LOG_JSONPATH", &mut missing),
            song_data: require(&self.s3.song_data, "S3.SONG_DATA", &mut missing),
        };

        let target = match self.warehouse.engine {
            Engine::Redshift => {
                let cluster = ClusterSettings {
                    host: require(&self.cluster.host, "CLUSTER.HOST", &mut missing),
                    db_name: require(&self.cluster.db_name, "CLUSTER.DB_NAME", &mut missing),
                    db_user: require(&self.cluster.db_user, "CLUSTER.DB_USER", &mut missing),
                    db_password: require(
                        &self.cluster.db_password,
                        "CLUSTER.DB_PASSWORD",
                        &mut missing,
                    ),
                    db_port: self.cluster.db_port.unwrap_or_else(|| {
                        missing.push("CLUSTER.DB_PORT");
                        0
                    }),
                };
                let iam_role = require(&self.iam_role.arn, "IAM_ROLE.ARN", &mut missing);
                Target::Redshift { cluster, iam_role }
            }
            Engine::Sqlite => Target::Sqlite {
                path: PathBuf::from(
                    shellexpand::tilde(&require(
                        &self.warehouse.sqlite_path,
                        "WAREHOUSE.sqlite_path",
                        &mut missing,
                    ))
                    .to_string(),
                ),
            },
        };

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        if self.warehouse.region.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "WAREHOUSE.region",
                reason: "must not be empty".to_string(),
            });
        }

        if self.warehouse.statement_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                key: "WAREHOUSE.statement_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Settings {
            target,
            sources: s3,
            region: self.warehouse.region.clone(),
            statement_timeout: self.warehouse.statement_timeout_secs.map(Duration::from_secs),
            weekday: self.warehouse.weekday,
        })
    }
}

// Blank values count as missing.
fn require(value: &Option<String>, key: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push(key);
            String::new()
        }
    }
}

/// Validated settings, built once at startup and passed to each phase.
#[derive(Debug, Clone)]
pub struct Settings {
    pub target: Target,
    pub sources: SourceLocations,
    pub region: String,
    pub statement_timeout: Option<Duration>,
    pub weekday: WeekdayRule,
}

#[derive(Debug, Clone)]
pub enum Target {
    Redshift {
        cluster: ClusterSettings,
        iam_role: String,
    },
    Sqlite {
        path: PathBuf,
    },
}

#[derive(Clone)]
pub struct ClusterSettings {
    pub host: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub db_port: u16,
}

/// Staging data locations: object storage URIs for Redshift, local paths
/// for the embedded engine.
#[derive(Debug, Clone)]
pub struct SourceLocations {
    pub log_data: String,
    pub log_jsonpath: String,
    pub song_data: String,
}

impl Settings {
    /// Load the settings file at `path` and validate it.
    pub fn resolve(path: &str) -> crate::error::Result<Self> {
        Ok(Config::load(path)?.validate()?)
    }

    pub fn dialect(&self) -> Dialect {
        match self.target {
            Target::Redshift { .. } => Dialect::Redshift,
            Target::Sqlite { .. } => Dialect::Sqlite,
        }
    }

    /// Credential reference used by bulk copies, if the target has one
    pub fn iam_role(&self) -> Option<&str> {
        match &self.target {
            Target::Redshift { iam_role, .. } => Some(iam_role),
            Target::Sqlite { .. } => None,
        }
    }
}

impl ClusterSettings {
    /// Keyword/value connection string
    pub fn connection_string(&self) -> String {
        format!(
            "host={} dbname={} user={} password={} port={}",
            self.host, self.db_name, self.db_user, self.db_password, self.db_port
        )
    }

    /// Same as [`Self::connection_string`] with the password masked, for logs
    pub fn redacted(&self) -> String {
        format!(
            "host={} dbname={} user={} password=*** port={}",
            self.host, self.db_name, self.db_user, self.db_port
        )
    }
}

impl fmt::Debug for ClusterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}
