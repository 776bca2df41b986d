//! Environment configuration.
//!
//! Binaries call `dotenvy::dotenv().ok()` first, then the `from_env`
//! constructors here. Every constructor also has a `from_lookup` twin that
//! takes a key -> value function so tests never touch the process env.

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8787";

/// Tuning defaults for one recalculation call. Both values come from the
/// document database's undocumented rate limit and stay overridable.
pub const DEFAULT_MAX_UPDATES: usize = 120;
pub const DEFAULT_PACE_MS: u64 = 350;

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required<F>(lookup: &F, keys: &[&'static str]) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .find_map(|key| optional(lookup, key))
        .ok_or(ConfigError::Missing(keys[0]))
}

fn parse_number<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match optional(lookup, key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name: key,
            value,
        }),
    }
}

/// Document database connection settings.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: String,
    pub works_database_id: String,
    pub tags_database_id: String,
    pub api_base: String,
    pub api_version: String,
}

impl NotionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base = optional(&lookup, "NOTION_API_BASE")
            .unwrap_or_else(|| DEFAULT_NOTION_API_BASE.to_string());
        if Url::parse(&api_base).is_err() {
            return Err(ConfigError::Invalid {
                name: "NOTION_API_BASE",
                value: api_base,
            });
        }

        Ok(Self {
            token: required(&lookup, &["NOTION_TOKEN"])?,
            works_database_id: required(
                &lookup,
                &["NOTION_WORKS_DATABASE_ID", "NOTION_DATABASE_ID"],
            )?,
            tags_database_id: required(&lookup, &["NOTION_TAGS_DATABASE_ID", "TAGS_DATABASE_ID"])?,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_version: optional(&lookup, "NOTION_VERSION")
                .unwrap_or_else(|| DEFAULT_NOTION_VERSION.to_string()),
        })
    }
}

/// Status labels as stored in the tags database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLabels {
    pub active: String,
    pub merged: String,
    pub hidden: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            active: "active".to_string(),
            merged: "merged".to_string(),
            hidden: "hidden".to_string(),
        }
    }
}

impl StatusLabels {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            active: optional(&lookup, "TAG_ACTIVE_STATUS").unwrap_or(defaults.active),
            merged: optional(&lookup, "TAG_MERGED_STATUS").unwrap_or(defaults.merged),
            hidden: optional(&lookup, "TAG_HIDDEN_STATUS").unwrap_or(defaults.hidden),
        }
    }
}

/// Explicit property names for the works database. Unset fields fall back
/// to schema discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkPropertyOverrides {
    pub tags: Option<String>,
    pub completed_date: Option<String>,
    pub ready: Option<String>,
}

impl WorkPropertyOverrides {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            tags: optional(&lookup, "NOTION_WORKS_TAGS_PROP"),
            completed_date: optional(&lookup, "NOTION_WORKS_DATE_PROP"),
            ready: optional(&lookup, "NOTION_WORKS_READY_PROP"),
        }
    }
}

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecalcDefaults {
    pub max_updates: usize,
    pub pace: Duration,
}

impl Default for RecalcDefaults {
    fn default() -> Self {
        Self {
            max_updates: DEFAULT_MAX_UPDATES,
            pace: Duration::from_millis(DEFAULT_PACE_MS),
        }
    }
}

impl RecalcDefaults {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_updates: usize = parse_number(&lookup, "RECALC_MAX_UPDATES", DEFAULT_MAX_UPDATES)?;
        if max_updates == 0 {
            return Err(ConfigError::Invalid {
                name: "RECALC_MAX_UPDATES",
                value: "0".to_string(),
            });
        }
        let pace_ms: u64 = parse_number(&lookup, "RECALC_PACE_MS", DEFAULT_PACE_MS)?;
        Ok(Self {
            max_updates,
            pace: Duration::from_millis(pace_ms),
        })
    }
}

/// Everything a Notion-backed run needs.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub notion: NotionConfig,
    pub status_labels: StatusLabels,
    pub work_properties: WorkPropertyOverrides,
    pub recalc: RecalcDefaults,
}

impl AdminConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            notion: NotionConfig::from_lookup(&lookup)?,
            status_labels: StatusLabels::from_lookup(&lookup),
            work_properties: WorkPropertyOverrides::from_lookup(&lookup),
            recalc: RecalcDefaults::from_lookup(&lookup)?,
        })
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub admin_token: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            bind_addr: optional(&lookup, "ADMIN_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            admin_token: required(&lookup, &["ADMIN_TOKEN"])?,
        })
    }
}
