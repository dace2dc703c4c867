//! Run configuration.
//!
//! Built once at startup from an optional config file and `POLICY_*`
//! environment variables, then passed into the pipeline.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use config::{Config, Environment, File};
use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://apis.data.go.kr/1383000/policy/subjectList";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DB_PATH: &str = "data/policy.sqlite";
const DEFAULT_TABLE: &str = "posts";

#[derive(Deserialize)]
struct RawSettings {
    #[serde(default)]
    service_key: Option<String>,
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_db_path")]
    db_path: PathBuf,
    #[serde(default = "default_table")]
    table: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

/// API credential. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceKey(String);

impl ServiceKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceKey(***)")
    }
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub service_key: ServiceKey,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub db_path: PathBuf,
    pub table: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub store: StoreSettings,
}

impl Settings {
    /// Load from `file` (if given) overlaid with `POLICY_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix("POLICY"))
            .build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let raw: RawSettings = config.try_deserialize()?;

        let service_key = raw
            .service_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingServiceKey)?;

        if !is_identifier(&raw.table) {
            return Err(ConfigError::InvalidTable(raw.table));
        }

        Ok(Settings {
            api: ApiSettings {
                service_key: ServiceKey(service_key),
                base_url: raw.base_url,
                timeout: Duration::from_secs(raw.timeout_secs.max(1)),
            },
            store: StoreSettings {
                db_path: raw.db_path,
                table: raw.table,
            },
        })
    }
}

/// The table name is spliced into SQL text, so only bare identifiers pass.
fn is_identifier(name: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").unwrap());
    re.is_match(name)
}

#[cfg(test)]
pub(crate) fn test_settings(table: &str) -> Settings {
    Settings {
        api: ApiSettings {
            service_key: ServiceKey("test-key".to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        },
        store: StoreSettings {
            db_path: PathBuf::from(":memory:"),
            table: table.to_string(),
        },
    }
}
