use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod problems;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

pub const DEFAULT_PARALLEL: usize = 4;
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_MAX_ROWS: usize = 10_000;
pub const DEFAULT_DB_PATH: &str = ".sqljudge/judge.db";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JudgeConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub settings: EvalSettings,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            settings: EvalSettings::default(),
            store: StoreConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvalSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<usize>,
}

impl EvalSettings {
    pub fn parallel(&self) -> usize {
        self.parallel.unwrap_or(DEFAULT_PARALLEL).max(1)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(
            self.statement_timeout_ms
                .unwrap_or(DEFAULT_STATEMENT_TIMEOUT_MS)
                .max(1),
        )
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows.unwrap_or(DEFAULT_MAX_ROWS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

pub fn load_config(path: &Path, strict: bool) -> Result<JudgeConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    parse_config(&raw, strict)
        .map_err(|e| ConfigError(format!("{} (file: {})", e.0, path.display())))
}

pub fn parse_config(raw: &str, strict: bool) -> Result<JudgeConfig, ConfigError> {
    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);

    let cfg: JudgeConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    // `x-` and `_` prefixed keys are free for YAML anchors
    let unknown: Vec<_> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();
    if !unknown.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "unknown fields detected in strict mode: {:?}",
                unknown
            )));
        }
        tracing::warn!(
            event = "config.unknown_fields",
            fields = ?unknown,
            "ignoring unknown config fields"
        );
    }

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }
    Ok(cfg)
}

impl JudgeConfig {
    /// Applies `SQLJUDGE_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|k| std::env::var(k).ok())
    }

    /// Unparsable values are ignored, keeping the file or default value.
    pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(n) = var("SQLJUDGE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.settings.statement_timeout_ms = Some(n);
        }
        if let Some(n) = var("SQLJUDGE_PARALLEL").and_then(|v| v.parse().ok()) {
            self.settings.parallel = Some(n);
        }
        if let Some(p) = var("SQLJUDGE_DB").filter(|v| !v.is_empty()) {
            self.store.path = PathBuf::from(p);
        }
        if let Some(level) = var("SQLJUDGE_LOG").filter(|v| !v.is_empty()) {
            self.log_level = level;
        }
        self
    }
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"version: 1
settings:
  parallel: 4
  statement_timeout_ms: 2000
  max_rows: 10000
store:
  path: .sqljudge/judge.db
log_level: info
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
