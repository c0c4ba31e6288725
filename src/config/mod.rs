//! Configuration loaded from YAML with environment overrides.
//!
//! Mirrors the deployment convention of one base file plus optional
//! per-environment override (`config/berkas-core.yaml`,
//! `config/berkas-core.{env}.yaml`), environment selected via `BERKAS_ENV`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};

/// Database connection settings for the Postgres store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool: u32,
}

fn default_pool_size() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/berkas_development".to_string(),
            pool: default_pool_size(),
        }
    }
}

/// Allocator behavior and issued-code formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Bounded retry budget for the atomic increment
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff between retries, milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Leading code segment of issued batch codes
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Issuing office segment of issued batch codes
    #[serde(default = "default_office_code")]
    pub office_code: String,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    50
}

fn default_prefix() -> String {
    "973".to_string()
}

fn default_office_code() -> String {
    "UPT.PD.WIL.IV".to_string()
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            prefix: default_prefix(),
            office_code: default_office_code(),
        }
    }
}

impl AllocatorConfig {
    /// Render the issued code for `(sequence, scope_key)`. Byte-stable: the
    /// same inputs always reproduce the same code.
    pub fn format_code(&self, sequence: i64, scope_key: &str) -> String {
        format!(
            "{}/{}-{}/{}",
            self.prefix, sequence, self.office_code, scope_key
        )
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub allocator: AllocatorConfig,
}

impl CoreConfig {
    /// Load from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: CoreConfig = serde_yaml::from_str(content)
            .map_err(|e| CoreError::Configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load base + environment override if present, environment from
    /// `BERKAS_ENV` (default `development`). The override file sets only
    /// what differs; everything it omits keeps the base value.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let environment = detect_environment();

        let base = dir.join("berkas-core.yaml");
        let override_path = dir.join(format!("berkas-core.{environment}.yaml"));

        let mut value = if base.exists() {
            read_yaml_value(&base)?
        } else {
            serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
        };

        if override_path.exists() {
            merge_yaml_values(&mut value, read_yaml_value(&override_path)?);
        }

        let config: CoreConfig = serde_yaml::from_value(value)
            .map_err(|e| CoreError::Configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.allocator.max_attempts == 0 {
            return Err(CoreError::Configuration(
                "allocator.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.allocator.prefix.is_empty() || self.allocator.office_code.is_empty() {
            return Err(CoreError::Configuration(
                "allocator.prefix and allocator.office_code must be non-empty".to_string(),
            ));
        }
        if self.database.pool == 0 {
            return Err(CoreError::Configuration(
                "database.pool must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_yaml_value(path: &Path) -> Result<serde_yaml::Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CoreError::Configuration(format!("cannot read {}: {e}", path.display())))?;
    let value: serde_yaml::Value = serde_yaml::from_str(&content).map_err(|e| {
        CoreError::Configuration(format!("invalid configuration in {}: {e}", path.display()))
    })?;
    // An empty file parses as null; treat it as an empty mapping.
    Ok(match value {
        serde_yaml::Value::Null => serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
        other => other,
    })
}

/// Deep-merge `overlay` into `base`: nested mappings merge key by key,
/// anything else in the overlay replaces the base value outright.
fn merge_yaml_values(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    merge_yaml_values(existing, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Current environment, `development` when unset.
pub fn detect_environment() -> String {
    std::env::var("BERKAS_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}
