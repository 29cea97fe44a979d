//! TOML-based configuration for gridql.
//!
//! Supports a config file (gridql.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [compile]
//! dialect = "postgres"
//! max_relation_depth = 32
//! strictness = "lenient"
//!
//! [pagination]
//! default_limit = 25
//! max_limit = 1000
//! min_limit = 1
//!
//! [list]
//! retry_with_formula_validation = true
//!
//! [catalog]
//! path = "${GRIDQL_HOME}/catalog.json"
//!
//! [database]
//! path = "./data.db"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compile::Strictness;
use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Compiler defaults.
    pub compile: CompileSettings,

    /// Page size bounds for list requests.
    pub pagination: PaginationSettings,

    /// List orchestrator behaviour.
    pub list: ListSettings,

    /// Where the metadata catalog lives.
    pub catalog: CatalogSettings,

    /// SQLite database used by `gridql run`.
    pub database: DatabaseSettings,
}

/// Compiler defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompileSettings {
    /// Target SQL dialect.
    pub dialect: Dialect,

    /// Bound on lookup/relation chain length.
    pub max_relation_depth: usize,

    /// Policy for unresolvable filter and sort terms on list requests.
    pub strictness: Strictness,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            max_relation_depth: 32,
            strictness: Strictness::Lenient,
        }
    }
}

/// Page size bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaginationSettings {
    pub default_limit: u64,
    pub max_limit: u64,
    pub min_limit: u64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_limit: 25,
            max_limit: 1000,
            min_limit: 1,
        }
    }
}

impl PaginationSettings {
    /// Clamp a requested page size into `[min_limit, max_limit]`.
    pub fn clamp(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(self.min_limit, self.max_limit)
    }
}

/// List orchestrator behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListSettings {
    /// Re-run a failed list once with strict formula validation.
    pub retry_with_formula_validation: bool,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            retry_with_formula_validation: true,
        }
    }
}

/// Catalog location.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Path to a JSON catalog (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl CatalogSettings {
    /// Get the catalog path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Database location.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file path (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl DatabaseSettings {
    /// Get the database path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `GRIDQL_CONFIG`
    /// 2. `./gridql.toml`
    /// 3. `~/.config/gridql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("GRIDQL_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("gridql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("gridql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Reject settings the compiler cannot work with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.compile.max_relation_depth == 0 {
            return Err(SettingsError::InvalidConfig(
                "compile.max_relation_depth must be at least 1".into(),
            ));
        }
        let p = &self.pagination;
        if p.min_limit > p.max_limit {
            return Err(SettingsError::InvalidConfig(format!(
                "pagination.min_limit ({}) exceeds pagination.max_limit ({})",
                p.min_limit, p.max_limit
            )));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    var_name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            if var_name.is_empty() {
                // Lone $
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
