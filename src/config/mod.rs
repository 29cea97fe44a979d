//! Configuration module for gridql.
//!
//! Handles the TOML settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CatalogSettings, CompileSettings, DatabaseSettings, ListSettings,
    PaginationSettings, Settings, SettingsError,
};
