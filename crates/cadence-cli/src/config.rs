use cadence_core::models::TaskPriority;
use cadence_core::occurrence::{GeneratorConfig, DEFAULT_MAX_OCCURRENCES};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "cadence.toml";
pub const ENV_PREFIX: &str = "CADENCE_";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database_path: String,
    /// Tracing filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Priority given to new tasks that do not name one
    pub default_priority: TaskPriority,
    pub recurrence: RecurrenceConfig,
}

/// Configuration for occurrence generation
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RecurrenceConfig {
    /// Hard cap on the instances generated for one rule
    pub max_occurrences: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            log_level: "warn".to_string(),
            default_priority: TaskPriority::None,
            recurrence: RecurrenceConfig::default(),
        }
    }
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
        }
    }
}

impl Config {
    /// Reads `cadence.toml` from the working directory, then `CADENCE_*`
    /// environment variables. Nested keys use `__`, as in
    /// `CADENCE_RECURRENCE__MAX_OCCURRENCES`.
    pub fn new() -> Result<Self, figment::Error> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(CONFIG_FILE))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        let config: Config = figment.extract()?;
        if config.recurrence.max_occurrences == 0 {
            return Err(figment::Error::from(
                "recurrence.max_occurrences must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            max_occurrences: self.recurrence.max_occurrences,
        }
    }
}
