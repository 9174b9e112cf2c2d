use std::path::Path;

use cadence_core::materialization::MaterializationConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "cadence.toml";

/// Service configuration: `cadence.toml` overlaid with `CADENCE_*`
/// environment variables. Nested keys use `__`, e.g.
/// `CADENCE_MATERIALIZATION__DEFAULT_MAX_TASKS=500`.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub database_path: String,
    pub host: String,
    pub port: u16,
    /// Bearer token for admin endpoints; admin endpoints are disabled without one
    pub admin_token: Option<String>,
    /// Used when `RUST_LOG` is not set
    pub log_filter: String,
    pub materialization: MaterializationSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            admin_token: None,
            log_filter: "info,sqlx=warn".to_string(),
            materialization: MaterializationSettings::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MaterializationSettings {
    pub max_occurrences_per_pass: usize,
    pub default_max_tasks: usize,
    /// Deadline of a single materialization pass
    pub process_timeout_secs: u64,
    /// Run a pass in the background every N seconds while serving
    pub auto_process_interval_secs: Option<u64>,
}

impl Default for MaterializationSettings {
    fn default() -> Self {
        let core = MaterializationConfig::default();
        Self {
            max_occurrences_per_pass: core.max_occurrences_per_pass,
            default_max_tasks: core.default_max_tasks,
            process_timeout_secs: 60,
            auto_process_interval_secs: None,
        }
    }
}

impl From<&MaterializationSettings> for MaterializationConfig {
    fn from(settings: &MaterializationSettings) -> Self {
        Self {
            max_occurrences_per_pass: settings.max_occurrences_per_pass.max(1),
            default_max_tasks: settings.default_max_tasks,
        }
    }
}

impl Config {
    pub fn new(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        Figment::new()
            .merge(Toml::file(file))
            .merge(Env::prefixed("CADENCE_").split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config: Config = Figment::new()
            .merge(Toml::file("does-not-exist.toml"))
            .extract()
            .unwrap();
        assert_eq!(config.database_path, "cadence.db");
        assert_eq!(config.port, 3000);
        assert!(config.admin_token.is_none());
        assert_eq!(config.materialization.max_occurrences_per_pass, 100);
        assert_eq!(config.materialization.default_max_tasks, 1000);
    }

    #[test]
    fn toml_overrides_nested_values() {
        let config: Config = Figment::new()
            .merge(Toml::string(
                r#"
                port = 8080
                admin_token = "s3cret"

                [materialization]
                default_max_tasks = 25
                auto_process_interval_secs = 300
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.materialization.default_max_tasks, 25);
        assert_eq!(config.materialization.max_occurrences_per_pass, 100);
        assert_eq!(config.materialization.auto_process_interval_secs, Some(300));

        let core = MaterializationConfig::from(&config.materialization);
        assert_eq!(core.default_max_tasks, 25);
    }

    #[test]
    fn zero_per_pass_cap_is_raised_to_one() {
        let config: Config = Figment::new()
            .merge(Toml::string(
                r#"
                [materialization]
                max_occurrences_per_pass = 0
                "#,
            ))
            .extract()
            .unwrap();

        let core = MaterializationConfig::from(&config.materialization);
        assert_eq!(core.max_occurrences_per_pass, 1);
    }
}
