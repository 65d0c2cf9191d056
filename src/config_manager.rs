use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Result, anyhow};
use configparser::ini::Ini;
use log::*;

use crate::schema_normalizer::DatasetRole;

pub const DEFAULT_CONFIG_FILE: &str = "insightforge.ini";
pub const ENV_PREFIX: &str = "INSIGHTFORGE";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub sources: DefaultSources,
    pub features: FeatureFlags,
    pub defaults: DefaultBrief,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

/// Server-side dataset names sent in place of uploaded records when the
/// dashboard runs on sample data.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DefaultSources {
    pub catalog: String,
    pub reviews: String,
    pub pricing: String,
    pub competitors: String,
    pub performance_signals: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FeatureFlags {
    pub use_mock_data_fallback: bool,
    pub enable_logging: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DefaultBrief {
    pub mode: String,
    pub business_goal: String,
    pub scope_type: String,
    pub scope_value: String,
    pub marketplace: String,
    pub region: String,
    pub timeframe: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: String::from("http://localhost:8000"),
            api_key: String::new(),
            timeout_ms: 30_000,
        }
    }
}

impl Default for DefaultSources {
    fn default() -> Self {
        DefaultSources {
            catalog: String::from("catalog.json"),
            reviews: String::from("reviews.json"),
            pricing: String::from("pricing.json"),
            competitors: String::from("competitors.json"),
            performance_signals: String::from("performance_signals.json"),
        }
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        FeatureFlags {
            use_mock_data_fallback: true,
            enable_logging: true,
        }
    }
}

impl Default for DefaultBrief {
    fn default() -> Self {
        DefaultBrief {
            mode: String::from("quick"),
            business_goal: String::from("growth"),
            scope_type: String::from("SKU"),
            scope_value: String::from("SKU-472"),
            marketplace: String::from("Amazon"),
            region: String::from("India"),
            timeframe: String::from("Last 30 days"),
        }
    }
}

impl ApiConfig {
    pub fn api_key(&self) -> Option<String> {
        let key = self.api_key.trim();
        if key.is_empty() { None } else { Some(key.to_string()) }
    }
}

impl DefaultSources {
    pub fn path_for(&self, role: DatasetRole) -> &str {
        match role {
            DatasetRole::Catalog => &self.catalog,
            DatasetRole::Reviews => &self.reviews,
            DatasetRole::Pricing => &self.pricing,
            DatasetRole::Competitors => &self.competitors,
            DatasetRole::PerformanceSignals => &self.performance_signals,
        }
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
    pub config: AppConfig,
}

impl ConfigManager {
    /// Resolves the configuration from built-in defaults, then the INI file
    /// at `config_path` (if present), then `INSIGHTFORGE_<SECTION>__<KEY>`
    /// environment variables.
    pub fn new(config_path: impl Into<PathBuf>) -> Result<Self> {
        let mut manager = ConfigManager {
            config_path: config_path.into(),
            config: AppConfig::default(),
        };
        manager.load()?;
        Ok(manager)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&mut self) -> Result<()> {
        self.load_with_env(None)
    }

    /// Same as [`load`](Self::load), but reads the environment layer from
    /// `env` instead of the process environment when given.
    pub fn load_with_env(&mut self, env: Option<config::Map<String, String>>) -> Result<()> {
        if !self.config_path.exists() {
            info!("{} not found, using built-in defaults", self.config_path.display());
        }

        // values stay strings; serde converts the numeric and boolean fields
        let settings = config::Config::builder()
            .add_source(
                config::File::from(self.config_path.as_path())
                    .format(config::FileFormat::Ini)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .source(env),
            )
            .build()
            .map_err(|e| anyhow!("Failed to read configuration {}: {}", self.config_path.display(), e))?;

        self.config = settings
            .try_deserialize()
            .map_err(|e| anyhow!("Invalid configuration in {}: {}", self.config_path.display(), e))?;
        self.validate()?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| anyhow!("Failed to create config directory: {}", e))?;
            }
        }

        let mut config_ini = Ini::new();
        let config = &self.config;

        config_ini.set("api", "base_url", Some(config.api.base_url.clone()));
        config_ini.set("api", "api_key", Some(config.api.api_key.clone()));
        config_ini.set("api", "timeout_ms", Some(config.api.timeout_ms.to_string()));

        for role in DatasetRole::ALL {
            config_ini.set("sources", role.as_str(), Some(config.sources.path_for(role).to_string()));
        }

        config_ini.set("features", "use_mock_data_fallback", Some(config.features.use_mock_data_fallback.to_string()));
        config_ini.set("features", "enable_logging", Some(config.features.enable_logging.to_string()));

        let defaults = &config.defaults;
        config_ini.set("defaults", "mode", Some(defaults.mode.clone()));
        config_ini.set("defaults", "business_goal", Some(defaults.business_goal.clone()));
        config_ini.set("defaults", "scope_type", Some(defaults.scope_type.clone()));
        config_ini.set("defaults", "scope_value", Some(defaults.scope_value.clone()));
        config_ini.set("defaults", "marketplace", Some(defaults.marketplace.clone()));
        config_ini.set("defaults", "region", Some(defaults.region.clone()));
        config_ini.set("defaults", "timeframe", Some(defaults.timeframe.clone()));

        config_ini.write(&self.config_path).map_err(|e| anyhow!("Failed to write config to file: {}", e))?;
        info!("Configuration written to {}", self.config_path.display());
        Ok(())
    }

    /// An empty base URL is tolerated here; the run form reports it as a
    /// missing field when the user tries to submit.
    pub fn validate(&self) -> Result<()> {
        if self.config.api.base_url.trim().is_empty() {
            warn!("{}: api.base_url is empty, set it before running an analysis", self.config_path.display());
        }
        if self.config.api.timeout_ms == 0 {
            return Err(anyhow!("api.timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}
