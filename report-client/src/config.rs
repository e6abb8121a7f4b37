use anyhow::{Context, Result};
use filter_core::{FieldRegistry, FieldType};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const API_URL_ENV: &str = "SALESDASH_API_URL";
pub const BUSINESS_ENV: &str = "SALESDASH_BUSINESS";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub values: ValuesConfig,
    /// Extra typed fields on top of the built-in registry.
    #[serde(default)]
    pub fields: HashMap<String, FieldType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub endpoint: String,
    pub business: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValuesConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_min_search_chars")]
    pub min_search_chars: usize,
}

impl Default for ValuesConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            min_search_chars: default_min_search_chars(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Builds a config purely from the environment, for runs without a file.
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var(API_URL_ENV)
            .with_context(|| format!("{} must be set when no config file exists", API_URL_ENV))?;
        let business = std::env::var(BUSINESS_ENV)
            .with_context(|| format!("{} must be set when no config file exists", BUSINESS_ENV))?;
        Ok(Self {
            api: ApiConfig {
                endpoint,
                business,
                timeout_seconds: default_timeout(),
            },
            values: ValuesConfig::default(),
            fields: HashMap::new(),
        })
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(API_URL_ENV) {
            self.api.endpoint = endpoint;
        }
        if let Ok(business) = std::env::var(BUSINESS_ENV) {
            self.api.business = business;
        }
    }

    pub fn registry(&self) -> FieldRegistry {
        FieldRegistry::with_overrides(self.fields.iter().map(|(k, v)| (k.clone(), *v)))
    }
}

// Default functions
fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> u32 {
    50
}

fn default_min_search_chars() -> usize {
    3
}
