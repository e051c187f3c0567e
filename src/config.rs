use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "ANSWERLY";
const DEFAULT_ASSET_BASE_URL: &str = "https://yuanzhida-cos-1352975306.cos.ap-beijing.myqcloud.com/";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnv {
    #[default]
    Dev,
    Test,
    Prod,
}

impl RuntimeEnv {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "develop" => Some(RuntimeEnv::Dev),
            "test" | "trial" => Some(RuntimeEnv::Test),
            "prod" | "release" => Some(RuntimeEnv::Prod),
            _ => None,
        }
    }

    pub fn profile(&self) -> EnvProfile {
        let base_url = match self {
            RuntimeEnv::Dev => "http://192.168.6.188:8000",
            RuntimeEnv::Test => "https://test-api.example.com",
            RuntimeEnv::Prod => "https://api.example.com",
        };
        EnvProfile {
            env: *self,
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(10),
            asset_base_url: Some(DEFAULT_ASSET_BASE_URL.to_string()),
        }
    }
}

/// Effective endpoint settings for one environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvProfile {
    pub env: RuntimeEnv,
    pub base_url: String,
    pub timeout: Duration,
    pub asset_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// Unset means the file or environment never chose one; the profile falls back to dev.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<RuntimeEnv>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Overrides on top of the environment profile. Empty values defer to the profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub asset_base_url: String,
    #[serde(default)]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn profile(&self) -> EnvProfile {
        let mut profile = self.runtime_env().profile();
        if !self.api.base_url.trim().is_empty() {
            profile.base_url = self.api.base_url.trim().to_string();
        }
        if let Some(timeout) = self.api.timeout {
            profile.timeout = timeout;
        }
        if !self.api.asset_base_url.trim().is_empty() {
            profile.asset_base_url = Some(self.api.asset_base_url.trim().to_string());
        }
        profile
    }

    pub fn runtime_env(&self) -> RuntimeEnv {
        self.env.unwrap_or_default()
    }

    pub fn user_agent(&self) -> String {
        if self.api.user_agent.trim().is_empty() {
            format!("answerly/{}", crate::VERSION)
        } else {
            self.api.user_agent.clone()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix));
    validate_urls(&cfg)?;

    Ok(cfg)
}

fn validate_urls(cfg: &Config) -> Result<()> {
    for (field, value) in [
        ("api.base_url", &cfg.api.base_url),
        ("api.asset_base_url", &cfg.api.asset_base_url),
    ] {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        url::Url::parse(value).with_context(|| format!("Invalid {field}: {value}"))?;
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if other.env.is_some() {
        base.env = other.env;
    }
    if !other.api.base_url.is_empty() {
        base.api.base_url = other.api.base_url;
    }
    if other.api.timeout.is_some() {
        base.api.timeout = other.api.timeout;
    }
    if !other.api.asset_base_url.is_empty() {
        base.api.asset_base_url = other.api.asset_base_url;
    }
    if !other.api.user_agent.is_empty() {
        base.api.user_agent = other.api.user_agent;
    }
    if other.storage.path.is_some() {
        base.storage.path = other.storage.path;
    }
    base
}

fn load_env(prefix: &str) -> Config {
    let upper_prefix = format!("{}_", prefix.to_uppercase());
    let map: HashMap<String, String> = env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(&upper_prefix)
                .map(|stripped| (stripped.to_ascii_lowercase().replace("__", "."), value))
        })
        .collect();

    let mut cfg = Config::default();
    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }
    cfg
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "env" => {
            if let Some(env) = RuntimeEnv::parse(&value) {
                cfg.env = Some(env);
            }
        }
        "api.base_url" => cfg.api.base_url = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = Some(duration);
            }
        }
        "api.asset_base_url" => cfg.api.asset_base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "storage.path" => cfg.storage.path = Some(PathBuf::from(value)),
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("answerly").join("config.yaml"))
}
