use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {}; create it before starting the bot", .0.display())]
    Missing(PathBuf),
    #[error("required setting `{0}` is empty")]
    EmptyPath(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub mod_dir: PathBuf,
    pub profile_dir: PathBuf,
    pub steam_dir: PathBuf,
    #[serde(default = "default_user_cooldown")]
    pub user_cooldown_secs: u64,
    #[serde(default = "default_refresh_cooldown")]
    pub refresh_cooldown_secs: u64,
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
    #[serde(default)]
    pub lock_file: Option<PathBuf>,
}

impl BotConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        if !path.exists() {
            return Err(ConfigError::Missing(path).into());
        }
        let raw = fs::read_to_string(&path).context("read config")?;
        let config: BotConfig = serde_json::from_str(&raw).context("parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.mod_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("mod_dir").into());
        }
        if self.profile_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("profile_dir").into());
        }
        if self.steam_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("steam_dir").into());
        }
        Ok(())
    }

    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache_file {
            Some(path) => Ok(path.clone()),
            None => Ok(base_data_dir()?.join("modcache.json")),
        }
    }

    pub fn lock_path(&self) -> Result<PathBuf> {
        match &self.lock_file {
            Some(path) => Ok(path.clone()),
            None => Ok(base_data_dir()?.join("convoybot.lock")),
        }
    }
}

fn default_user_cooldown() -> u64 {
    30
}

fn default_refresh_cooldown() -> u64 {
    120
}

fn default_config_path() -> Result<PathBuf> {
    Ok(base_data_dir()?.join("config.json"))
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("convoybot"))
}
