//! CLI Configuration

use anyhow::{anyhow, Context, Result};
use portal_core::{Credentials, PortalConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".itsm-portal";

/// Keys accepted by `config set|get`.
pub const KEYS: &[&str] = &["base_url", "username", "password", "proxy_url", "submitted_by", "storage_dir"];

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub proxy_url: Option<String>,
    pub submitted_by: Option<String>,
    pub storage_dir: Option<String>,
}

impl Config {
    pub fn load(profile: Option<&str>) -> Result<Self> {
        Self::load_from(&Self::config_path(profile)?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, profile: Option<&str>) -> Result<PathBuf> {
        let path = Self::config_path(profile)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))
    }

    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        *self.slot(key)? = Some(value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<&str>> {
        Ok(match key {
            "base_url" => self.base_url.as_deref(),
            "username" => self.username.as_deref(),
            "password" => self.password.as_deref(),
            "proxy_url" => self.proxy_url.as_deref(),
            "submitted_by" => self.submitted_by.as_deref(),
            "storage_dir" => self.storage_dir.as_deref(),
            _ => return Err(unknown_key(key)),
        })
    }

    /// Value for display; secrets are masked.
    pub fn display(&self, key: &str) -> Result<String> {
        Ok(match self.get(key)? {
            Some(value) if key == "password" => mask(value),
            Some(value) => value.to_string(),
            None => "(not set)".to_string(),
        })
    }

    fn slot(&mut self, key: &str) -> Result<&mut Option<String>> {
        Ok(match key {
            "base_url" => &mut self.base_url,
            "username" => &mut self.username,
            "password" => &mut self.password,
            "proxy_url" => &mut self.proxy_url,
            "submitted_by" => &mut self.submitted_by,
            "storage_dir" => &mut self.storage_dir,
            _ => return Err(unknown_key(key)),
        })
    }

    /// Ledger directory, `~/.itsm-portal/storage` unless configured.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(home()?.join(CONFIG_DIR).join("storage")),
        }
    }

    fn config_path(profile: Option<&str>) -> Result<PathBuf> {
        let filename = match profile {
            Some(p) => format!("config.{}.toml", p),
            None => "config.toml".to_string(),
        };
        Ok(home()?.join(CONFIG_DIR).join(filename))
    }
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow!("Unknown config key: {} (expected one of {})", key, KEYS.join(", "))
}

fn home() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| anyhow!("Cannot find home directory"))
}

pub fn mask(secret: &str) -> String {
    let shown: String = secret.chars().take(2).collect();
    format!("{}****", shown)
}

/// Connection settings given on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub proxy_url: Option<String>,
    pub submitted_by: Option<String>,
}

/// Flags win over the profile file, which wins over the remaining
/// environment settings in `env`.
pub fn merge(env: PortalConfig, file: &Config, flags: Overrides) -> PortalConfig {
    let trim = |url: String| url.trim_end_matches('/').to_string();
    let username = flags.username.or_else(|| file.username.clone());
    let password = flags.password.or_else(|| file.password.clone());

    let mut merged = env;
    if let (Some(u), Some(p)) = (username, password) {
        merged.credentials = Some(Credentials::new(u, p));
    }
    if let Some(url) = flags.base_url.or_else(|| file.base_url.clone()) {
        merged.base_url = Some(trim(url));
    }
    if let Some(url) = flags.proxy_url.or_else(|| file.proxy_url.clone()) {
        merged.proxy_url = Some(trim(url));
    }
    if let Some(name) = flags.submitted_by.or_else(|| file.submitted_by.clone()) {
        merged.submitted_by = Some(name);
    }
    merged
}
