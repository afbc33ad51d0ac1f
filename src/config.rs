use crate::storage::Storage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const BACKEND_URL_ENV: &str = "SAHAYAK_BACKEND_URL";
pub const ANON_KEY_ENV: &str = "SAHAYAK_ANON_KEY";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the backend project, e.g. `https://xyz.supabase.co`.
    pub backend_url: String,
    /// Public (anon) API key sent with every request.
    pub anon_key: String,
    /// Per-request timeout, humantime syntax (`30s`, `1m`).
    pub request_timeout: String,
    /// How long a notification stays on screen.
    pub notice_ttl: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            anon_key: String::new(),
            request_timeout: "30s".to_string(),
            notice_ttl: "4s".to_string(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.request_timeout)
            .with_context(|| format!("Invalid request_timeout '{}'", self.request_timeout))
    }

    pub fn notice_ttl(&self) -> Result<Duration> {
        humantime::parse_duration(&self.notice_ttl)
            .with_context(|| format!("Invalid notice_ttl '{}'", self.notice_ttl))
    }

    fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            self.backend_url = url;
        }
        if let Ok(key) = std::env::var(ANON_KEY_ENV) {
            self.anon_key = key;
        }
        self
    }

    pub fn ensure_backend(&self) -> Result<()> {
        if self.backend_url.trim().is_empty() || self.anon_key.trim().is_empty() {
            anyhow::bail!(
                "Backend is not configured. Set backend_url and anon_key in ~/.sahayak/config.json or export {} and {}.",
                BACKEND_URL_ENV,
                ANON_KEY_ENV
            );
        }
        Ok(())
    }
}

pub fn load_config() -> Result<Config> {
    let path = Storage::get_base_dir()?.join("config.json");
    Ok(load_from(&path)?.apply_env())
}

fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let config = Config::default();
        let data = serde_json::to_string_pretty(&config)?;
        fs::write(path, data)?;
        return Ok(config);
    }

    let data = fs::read_to_string(path)?;
    let config = serde_json::from_str(&data)
        .with_context(|| format!("Malformed config file {}", path.display()))?;
    Ok(config)
}
