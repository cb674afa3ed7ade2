use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,

    // Model artifacts
    pub models_dir: PathBuf,
    pub model_hub_url: String,
    pub model_revision: String,
    pub model_offline: bool,

    // Resource bounds
    pub model_cache_capacity: usize,
    pub max_concurrent_translations: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Server
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 5050)?,
            api_key: std::env::var("API_KEY").ok().filter(|key| !key.is_empty()),

            // Model artifacts
            models_dir: std::env::var("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            model_hub_url: std::env::var("MODEL_HUB_URL")
                .unwrap_or_else(|_| "https://huggingface.co".to_string()),
            model_revision: std::env::var("MODEL_REVISION").unwrap_or_else(|_| "main".to_string()),
            model_offline: parse_bool("MODEL_OFFLINE")?,

            // Resource bounds
            model_cache_capacity: parse_count("MODEL_CACHE_CAPACITY", 16)?,
            max_concurrent_translations: parse_count("MAX_CONCURRENT_TRANSLATIONS", 4)?,
        })
    }

    /// Address the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse an optional variable, failing if it is set but invalid.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got {:?}", name, value)),
        Err(_) => Ok(default),
    }
}

/// Like `parse_var`, but zero is rejected.
fn parse_count(name: &str, default: usize) -> Result<usize> {
    let value = parse_var(name, default)?;
    if value == 0 {
        bail!("{} must be at least 1", name);
    }
    Ok(value)
}

fn parse_bool(name: &str) -> Result<bool> {
    match std::env::var(name) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            other => bail!("{} must be true or false, got {:?}", name, other),
        },
        Err(_) => Ok(false),
    }
}
