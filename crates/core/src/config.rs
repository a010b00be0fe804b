use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrylensError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    Memory,
    Backend,
}

impl FromStr for StoreMode {
    type Err = TrylensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "in-process" => Ok(Self::Memory),
            "backend" | "external" => Ok(Self::Backend),
            _ => Err(TrylensError::Config(format!("unknown store mode: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub http_addr: String,
    pub store_mode: StoreMode,
    pub backend_endpoint: String,
    pub fetch_initial_backoff: Duration,
    pub fetch_max_backoff: Duration,
    pub fetch_budget: Duration,
    pub memory_span_cap: usize,
    pub allow_namespaces: Vec<String>,
    pub retention_ttl: Duration,
    pub retention_max_tries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:1879".to_string(),
            store_mode: StoreMode::Memory,
            backend_endpoint: "http://127.0.0.1:3200".to_string(),
            fetch_initial_backoff: Duration::from_millis(250),
            fetch_max_backoff: Duration::from_secs(2),
            fetch_budget: Duration::from_secs(8),
            memory_span_cap: 4096,
            allow_namespaces: Vec::new(),
            retention_ttl: Duration::from_secs(60 * 60),
            retention_max_tries: 1024,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides();
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    http_addr: Option<String>,
    store_mode: Option<String>,
    backend_endpoint: Option<String>,
    fetch_initial_backoff: Option<String>,
    fetch_max_backoff: Option<String>,
    fetch_budget: Option<String>,
    memory_span_cap: Option<usize>,
    allow_namespaces: Option<String>,
    retention_ttl: Option<String>,
    retention_max_tries: Option<usize>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TRYLENS_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("trylens/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| TrylensError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| TrylensError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> ConfigOverrides {
    ConfigOverrides {
        http_addr: env::var("TRYLENS_HTTP_ADDR").ok(),
        store_mode: env::var("TRYLENS_STORE_MODE").ok(),
        backend_endpoint: env::var("TRYLENS_BACKEND_ENDPOINT").ok(),
        fetch_initial_backoff: env::var("TRYLENS_FETCH_INITIAL_BACKOFF").ok(),
        fetch_max_backoff: env::var("TRYLENS_FETCH_MAX_BACKOFF").ok(),
        fetch_budget: env::var("TRYLENS_FETCH_BUDGET").ok(),
        memory_span_cap: env::var("TRYLENS_MEMORY_SPAN_CAP")
            .ok()
            .and_then(|v| v.parse().ok()),
        allow_namespaces: env::var("TRYLENS_ALLOW_NAMESPACES").ok(),
        retention_ttl: env::var("TRYLENS_RETENTION_TTL").ok(),
        retention_max_tries: env::var("TRYLENS_RETENTION_MAX_TRIES")
            .ok()
            .and_then(|v| v.parse().ok()),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.http_addr {
        cfg.http_addr = v;
    }
    if let Some(v) = overrides.store_mode {
        cfg.store_mode = v
            .parse()
            .map_err(|e| TrylensError::Config(format!("bad store_mode in {source}: {e}")))?;
    }
    if let Some(v) = overrides.backend_endpoint {
        cfg.backend_endpoint = v;
    }
    if let Some(v) = overrides.fetch_initial_backoff {
        cfg.fetch_initial_backoff = parse_duration(&v, "fetch_initial_backoff", source)?;
    }
    if let Some(v) = overrides.fetch_max_backoff {
        cfg.fetch_max_backoff = parse_duration(&v, "fetch_max_backoff", source)?;
    }
    if let Some(v) = overrides.fetch_budget {
        cfg.fetch_budget = parse_duration(&v, "fetch_budget", source)?;
    }
    if let Some(v) = overrides.memory_span_cap {
        cfg.memory_span_cap = v;
    }
    if let Some(v) = overrides.allow_namespaces {
        cfg.allow_namespaces = parse_namespaces(&v);
    }
    if let Some(v) = overrides.retention_ttl {
        cfg.retention_ttl = parse_duration(&v, "retention_ttl", source)?;
    }
    if let Some(v) = overrides.retention_max_tries {
        cfg.retention_max_tries = v;
    }
    Ok(())
}

fn parse_duration(raw: &str, field: &str, source: &str) -> Result<Duration> {
    humantime::parse_duration(raw)
        .map_err(|e| TrylensError::Config(format!("bad {field} in {source}: {e} (value={raw})")))
}

fn parse_namespaces(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
