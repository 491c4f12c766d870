// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::fetch::DEFAULT_USER_AGENT;

pub const ENV_CONFIG_PATH: &str = "AGGREGATOR_CONFIG_PATH";
pub const ENV_DB_PATH: &str = "CATALOG_DB_PATH";

fn default_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_min_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    3000
}
fn default_true() -> bool {
    true
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/catalog.sqlite")
}
fn default_adapter_timeout_secs() -> u64 {
    120
}
fn default_curated_path() -> PathBuf {
    PathBuf::from("data/curated_internships.txt")
}
fn default_linkedin_keywords() -> String {
    "Software Engineer Intern".to_string()
}
fn default_linkedin_location() -> String {
    "India".to_string()
}
fn default_linkedin_geo_id() -> String {
    "102713980".to_string()
}
fn default_unstop_per_page() -> u32 {
    20
}
fn default_mlh_season() -> String {
    "2025".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout. Every upstream call carries one.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolitenessConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound for one adapter's `collect()`; overruns count as failed.
    #[serde(default = "default_adapter_timeout_secs")]
    pub adapter_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_secs: default_adapter_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_curated_path")]
    pub curated_path: PathBuf,
    #[serde(default = "default_linkedin_keywords")]
    pub linkedin_keywords: String,
    #[serde(default = "default_linkedin_location")]
    pub linkedin_location: String,
    #[serde(default = "default_linkedin_geo_id")]
    pub linkedin_geo_id: String,
    #[serde(default = "default_unstop_per_page")]
    pub unstop_per_page: u32,
    #[serde(default = "default_mlh_season")]
    pub mlh_season: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            curated_path: default_curated_path(),
            linkedin_keywords: default_linkedin_keywords(),
            linkedin_location: default_linkedin_location(),
            linkedin_geo_id: default_linkedin_geo_id(),
            unstop_per_page: default_unstop_per_page(),
            mlh_season: default_mlh_season(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks:
    /// 1) $AGGREGATOR_CONFIG_PATH (must exist)
    /// 2) config/aggregator.toml
    /// 3) config/aggregator.json
    /// 4) built-in defaults
    ///
    /// `$CATALOG_DB_PATH` overrides the store path in every case.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/aggregator.toml");
            let json_p = PathBuf::from("config/aggregator.json");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else if json_p.exists() {
                Self::load_from(&json_p)?
            } else {
                Self::default()
            }
        };

        if let Ok(db) = std::env::var(ENV_DB_PATH) {
            if !db.trim().is_empty() {
                cfg.store.path = PathBuf::from(db.trim());
            }
        }
        Ok(cfg)
    }

    /// Repair values that would make the pipeline misbehave.
    pub fn sanitized(mut self) -> Self {
        if self.http.timeout_secs == 0 {
            self.http.timeout_secs = default_timeout_secs();
        }
        if self.http.user_agent.trim().is_empty() {
            self.http.user_agent = default_user_agent();
        }
        if self.politeness.min_delay_ms > self.politeness.max_delay_ms {
            // swap to keep a valid interval
            std::mem::swap(
                &mut self.politeness.min_delay_ms,
                &mut self.politeness.max_delay_ms,
            );
        }
        if self.pipeline.adapter_timeout_secs == 0 {
            self.pipeline.adapter_timeout_secs = default_adapter_timeout_secs();
        }
        if self.sources.unstop_per_page == 0 {
            self.sources.unstop_per_page = default_unstop_per_page();
        }
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.adapter_timeout_secs)
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        // Unknown extension: JSON starts with '{', anything else is treated as TOML.
        _ if s.trim_start().starts_with('{') => Ok(serde_json::from_str(s)?),
        _ => Ok(toml::from_str(s)?),
    }
}
