// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;

pub use crate::api::{router, AppState};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::AppConfig;
use crate::ingest::fetch::HttpFetcher;
use crate::ingest::politeness::{NoDelay, Politeness, RandomDelay};
use crate::ingest::store::SqliteStore;

/// Build live state from config: SQLite catalog, reqwest fetcher, politeness policy.
pub fn build_state(cfg: &AppConfig) -> Result<AppState> {
    let politeness: Arc<dyn Politeness> = if cfg.politeness.enabled {
        Arc::new(RandomDelay::new(
            Duration::from_millis(cfg.politeness.min_delay_ms),
            Duration::from_millis(cfg.politeness.max_delay_ms),
        ))
    } else {
        Arc::new(NoDelay)
    };
    let fetcher = HttpFetcher::new(&cfg.http.user_agent, cfg.http_timeout(), politeness)?;
    let store = SqliteStore::open(&cfg.store.path)?;
    tracing::info!(
        store = %cfg.store.path.display(),
        politeness = cfg.politeness.enabled,
        "catalog ready"
    );
    Ok(AppState::from_config(cfg, Arc::new(fetcher), Arc::new(store)))
}
