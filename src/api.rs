use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::ingest::fetch::Fetcher;
use crate::ingest::pipeline::{run_all, Pipeline, RunSummary};
use crate::ingest::providers::{hackathons_registry, jobs_registry};
use crate::ingest::store::CatalogStore;
use crate::ingest::types::{Category, HackathonListing, JobPosting};
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<Pipeline<JobPosting>>,
    pub hackathons: Arc<Pipeline<HackathonListing>>,
    pub store: Arc<dyn CatalogStore>,
}

impl AppState {
    /// Wire both registries from config against one fetcher and one store.
    pub fn from_config(
        cfg: &AppConfig,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn CatalogStore>,
    ) -> Self {
        let jobs = Pipeline::new(jobs_registry(&cfg.sources, fetcher.clone()), store.clone())
            .with_timeout(cfg.adapter_timeout());
        let hackathons = Pipeline::new(hackathons_registry(&cfg.sources, fetcher), store.clone())
            .with_timeout(cfg.adapter_timeout());
        Self {
            jobs: Arc::new(jobs),
            hackathons: Arc::new(hackathons),
            store,
        }
    }
}

pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/scrape/jobs", post(scrape_jobs))
        .route("/api/scrape/hackathons", post(scrape_hackathons))
        .route("/api/scrape/all", post(scrape_all))
        .route("/api/stats", get(stats))
        .with_state(state);

    let app = match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    };
    app.layer(CorsLayer::very_permissive())
}

/// Always sent with 200: partial scraper breakage is reported in `message`, not the status.
#[derive(Debug, Serialize)]
pub struct ScrapeResp {
    pub status: &'static str,
    pub message: String,
    pub summaries: Vec<RunSummary>,
}

impl ScrapeResp {
    fn from_runs(what: &str, runs: Result<Vec<RunSummary>, tokio::task::JoinError>) -> Self {
        match runs {
            Ok(summaries) => Self {
                status: "success",
                message: summaries
                    .iter()
                    .map(RunSummary::message)
                    .collect::<Vec<_>>()
                    .join("; "),
                summaries,
            },
            Err(e) => {
                tracing::error!(error = %e, what, "pipeline task aborted");
                Self {
                    status: "success",
                    message: format!("{what} scraping failed: {e}"),
                    summaries: Vec::new(),
                }
            }
        }
    }
}

async fn scrape_jobs(State(state): State<AppState>) -> Json<ScrapeResp> {
    let pipeline = state.jobs.clone();
    let res = tokio::spawn(async move { vec![pipeline.run().await] }).await;
    Json(ScrapeResp::from_runs("jobs", res))
}

async fn scrape_hackathons(State(state): State<AppState>) -> Json<ScrapeResp> {
    let pipeline = state.hackathons.clone();
    let res = tokio::spawn(async move { vec![pipeline.run().await] }).await;
    Json(ScrapeResp::from_runs("hackathons", res))
}

async fn scrape_all(State(state): State<AppState>) -> Json<ScrapeResp> {
    let (jobs, hackathons) = (state.jobs.clone(), state.hackathons.clone());
    let res = tokio::spawn(async move {
        let (j, h) = run_all(&jobs, &hackathons).await;
        vec![j, h]
    })
    .await;
    Json(ScrapeResp::from_runs("all", res))
}

#[derive(Debug, Serialize)]
struct CategoryStats {
    total: usize,
    by_source: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
struct StatsResp {
    jobs: CategoryStats,
    hackathons: CategoryStats,
}

async fn category_stats(
    store: &dyn CatalogStore,
    category: Category,
) -> anyhow::Result<CategoryStats> {
    Ok(CategoryStats {
        total: store.count(category).await?,
        by_source: store.counts_by_source(category).await?.into_iter().collect(),
    })
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResp>, (StatusCode, String)> {
    let store = state.store.as_ref();
    let read = async {
        Ok::<_, anyhow::Error>(StatsResp {
            jobs: category_stats(store, Category::Jobs).await?,
            hackathons: category_stats(store, Category::Hackathons).await?,
        })
    };
    read.await.map(Json).map_err(|e| {
        tracing::error!(error = ?e, "stats query failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
    })
}
