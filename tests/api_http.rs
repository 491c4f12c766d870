// tests/api_http.rs
//
// HTTP-level tests for the trigger surface without opening sockets.
// The router is exercised directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use opportunity_aggregator::ingest::pipeline::Pipeline;
use opportunity_aggregator::ingest::store::{CatalogStore, MemoryStore};
use opportunity_aggregator::ingest::types::{
    Category, HackathonListing, Harvest, JobKind, JobPosting, RecordRef, SourceAdapter, Tags,
};
use opportunity_aggregator::{router, AppState};

const BODY_LIMIT: usize = 1024 * 1024;

struct OneJob;

#[async_trait]
impl SourceAdapter<JobPosting> for OneJob {
    async fn collect(&self) -> Result<Harvest<JobPosting>> {
        let mut h = Harvest::new();
        h.push(JobPosting {
            title: "Platform Intern".into(),
            company: "Acme".into(),
            location: "Chennai".into(),
            kind: JobKind::Internship,
            salary_range: "N/A".into(),
            url: "https://jobs.test/platform-intern".into(),
            source: "Fixture".into(),
            posted_at: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        });
        Ok(h)
    }

    fn name(&self) -> &'static str {
        "Fixture"
    }
}

struct Panics;

#[async_trait]
impl SourceAdapter<HackathonListing> for Panics {
    async fn collect(&self) -> Result<Harvest<HackathonListing>> {
        panic!("selector table corrupted")
    }

    fn name(&self) -> &'static str {
        "Panics"
    }
}

struct OneHackathon;

#[async_trait]
impl SourceAdapter<HackathonListing> for OneHackathon {
    async fn collect(&self) -> Result<Harvest<HackathonListing>> {
        let mut h = Harvest::new();
        h.push(HackathonListing {
            name: "Build Week".into(),
            organizer: "Guild".into(),
            description: String::new(),
            dates: "TBA".into(),
            location: "Online".into(),
            url: "https://events.test/build-week".into(),
            source: "Board".into(),
            tags: Tags::new(),
            prizes: String::new(),
        });
        Ok(h)
    }

    fn name(&self) -> &'static str {
        "Board"
    }
}

/// Store whose writes blow up, so the pipeline task itself dies.
struct ExplodingStore;

#[async_trait]
impl CatalogStore for ExplodingStore {
    async fn upsert(&self, _record: RecordRef<'_>) -> bool {
        panic!("connection pool poisoned")
    }

    async fn count(&self, _category: Category) -> Result<usize> {
        Ok(0)
    }

    async fn counts_by_source(&self, _category: Category) -> Result<Vec<(String, usize)>> {
        Ok(Vec::new())
    }
}

fn test_router() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn CatalogStore> = store.clone();
    let state = AppState {
        jobs: Arc::new(Pipeline::<JobPosting>::new(vec![Box::new(OneJob)], shared.clone())),
        hackathons: Arc::new(Pipeline::<HackathonListing>::new(
            vec![Box::new(Panics), Box::new(OneHackathon)],
            shared.clone(),
        )),
        store: shared,
    };
    (router(state, None), store)
}

async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::String(
        String::from_utf8_lossy(&bytes).into_owned(),
    ));
    (status, json)
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = test_router();
    let (status, body) = call(app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Json::String("OK".into()));
}

#[tokio::test]
async fn scrape_jobs_reports_summary() {
    let (app, store) = test_router();
    let (status, body) = call(app, "POST", "/api/scrape/jobs").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("jobs scraping completed: 1 of 1 records persisted"));
    let adapters = &body["summaries"][0]["adapters"];
    assert_eq!(adapters[0]["name"], "Fixture");
    assert_eq!(adapters[0]["status"], "Completed");
    assert_eq!(store.jobs().len(), 1);
}

#[tokio::test]
async fn panicking_adapter_is_reported_failed_alongside_the_rest() {
    let (app, store) = test_router();
    let (status, body) = call(app, "POST", "/api/scrape/hackathons").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("hackathons scraping completed: 1 of 1 records persisted"));
    assert!(message.ends_with("(failed: Panics)"));
    let adapters = &body["summaries"][0]["adapters"];
    assert_eq!(adapters[0]["name"], "Panics");
    assert_eq!(adapters[0]["status"], "Failed");
    assert_eq!(adapters[0]["error"], "panicked: selector table corrupted");
    assert_eq!(adapters[1]["name"], "Board");
    assert_eq!(adapters[1]["status"], "Completed");
    assert_eq!(store.hackathons().len(), 1);
}

#[tokio::test]
async fn aborted_pipeline_task_is_still_success_shaped() {
    let shared: Arc<dyn CatalogStore> = Arc::new(ExplodingStore);
    let state = AppState {
        jobs: Arc::new(Pipeline::<JobPosting>::new(vec![Box::new(OneJob)], shared.clone())),
        hackathons: Arc::new(Pipeline::<HackathonListing>::new(Vec::new(), shared.clone())),
        store: shared,
    };
    let (status, body) = call(router(state, None), "POST", "/api/scrape/jobs").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("jobs scraping failed"));
    assert_eq!(body["summaries"], Json::Array(Vec::new()));
}

#[tokio::test]
async fn stats_count_by_source_after_scrape() {
    let (app, _) = test_router();
    let (status, _) = call(app.clone(), "POST", "/api/scrape/jobs").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(app, "GET", "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"]["total"], 1);
    assert_eq!(body["jobs"]["by_source"]["Fixture"], 1);
    assert_eq!(body["hackathons"]["total"], 0);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (app, _) = test_router();
    let (status, _) = call(app, "GET", "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
