// src/ingest/providers/unstop.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::clean_text;
use crate::ingest::fetch::{fetch_body, FetchRequest, Fetcher};
use crate::ingest::types::{
    Fault, HackathonListing, Harvest, JobKind, JobPosting, Listing, SourceAdapter, Tags,
};

pub const SOURCE: &str = "Unstop";
pub const SEARCH_API: &str = "https://unstop.com/api/public/opportunity/search-result";
const SITE: &str = "https://unstop.com";

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    organisation: Option<Organisation>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    is_paid: Option<Value>,
    #[serde(default)]
    filters: Option<Vec<Filter>>,
    #[serde(default)]
    seo_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Organisation {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Filter {
    #[serde(default)]
    name: Option<String>,
}

impl Item {
    fn title(&self) -> Result<String> {
        self.title
            .as_deref()
            .map(clean_text)
            .filter(|t| !t.is_empty())
            .context("item has no title")
    }

    fn url(&self) -> Result<String> {
        let slug = self
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .context("item has no slug")?;
        Ok(format!("{SITE}/{}", slug.trim_start_matches('/')))
    }

    fn organisation(&self) -> String {
        self.organisation
            .as_ref()
            .and_then(|o| o.name.as_deref())
            .map(clean_text)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| SOURCE.to_string())
    }

    fn region_or(&self, default: &str) -> String {
        self.region
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(default)
            .to_string()
    }

    /// "YYYY-MM-DD - YYYY-MM-DD" from whichever bounds are present.
    fn dates(&self) -> String {
        let day = |d: &Option<String>| -> Option<String> {
            d.as_deref()
                .map(|s| s.trim().chars().take(10).collect::<String>())
                .filter(|s| !s.is_empty())
        };
        match (day(&self.start_date), day(&self.end_date)) {
            (Some(s), Some(e)) => format!("{s} - {e}"),
            (Some(d), None) | (None, Some(d)) => d,
            (None, None) => String::new(),
        }
    }

    fn paid(&self) -> bool {
        match &self.is_paid {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|x| x != 0.0),
            Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "yes"),
            _ => false,
        }
    }
}

/// Items under `data.data`. `Err` carries the shape-drift description.
fn result_items(body: &str) -> std::result::Result<Vec<Value>, String> {
    let v: Value = serde_json::from_str(body).map_err(|e| format!("payload is not JSON: {e}"))?;
    match v.pointer("/data/data") {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err("data.data is not a list".to_string()),
        None => Err("payload has no data.data".to_string()),
    }
}

/// Decode each item on its own so one malformed entry never drops the batch.
fn parse_items<R>(body: &str, mut map: impl FnMut(Item) -> Result<R>) -> Harvest<R> {
    let mut harvest = Harvest::new();
    let items = match result_items(body) {
        Ok(items) => items,
        Err(detail) => {
            tracing::warn!(adapter = SOURCE, %detail, "unexpected search payload");
            harvest.fault(Fault::ShapeDrift { detail });
            return harvest;
        }
    };

    for (idx, raw) in items.into_iter().enumerate() {
        let record = serde_json::from_value::<Item>(raw)
            .context("decoding item")
            .and_then(&mut map);
        match record {
            Ok(r) => harvest.push(r),
            Err(e) => {
                tracing::debug!(adapter = SOURCE, idx, error = %e, "skipping item");
                harvest.fault(Fault::Item {
                    detail: format!("item {idx}: {e:#}"),
                });
            }
        }
    }
    harvest
}

pub fn parse_hackathons(body: &str) -> Harvest<HackathonListing> {
    parse_items(body, |item| {
        let name = item.title()?;
        let url = item.url()?;

        let mut tags: Tags = ["Hackathon", SOURCE].into_iter().collect();
        tags.push(if item.paid() { "Paid" } else { "Free" });
        for f in item.filters.iter().flatten() {
            if let Some(n) = f.name.as_deref() {
                tags.push(n);
            }
        }

        let description = item
            .seo_description
            .as_deref()
            .map(clean_text)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "Hackathon on Unstop".to_string());

        Ok(HackathonListing {
            name,
            organizer: item.organisation(),
            description,
            dates: item.dates(),
            location: item.region_or("Online"),
            url,
            source: SOURCE.to_string(),
            tags,
            prizes: "See Details".to_string(),
        }
        .normalize())
    })
}

pub fn parse_jobs(body: &str, today: NaiveDate) -> Harvest<JobPosting> {
    parse_items(body, |item| {
        let title = item.title()?;
        let url = item.url()?;
        let kind = JobKind::from_title(&title, JobKind::Job);
        Ok(JobPosting {
            title,
            company: item.organisation(),
            location: item.region_or("India"),
            kind,
            salary_range: "See Details".to_string(),
            url,
            source: SOURCE.to_string(),
            posted_at: today,
        }
        .normalize())
    })
}

fn search_url(opportunity: &str, per_page: u32) -> String {
    format!("{SEARCH_API}?opportunity={opportunity}&per_page={per_page}&oppstatus=open")
}

async fn fetch_search<R>(
    fetcher: &dyn Fetcher,
    url: &str,
    harvest: &mut Harvest<R>,
) -> Option<String> {
    fetch_body(fetcher, SOURCE, &FetchRequest::json(url), harvest).await
}

/// Open hackathons from the public search API.
pub struct UnstopHackathonsAdapter {
    fetcher: Arc<dyn Fetcher>,
    url: String,
}

impl UnstopHackathonsAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>, per_page: u32) -> Self {
        Self {
            fetcher,
            url: search_url("hackathons", per_page),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SourceAdapter<HackathonListing> for UnstopHackathonsAdapter {
    async fn collect(&self) -> Result<Harvest<HackathonListing>> {
        let mut harvest = Harvest::new();
        if let Some(body) = fetch_search(self.fetcher.as_ref(), &self.url, &mut harvest).await {
            harvest.merge(parse_hackathons(&body));
        }
        tracing::info!(
            adapter = SOURCE,
            kind = "hackathons",
            records = harvest.records.len(),
            "search api parsed"
        );
        Ok(harvest)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}

/// Open jobs from the same search API.
pub struct UnstopJobsAdapter {
    fetcher: Arc<dyn Fetcher>,
    url: String,
}

impl UnstopJobsAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>, per_page: u32) -> Self {
        Self {
            fetcher,
            url: search_url("jobs", per_page),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SourceAdapter<JobPosting> for UnstopJobsAdapter {
    async fn collect(&self) -> Result<Harvest<JobPosting>> {
        let mut harvest = Harvest::new();
        if let Some(body) = fetch_search(self.fetcher.as_ref(), &self.url, &mut harvest).await {
            harvest.merge(parse_jobs(&body, chrono::Local::now().date_naive()));
        }
        tracing::info!(
            adapter = SOURCE,
            kind = "jobs",
            records = harvest.records.len(),
            "search api parsed"
        );
        Ok(harvest)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}
