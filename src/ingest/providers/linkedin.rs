// src/ingest/providers/linkedin.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html};
use url::Url;

use crate::ingest::extract::{resolve_url, strip_query, SelectorChain};
use crate::ingest::fetch::{fetch_body, FetchRequest, Fetcher};
use crate::ingest::types::{Fault, Harvest, JobKind, JobPosting, Listing, SourceAdapter};

pub const SOURCE: &str = "LinkedIn";
pub const SEARCH_URL: &str = "https://www.linkedin.com/jobs/search";

static CARDS: Lazy<SelectorChain> = Lazy::new(|| SelectorChain::new(&["div.base-card", "li"]));
static TITLE: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["h3.base-search-card__title", "h3"]));
static COMPANY: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&["h4.base-search-card__subtitle", "h4", "a.hidden-nested-link"])
});
static LOCATION: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&["span.job-search-card__location", ".job-search-card__location"])
});
static LINK: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&["a.base-card__full-link", "a[href*='/jobs/view/']"])
});
static POSTED: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[
        "time.job-search-card__listdate",
        "time.job-search-card__listdate--new",
        "time[datetime]",
    ])
});

/// Public keyword/geography pair queried on the guest search page.
#[derive(Debug, Clone)]
pub struct GuestQuery {
    pub keywords: String,
    pub location: String,
    pub geo_id: String,
}

/// Guest (logged-out) job search.
pub struct LinkedInAdapter {
    fetcher: Arc<dyn Fetcher>,
    query: GuestQuery,
}

impl LinkedInAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>, query: GuestQuery) -> Self {
        Self { fetcher, query }
    }

    pub fn search_url(&self) -> Result<String> {
        let url = Url::parse_with_params(
            SEARCH_URL,
            &[
                ("keywords", self.query.keywords.as_str()),
                ("location", self.query.location.as_str()),
                ("geoId", self.query.geo_id.as_str()),
                ("trk", "public_jobs_jobs-search-bar_search-submit"),
                ("position", "1"),
                ("pageNum", "0"),
            ],
        )
        .context("building linkedin guest search url")?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl SourceAdapter<JobPosting> for LinkedInAdapter {
    async fn collect(&self) -> Result<Harvest<JobPosting>> {
        let url = self.search_url()?;
        let mut harvest = Harvest::new();
        let req = FetchRequest::html(url.as_str());
        if let Some(body) = fetch_body(self.fetcher.as_ref(), SOURCE, &req, &mut harvest).await {
            let today = chrono::Local::now().date_naive();
            harvest.merge(parse_results(&body, today));
        }
        tracing::info!(adapter = SOURCE, records = harvest.records.len(), "guest search parsed");
        Ok(harvest)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}

pub fn parse_results(html: &str, today: NaiveDate) -> Harvest<JobPosting> {
    let doc = Html::parse_document(html);
    let mut harvest = Harvest::new();

    let cards = CARDS.containers(&doc);
    if cards.is_empty() {
        tracing::warn!(adapter = SOURCE, "no result cards matched");
        harvest.fault(Fault::ShapeDrift {
            detail: "no job cards on guest search page".into(),
        });
        return harvest;
    }

    for card in cards {
        // the generic `li` fallback also matches navigation items; those have no title
        let Some(title) = TITLE.text(card) else {
            continue;
        };
        match parse_card(card, title, today) {
            Ok(job) => harvest.push(job),
            Err(e) => {
                tracing::debug!(adapter = SOURCE, error = %e, "skipping result card");
                harvest.fault(Fault::Item {
                    detail: format!("{e:#}"),
                });
            }
        }
    }
    harvest
}

fn parse_card(card: ElementRef<'_>, title: String, today: NaiveDate) -> Result<JobPosting> {
    let href = LINK
        .attr(card, "href")
        .with_context(|| format!("card '{title}' has no job link"))?;
    // tracking params differ per request; the bare path is the stable key
    let url = resolve_url("https://www.linkedin.com", &href)
        .map(|u| strip_query(&u))
        .with_context(|| format!("unusable link '{href}'"))?;

    let company = COMPANY.text(card).unwrap_or_else(|| "Unknown".to_string());
    let location = LOCATION.text(card).unwrap_or_else(|| "India".to_string());
    let posted_at = POSTED
        .attr(card, "datetime")
        .and_then(|d| NaiveDate::parse_from_str(d.get(..10).unwrap_or(d.as_str()), "%Y-%m-%d").ok())
        .unwrap_or(today);
    let kind = JobKind::from_title(&title, JobKind::FullTime);

    Ok(JobPosting {
        title,
        company,
        location,
        kind,
        salary_range: "N/A".to_string(),
        url,
        source: SOURCE.to_string(),
        posted_at,
    }
    .normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fetch::FixtureFetcher;

    #[test]
    fn search_url_encodes_query() {
        let a = LinkedInAdapter::new(
            Arc::new(FixtureFetcher::new()),
            GuestQuery {
                keywords: "Software Engineer Intern".into(),
                location: "India".into(),
                geo_id: "102713980".into(),
            },
        );
        let url = a.search_url().unwrap();
        assert!(url.starts_with(
            "https://www.linkedin.com/jobs/search?keywords=Software+Engineer+Intern&location=India&geoId=102713980"
        ));
    }

    #[test]
    fn bad_datetime_falls_back_to_today() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let html = r#"<div class="base-card">
            <a class="base-card__full-link" href="https://in.linkedin.com/jobs/view/x-1?refId=9"></a>
            <h3 class="base-search-card__title">Rust Engineer</h3>
            <time class="job-search-card__listdate" datetime="last week"></time></div>"#;
        let h = parse_results(html, today);
        assert_eq!(h.records[0].posted_at, today);
        assert_eq!(h.records[0].kind, JobKind::FullTime);
        assert_eq!(h.records[0].company, "Unknown");
        assert_eq!(h.records[0].url, "https://in.linkedin.com/jobs/view/x-1");
    }
}
