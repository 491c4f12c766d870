// src/ingest/providers/internshala.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::ingest::extract::{
    element_text, has_class, location_from_slug, resolve_url, SelectorChain,
};
use crate::ingest::fetch::{fetch_body, FetchRequest, Fetcher};
use crate::ingest::types::{Fault, Harvest, JobKind, JobPosting, Listing, SourceAdapter};

pub const SOURCE: &str = "Internshala";
pub const BASE_URL: &str = "https://internshala.com";
pub const INTERNSHIPS_URL: &str =
    "https://internshala.com/internships/computer-science-internship/";
pub const JOBS_URL: &str = "https://internshala.com/jobs/computer-science-jobs/";

static CARDS: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&["div.individual_internship", "div[internshipid]", "div.internship_meta"])
});
static TITLE: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["h3.job-internship-name", ".job-title-href", "h3"]));
static DETAIL_LINK: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[
        "a.job-title-href",
        "a[href*='/internship/detail/']",
        "a[href*='/job/detail/']",
        "a[href*='/detail/']",
    ])
});
static ANY_LINK: Lazy<SelectorChain> = Lazy::new(|| SelectorChain::new(&["a[href]"]));
static COMPANY: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["p.company-name", "div.company_name", ".company-name"]));
static LOCATION: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["div#location_names", ".locations", ".location_link"]));
static STIPEND: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["span.stipend", "div.stipend", "span.salary"]));
static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// Internship and fresher-job search result pages.
pub struct InternshalaAdapter {
    fetcher: Arc<dyn Fetcher>,
    targets: Vec<(String, JobKind)>,
}

impl InternshalaAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_targets(
            fetcher,
            vec![
                (INTERNSHIPS_URL.to_string(), JobKind::Internship),
                (JOBS_URL.to_string(), JobKind::Job),
            ],
        )
    }

    pub fn with_targets(fetcher: Arc<dyn Fetcher>, targets: Vec<(String, JobKind)>) -> Self {
        Self { fetcher, targets }
    }
}

#[async_trait]
impl SourceAdapter<JobPosting> for InternshalaAdapter {
    async fn collect(&self) -> Result<Harvest<JobPosting>> {
        let today = chrono::Local::now().date_naive();
        let mut harvest = Harvest::new();
        for (url, kind) in &self.targets {
            let req = FetchRequest::html(url.as_str());
            let Some(body) = fetch_body(self.fetcher.as_ref(), SOURCE, &req, &mut harvest).await
            else {
                continue;
            };
            let page = parse_listing(&body, *kind, today);
            tracing::info!(
                adapter = SOURCE,
                url = %url,
                records = page.records.len(),
                faults = page.faults.len(),
                "parsed listing page"
            );
            harvest.merge(page);
        }
        Ok(harvest)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}

/// Parse one search result page into postings of the given kind.
pub fn parse_listing(html: &str, kind: JobKind, today: NaiveDate) -> Harvest<JobPosting> {
    let doc = Html::parse_document(html);
    let mut harvest = Harvest::new();

    let cards = CARDS.containers(&doc);
    if cards.is_empty() {
        tracing::warn!(adapter = SOURCE, "no listing containers matched");
        harvest.fault(Fault::ShapeDrift {
            detail: "no internship containers on page".into(),
        });
        return harvest;
    }

    for card in cards {
        // promoted alert boxes share the container class
        if has_class(&card, "result-alert") {
            continue;
        }
        match parse_card(card, kind, today) {
            Ok(job) => harvest.push(job),
            Err(e) => {
                tracing::debug!(adapter = SOURCE, error = %e, "skipping listing card");
                harvest.fault(Fault::Item {
                    detail: format!("{e:#}"),
                });
            }
        }
    }
    harvest
}

fn parse_card(card: ElementRef<'_>, kind: JobKind, today: NaiveDate) -> Result<JobPosting> {
    let title_el = TITLE.element(card);
    let title = TITLE
        .text(card)
        .or_else(|| DETAIL_LINK.text(card))
        .context("card has no title")?;

    let href = title_el
        .and_then(|el| {
            el.value()
                .attr("href")
                .map(str::to_string)
                .or_else(|| ANY_LINK.attr(el, "href"))
        })
        .or_else(|| DETAIL_LINK.attr(card, "href"))
        .or_else(|| card.value().attr("data-href").map(str::to_string))
        .with_context(|| format!("card '{title}' has no detail link"))?;
    let url = resolve_url(BASE_URL, &href).with_context(|| format!("unusable link '{href}'"))?;

    let company = COMPANY.text(card).unwrap_or_else(|| "Unknown".to_string());

    let location = LOCATION
        .text(card)
        .or_else(|| location_from_slug(&url))
        .or_else(|| location_from_links(card, &title, &company))
        .unwrap_or_else(|| "India".to_string());

    let salary_range = STIPEND.text(card).unwrap_or_else(|| "N/A".to_string());

    Ok(JobPosting {
        title,
        company,
        location,
        kind,
        salary_range,
        url,
        source: SOURCE.to_string(),
        posted_at: today,
    }
    .normalize())
}

/// Last resort: a short, digit-free link label that is not the title or company.
fn location_from_links(card: ElementRef<'_>, title: &str, company: &str) -> Option<String> {
    card.select(&ANCHORS)
        .map(|a| element_text(&a))
        .find(|text| {
            !text.is_empty()
                && text != title
                && text != company
                && text != "View Details"
                && text.chars().count() < 30
                && !text.chars().any(|c| c.is_ascii_digit())
        })
}
