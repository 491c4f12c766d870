// src/ingest/providers/aicte.rs
use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::ingest::extract::{element_text, resolve_url};
use crate::ingest::fetch::{fetch_body, FetchRequest, Fetcher};
use crate::ingest::types::{Fault, Harvest, JobKind, JobPosting, Listing, SourceAdapter};

pub const SOURCE: &str = "AICTE";
pub const PORTAL_URL: &str = "https://internship.aicte-india.org/";

/// The link heuristic is noisy; keep at most this many per run.
pub const MAX_RESULTS: usize = 10;
const MIN_TEXT_CHARS: usize = 10;
const MAX_TEXT_CHARS: usize = 100;

static LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Government internship portal. Its certificate chain does not validate,
/// so requests skip verification.
pub struct AicteAdapter {
    fetcher: Arc<dyn Fetcher>,
    url: String,
}

impl AicteAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_url(fetcher, PORTAL_URL)
    }

    pub fn with_url(fetcher: Arc<dyn Fetcher>, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter<JobPosting> for AicteAdapter {
    async fn collect(&self) -> Result<Harvest<JobPosting>> {
        let mut harvest = Harvest::new();
        let req = FetchRequest::html(self.url.as_str()).insecure();
        if let Some(body) = fetch_body(self.fetcher.as_ref(), SOURCE, &req, &mut harvest).await {
            harvest.merge(parse_portal(&body, &self.url, chrono::Local::now().date_naive()));
        }
        Ok(harvest)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}

/// Anchor text that reads like an opportunity rather than navigation chrome.
pub fn looks_like_opportunity(text: &str) -> bool {
    let n = text.chars().count();
    n > MIN_TEXT_CHARS && n < MAX_TEXT_CHARS && text.to_lowercase().contains("internship")
}

pub fn parse_portal(html: &str, base: &str, today: NaiveDate) -> Harvest<JobPosting> {
    let doc = Html::parse_document(html);
    let mut harvest = Harvest::new();
    let mut seen = HashSet::new();

    for link in doc.select(&LINKS) {
        if harvest.records.len() >= MAX_RESULTS {
            break;
        }
        let title = element_text(&link);
        if !looks_like_opportunity(&title) {
            continue;
        }
        let Some(url) = link.value().attr("href").and_then(|h| resolve_url(base, h)) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        tracing::debug!(adapter = SOURCE, %title, %url, "portal opportunity");
        harvest.push(
            JobPosting {
                title,
                company: "AICTE / Govt".to_string(),
                location: "India".to_string(),
                kind: JobKind::GovtInternship,
                salary_range: "Stipend (Govt Norms)".to_string(),
                url,
                source: SOURCE.to_string(),
                posted_at: today,
            }
            .normalize(),
        );
    }

    if harvest.records.is_empty() {
        tracing::info!(adapter = SOURCE, "no internship links on portal landing page");
        harvest.fault(Fault::ShapeDrift {
            detail: "no internship-like links on landing page".into(),
        });
    }
    harvest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_bounds_are_exclusive() {
        assert!(!looks_like_opportunity("Internship"));
        assert!(looks_like_opportunity("Internships"));
        assert!(!looks_like_opportunity(&format!("Internship {}", "x".repeat(89))));
        assert!(looks_like_opportunity(&format!("Internship {}", "x".repeat(88))));
        assert!(!looks_like_opportunity("Apply for a summer research program"));
    }

    #[test]
    fn keyword_split_by_inline_markup_still_matches() {
        let html =
            r#"<a href="/internship-details.php?id=7">Summer Intern<span>ship</span> at NHAI</a>"#;
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let h = parse_portal(html, "https://internship.aicte-india.org/", today);
        assert_eq!(h.records.len(), 1);
        assert_eq!(h.records[0].title, "Summer Internship at NHAI");
    }
}
