// src/ingest/providers/curated.rs
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::extract::host_name;
use crate::ingest::types::{Harvest, JobKind, JobPosting, Listing, SourceAdapter};

pub const SOURCE: &str = "VikashPR (GitHub)";

static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((https?://[^)\s]+)\)").unwrap());

/// Host substring rule. `any` narrows a `requires` match to a campus; an
/// empty `any` means `requires` alone is enough.
struct Rule {
    requires: &'static str,
    any: &'static [&'static str],
    label: &'static str,
}

// Order matters: "iiit" contains "iit", "niti" contains "nit", "iitkgp" contains "iitk".
const INSTITUTIONS: &[Rule] = &[
    Rule { requires: "iiit", any: &[], label: "IIIT" },
    Rule { requires: "iit", any: &["iitkgp", "kharagpur"], label: "IIT Kharagpur" },
    Rule { requires: "iit", any: &["iitk", "kanpur"], label: "IIT Kanpur" },
    Rule { requires: "iit", any: &["iitb", "bombay"], label: "IIT Bombay" },
    Rule { requires: "iit", any: &["iitd", "delhi"], label: "IIT Delhi" },
    Rule { requires: "iit", any: &["iitm", "madras"], label: "IIT Madras" },
    Rule { requires: "iit", any: &["iitr", "roorkee"], label: "IIT Roorkee" },
    Rule { requires: "iit", any: &["iitg", "guwahati"], label: "IIT Guwahati" },
    Rule { requires: "iit", any: &[], label: "IIT" },
    Rule { requires: "niti", any: &[], label: "NITI Aayog" },
    Rule { requires: "nit", any: &[], label: "NIT" },
    Rule { requires: "iisc", any: &[], label: "IISc Bangalore" },
    Rule { requires: "tifr", any: &[], label: "TIFR" },
    Rule { requires: "isro", any: &[], label: "ISRO" },
    Rule { requires: "google", any: &[], label: "Google" },
];

/// Institution name for a research internship link, judged by its host.
pub fn classify_institution(url: &str) -> &'static str {
    let host = host_name(url).unwrap_or_else(|| url.to_lowercase());
    INSTITUTIONS
        .iter()
        .find(|r| {
            host.contains(r.requires)
                && (r.any.is_empty() || r.any.iter().any(|t| host.contains(t)))
        })
        .map_or("Research Institution", |r| r.label)
}

/// Research internships from a local markdown bullet list (`- [🔗](https://...)`).
pub struct CuratedListAdapter {
    path: PathBuf,
}

impl CuratedListAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourceAdapter<JobPosting> for CuratedListAdapter {
    async fn collect(&self) -> Result<Harvest<JobPosting>> {
        // a missing reference file is a deployment mistake, not upstream drift
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading curated list {}", self.path.display()))?;
        let harvest = parse_curated(&content, chrono::Local::now().date_naive());
        tracing::info!(
            adapter = SOURCE,
            path = %self.path.display(),
            records = harvest.records.len(),
            "curated list parsed"
        );
        Ok(harvest)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}

pub fn parse_curated(content: &str, today: NaiveDate) -> Harvest<JobPosting> {
    let mut harvest = Harvest::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some(url) = RE_LINK
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            tracing::trace!(adapter = SOURCE, line, "line without link skipped");
            continue;
        };
        let title = host_name(&url)
            .map(|d| format!("Research Intern at {d}"))
            .unwrap_or_else(|| "Research Internship".to_string());
        harvest.push(
            JobPosting {
                title,
                company: classify_institution(&url).to_string(),
                location: "India".to_string(),
                kind: JobKind::ResearchInternship,
                salary_range: "Stipend (Varies)".to_string(),
                url,
                source: SOURCE.to_string(),
                posted_at: today,
            }
            .normalize(),
        );
    }
    harvest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campus_beats_parent_institution() {
        assert_eq!(classify_institution("https://www.iitb.ac.in/research"), "IIT Bombay");
        assert_eq!(classify_institution("https://iitkgp.ac.in/"), "IIT Kharagpur");
        assert_eq!(classify_institution("https://www.iitk.ac.in/"), "IIT Kanpur");
        assert_eq!(classify_institution("https://www.iitj.ac.in/"), "IIT");
        assert_eq!(classify_institution("https://www.iiitd.ac.in/"), "IIIT");
        assert_eq!(classify_institution("https://www.niti.gov.in/"), "NITI Aayog");
        assert_eq!(classify_institution("https://www.nitt.edu/"), "NIT");
        assert_eq!(classify_institution("https://iisc.ac.in/"), "IISc Bangalore");
        assert_eq!(classify_institution("https://example.org/"), "Research Institution");
    }

    #[test]
    fn only_host_is_inspected() {
        assert_eq!(classify_institution("https://example.org/iit-alumni"), "Research Institution");
    }
}
