// src/ingest/types.rs
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ingest::normalize_location;

/// Catalog namespace. Jobs and hackathons deduplicate independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Jobs,
    Hackathons,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Jobs => "jobs",
            Category::Hackathons => "hackathons",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    Internship,
    Job,
    #[serde(rename = "Research Internship")]
    ResearchInternship,
    #[serde(rename = "Govt Internship")]
    GovtInternship,
    #[serde(rename = "Full-time")]
    FullTime,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Internship => "Internship",
            JobKind::Job => "Job",
            JobKind::ResearchInternship => "Research Internship",
            JobKind::GovtInternship => "Govt Internship",
            JobKind::FullTime => "Full-time",
        }
    }

    /// Titles mentioning "intern" are internships; everything else gets `fallback`.
    pub fn from_title(title: &str, fallback: JobKind) -> JobKind {
        if title.to_lowercase().contains("intern") {
            JobKind::Internship
        } else {
            fallback
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub salary_range: String,
    pub url: String,
    pub source: String,
    pub posted_at: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HackathonListing {
    pub name: String,
    pub organizer: String,
    pub description: String,
    pub dates: String,
    pub location: String,
    pub url: String,
    pub source: String,
    pub tags: Tags,
    pub prizes: String,
}

/// Ordered, case-insensitively unique tag list holding at most [`Tags::CAPACITY`] entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    pub const CAPACITY: usize = 5;

    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the tag was empty, a duplicate, or the set is full.
    pub fn push(&mut self, tag: impl AsRef<str>) -> bool {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || self.0.len() >= Self::CAPACITY {
            return false;
        }
        if self.0.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for t in iter {
            tags.push(t);
        }
        tags
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record has no url")]
    MissingUrl,
    #[error("url is not an absolute http(s) address: {0}")]
    RelativeUrl(String),
    #[error("record has no title/name (url {0})")]
    MissingTitle(String),
}

/// Borrowed view handed to the persistence gateway.
#[derive(Debug, Clone, Copy)]
pub enum RecordRef<'a> {
    Job(&'a JobPosting),
    Hackathon(&'a HackathonListing),
}

impl RecordRef<'_> {
    pub fn category(&self) -> Category {
        match self {
            RecordRef::Job(_) => Category::Jobs,
            RecordRef::Hackathon(_) => Category::Hackathons,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            RecordRef::Job(j) => &j.url,
            RecordRef::Hackathon(h) => &h.url,
        }
    }
}

/// Shared behaviour of canonical records.
pub trait Listing: std::fmt::Debug + Send + Sync + 'static {
    const CATEGORY: Category;

    fn url(&self) -> &str;
    /// Title for jobs, name for hackathons.
    fn label(&self) -> &str;
    /// Trim fields and fill documented defaults.
    fn normalize(self) -> Self;
    fn as_record(&self) -> RecordRef<'_>;

    fn validate(&self) -> Result<(), RecordError> {
        let url = self.url().trim();
        if url.is_empty() {
            return Err(RecordError::MissingUrl);
        }
        match url::Url::parse(url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => {}
            _ => return Err(RecordError::RelativeUrl(url.to_string())),
        }
        if self.label().trim().is_empty() {
            return Err(RecordError::MissingTitle(url.to_string()));
        }
        Ok(())
    }
}

fn or_default(value: String, default: &str) -> String {
    let t = value.trim();
    if t.is_empty() {
        default.to_string()
    } else {
        t.to_string()
    }
}

impl Listing for JobPosting {
    const CATEGORY: Category = Category::Jobs;

    fn url(&self) -> &str {
        &self.url
    }

    fn label(&self) -> &str {
        &self.title
    }

    fn normalize(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            company: or_default(self.company, "Unknown"),
            location: normalize_location(&self.location, "India"),
            kind: self.kind,
            salary_range: or_default(self.salary_range, "N/A"),
            url: self.url.trim().to_string(),
            source: self.source.trim().to_string(),
            posted_at: self.posted_at,
        }
    }

    fn as_record(&self) -> RecordRef<'_> {
        RecordRef::Job(self)
    }
}

impl Listing for HackathonListing {
    const CATEGORY: Category = Category::Hackathons;

    fn url(&self) -> &str {
        &self.url
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn normalize(self) -> Self {
        let source = self.source.trim().to_string();
        Self {
            name: self.name.trim().to_string(),
            organizer: or_default(self.organizer, &source),
            description: self.description.trim().to_string(),
            dates: or_default(self.dates, "Upcoming"),
            location: normalize_location(&self.location, "Online"),
            url: self.url.trim().to_string(),
            tags: self.tags,
            prizes: or_default(self.prizes, "See Details"),
            source,
        }
    }

    fn as_record(&self) -> RecordRef<'_> {
        RecordRef::Hackathon(self)
    }
}

/// Non-fatal problems an adapter ran into. Logged where they happen and
/// counted in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    #[error("transport failure for {url}: {detail}")]
    Transport { url: String, detail: String },
    #[error("unexpected upstream shape: {detail}")]
    ShapeDrift { detail: String },
    #[error("item dropped: {detail}")]
    Item { detail: String },
}

/// What one `collect()` pass produced.
#[derive(Debug)]
pub struct Harvest<R> {
    pub records: Vec<R>,
    pub faults: Vec<Fault>,
    /// Candidates rejected by a relevance filter. Not failures.
    pub filtered: usize,
}

impl<R> Default for Harvest<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            faults: Vec::new(),
            filtered: 0,
        }
    }
}

impl<R> Harvest<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: R) {
        self.records.push(record);
    }

    pub fn fault(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    pub fn merge(&mut self, other: Harvest<R>) {
        self.records.extend(other.records);
        self.faults.extend(other.faults);
        self.filtered += other.filtered;
    }

    pub fn transport_failed(&self) -> bool {
        self.faults
            .iter()
            .any(|f| matches!(f, Fault::Transport { .. }))
    }
}

/// One upstream. `collect` only returns `Err` for adapter-fatal conditions;
/// upstream breakage is reported through [`Harvest::faults`].
#[async_trait::async_trait]
pub trait SourceAdapter<R: Listing>: Send + Sync {
    async fn collect(&self) -> Result<Harvest<R>>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(title: &str, url: &str) -> JobPosting {
        JobPosting {
            title: title.into(),
            company: "  ".into(),
            location: "Work From Home".into(),
            kind: JobKind::Internship,
            salary_range: String::new(),
            url: url.into(),
            source: "Test".into(),
            posted_at: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
        }
    }

    #[test]
    fn job_normalize_fills_defaults_and_maps_remote() {
        let j = job("  Backend Intern ", " https://x.test/a ").normalize();
        assert_eq!(j.title, "Backend Intern");
        assert_eq!(j.company, "Unknown");
        assert_eq!(j.location, "Remote");
        assert_eq!(j.salary_range, "N/A");
        assert_eq!(j.url, "https://x.test/a");
    }

    #[test]
    fn validate_rejects_empty_keys() {
        assert_eq!(job("T", "").validate(), Err(RecordError::MissingUrl));
        assert!(matches!(
            job("T", "/relative/path").validate(),
            Err(RecordError::RelativeUrl(_))
        ));
        assert!(matches!(
            job("", "https://x.test/a").validate(),
            Err(RecordError::MissingTitle(_))
        ));
        assert!(job("T", "https://x.test/a").validate().is_ok());
    }

    #[test]
    fn tags_are_capped_and_unique() {
        let tags: Tags = ["Hackathon", "hackathon", "", "A", "B", "C", "D", "E"]
            .into_iter()
            .collect();
        assert_eq!(tags.as_slice(), &["Hackathon", "A", "B", "C", "D"]);
    }

    #[test]
    fn kind_from_title() {
        assert_eq!(
            JobKind::from_title("SDE INTERN", JobKind::FullTime),
            JobKind::Internship
        );
        assert_eq!(
            JobKind::from_title("Platform Engineer", JobKind::FullTime),
            JobKind::FullTime
        );
        assert_eq!(
            serde_json::to_value(JobKind::GovtInternship).unwrap(),
            "Govt Internship"
        );
    }
}
