// src/ingest/providers/hackerearth.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html};

use crate::ingest::extract::{resolve_url, title_from_path_slug, SelectorChain};
use crate::ingest::fetch::{fetch_body, FetchRequest, Fetcher};
use crate::ingest::is_relevant_location;
use crate::ingest::types::{Fault, HackathonListing, Harvest, Listing, SourceAdapter, Tags};

pub const SOURCE: &str = "HackerEarth";
pub const CHALLENGES_URL: &str = "https://www.hackerearth.com/challenges/hackathon/";
const SITE: &str = "https://www.hackerearth.com";

/// Link text longer than this is a whole-card wrapper, not a title.
const MAX_LINK_TITLE_CHARS: usize = 80;

static CARDS: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["div.challenge-card-modern", "div.challenge-card"]));
static LINK: Lazy<SelectorChain> = Lazy::new(|| SelectorChain::new(&["a[href]"]));
static TITLE: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[".large.weight-600", ".challenge-name", ".challenge-list-title"])
});
static ORGANIZER: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["div.company-name", "div.organizer"]));
static KIND: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["div.challenge-type", ".challenge-type"]));
static DATES: Lazy<SelectorChain> = Lazy::new(|| SelectorChain::new(&[".date", ".challenge-date"]));
static LOCATION: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&[".location", ".challenge-location"]));

pub struct HackerEarthAdapter {
    fetcher: Arc<dyn Fetcher>,
    url: String,
}

impl HackerEarthAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            url: CHALLENGES_URL.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter<HackathonListing> for HackerEarthAdapter {
    async fn collect(&self) -> Result<Harvest<HackathonListing>> {
        let mut harvest = Harvest::new();
        let req = FetchRequest::html(self.url.as_str());
        if let Some(body) = fetch_body(self.fetcher.as_ref(), SOURCE, &req, &mut harvest).await {
            harvest.merge(parse_challenges(&body));
        }
        tracing::info!(
            adapter = SOURCE,
            records = harvest.records.len(),
            filtered = harvest.filtered,
            "challenge board parsed"
        );
        Ok(harvest)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}

pub fn parse_challenges(html: &str) -> Harvest<HackathonListing> {
    let doc = Html::parse_document(html);
    let mut harvest = Harvest::new();

    let cards = CARDS.containers(&doc);
    if cards.is_empty() {
        tracing::warn!(adapter = SOURCE, "no challenge cards matched");
        harvest.fault(Fault::ShapeDrift {
            detail: "no challenge cards on board".into(),
        });
        return harvest;
    }

    for card in cards {
        match parse_card(card) {
            Ok(listing) if is_relevant_location(&listing.location) => harvest.push(listing),
            Ok(listing) => {
                tracing::debug!(
                    adapter = SOURCE,
                    name = %listing.name,
                    location = %listing.location,
                    "outside target regions"
                );
                harvest.filtered += 1;
            }
            Err(e) => {
                tracing::debug!(adapter = SOURCE, error = %e, "skipping challenge card");
                harvest.fault(Fault::Item {
                    detail: format!("{e:#}"),
                });
            }
        }
    }
    harvest
}

fn parse_card(card: ElementRef<'_>) -> Result<HackathonListing> {
    let href = LINK.attr(card, "href").context("card has no link")?;
    let url = resolve_url(SITE, &href).with_context(|| format!("unusable link '{href}'"))?;

    let name = TITLE
        .text(card)
        .or_else(|| LINK.text(card).filter(|t| t.chars().count() <= MAX_LINK_TITLE_CHARS))
        .or_else(|| title_from_path_slug(&url))
        .unwrap_or_else(|| "Upcoming Hackathon".to_string());

    let organizer = ORGANIZER.text(card).unwrap_or_else(|| SOURCE.to_string());
    let kind = KIND.text(card).unwrap_or_else(|| "Hackathon".to_string());
    let dates = DATES.text(card).unwrap_or_else(|| "Upcoming".to_string());
    let location = LOCATION.text(card).unwrap_or_else(|| "Online".to_string());

    let tags: Tags = ["Hackathon".to_string(), kind.to_uppercase()].into_iter().collect();

    Ok(HackathonListing {
        name,
        organizer,
        description: "HackerEarth Challenge".to_string(),
        dates,
        location,
        url,
        source: SOURCE.to_string(),
        tags,
        prizes: "See Details".to_string(),
    }
    .normalize())
}
