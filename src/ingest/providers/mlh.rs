// src/ingest/providers/mlh.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html};

use crate::ingest::extract::{resolve_url, title_from_host, SelectorChain};
use crate::ingest::fetch::{fetch_body, FetchRequest, Fetcher};
use crate::ingest::is_relevant_location;
use crate::ingest::types::{Fault, HackathonListing, Harvest, Listing, SourceAdapter, Tags};

pub const SOURCE: &str = "MLH";
const SITE: &str = "https://mlh.io";

static EVENTS: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["div.event-wrapper", "div.event"]));
static LINK: Lazy<SelectorChain> = Lazy::new(|| SelectorChain::new(&["a.event-link", "a[href]"]));
static NAME: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["h3.event-name", ".event-name", "h3"]));
static DATE: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["p.event-date", ".event-date"]));
static LOCATION: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["div.event-location", ".event-location"]));

/// Major League Hacking season calendar.
pub struct MlhAdapter {
    fetcher: Arc<dyn Fetcher>,
    url: String,
}

impl MlhAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>, season: &str) -> Self {
        Self {
            fetcher,
            url: season_url(season),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

pub fn season_url(season: &str) -> String {
    format!("{SITE}/seasons/{}/events", season.trim())
}

#[async_trait]
impl SourceAdapter<HackathonListing> for MlhAdapter {
    async fn collect(&self) -> Result<Harvest<HackathonListing>> {
        let mut harvest = Harvest::new();
        let req = FetchRequest::html(self.url.as_str());
        if let Some(body) = fetch_body(self.fetcher.as_ref(), SOURCE, &req, &mut harvest).await {
            harvest.merge(parse_events(&body));
        }
        tracing::info!(
            adapter = SOURCE,
            records = harvest.records.len(),
            filtered = harvest.filtered,
            "season page parsed"
        );
        Ok(harvest)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}

pub fn parse_events(html: &str) -> Harvest<HackathonListing> {
    let doc = Html::parse_document(html);
    let mut harvest = Harvest::new();

    let events = EVENTS.containers(&doc);
    if events.is_empty() {
        tracing::warn!(adapter = SOURCE, "no event containers matched");
        harvest.fault(Fault::ShapeDrift {
            detail: "no events on season page".into(),
        });
        return harvest;
    }

    for event in events {
        match parse_event(event) {
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
                tracing::debug!(adapter = SOURCE, error = %e, "skipping event");
                harvest.fault(Fault::Item {
                    detail: format!("{e:#}"),
                });
            }
        }
    }
    harvest
}

fn parse_event(event: ElementRef<'_>) -> Result<HackathonListing> {
    let href = LINK.attr(event, "href").context("event has no link")?;
    let url = resolve_url(SITE, &href).with_context(|| format!("unusable link '{href}'"))?;

    // event links point at each hackathon's own site, so the host names it
    let name = NAME
        .text(event)
        .or_else(|| LINK.text(event))
        .or_else(|| title_from_host(&url))
        .with_context(|| format!("event at {url} has no name"))?;

    let dates = DATE.text(event).unwrap_or_else(|| "Upcoming".to_string());
    let location = LOCATION.text(event).unwrap_or_else(|| "Online".to_string());

    let mut tags: Tags = ["Hackathon", "MLH"].into_iter().collect();
    if name.contains("High School") {
        tags.push("High School");
    }

    Ok(HackathonListing {
        name,
        organizer: "MLH / Various".to_string(),
        description: String::new(),
        dates,
        location,
        url,
        source: SOURCE.to_string(),
        tags,
        prizes: "See Details".to_string(),
    }
    .normalize())
}
