//! Drift-tolerant field extraction.
//!
//! Every field is read through an ordered list of strategies; the first one
//! that yields a non-empty value wins. Markup classes change more often than
//! link structure, so the last strategies derive values from the listing URL.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::ingest::clean_text;

/// Ordered CSS selector candidates for one field or container.
#[derive(Debug)]
pub struct SelectorChain {
    selectors: Vec<(&'static str, Selector)>,
}

impl SelectorChain {
    /// Invalid candidates are dropped with a warning instead of failing the adapter.
    pub fn new(candidates: &[&'static str]) -> Self {
        let selectors = candidates
            .iter()
            .filter_map(|css| match Selector::parse(css) {
                Ok(sel) => Some((*css, sel)),
                Err(e) => {
                    tracing::warn!(selector = css, error = %e, "invalid selector skipped");
                    None
                }
            })
            .collect();
        Self { selectors }
    }

    /// Containers matched by the first candidate that matches anything.
    pub fn containers<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        for (css, sel) in &self.selectors {
            let found: Vec<_> = doc.select(sel).collect();
            if !found.is_empty() {
                tracing::debug!(selector = css, count = found.len(), "containers matched");
                return found;
            }
        }
        Vec::new()
    }

    /// First element under `scope` matched by any candidate, in candidate order.
    pub fn element<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.selectors
            .iter()
            .find_map(|(_, sel)| scope.select(sel).next())
    }

    /// First non-empty cleaned text.
    pub fn text(&self, scope: ElementRef<'_>) -> Option<String> {
        self.selectors.iter().find_map(|(_, sel)| {
            scope
                .select(sel)
                .map(|el| element_text(&el))
                .find(|t| !t.is_empty())
        })
    }

    /// First non-empty attribute value.
    pub fn attr(&self, scope: ElementRef<'_>, name: &str) -> Option<String> {
        self.selectors.iter().find_map(|(_, sel)| {
            scope
                .select(sel)
                .filter_map(|el| el.value().attr(name))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .map(str::to_string)
        })
    }
}

/// Whitespace-collapsed text content of an element. Text nodes are joined as-is, so
/// `Intern<span>ship</span>` stays one word.
pub fn element_text(el: &ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

pub fn has_class(el: &ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Resolve `href` against `base`. Absolute links pass through.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let joined = match Url::parse(href) {
        Ok(abs) => abs,
        Err(_) => Url::parse(base).ok()?.join(href).ok()?,
    };
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

/// Drop query string and fragment.
pub fn strip_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut u) => {
            u.set_query(None);
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// Host without a leading `www.`.
pub fn host_name(url: &str) -> Option<String> {
    let host = Url::parse(url).ok()?.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Display title from a link's host, e.g. `https://www.hackmit.org/` -> "Hackmit".
pub fn title_from_host(url: &str) -> Option<String> {
    let host = host_name(url)?;
    let label = host.split('.').next().filter(|l| !l.is_empty())?;
    Some(title_case(&label.replace('-', " ")))
}

/// Display title from the last path segment,
/// e.g. `/challenges/hackathon/code-for-good/` -> "Code For Good".
pub fn title_from_path_slug(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let slug = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?
        .to_string();
    let words = slug.replace(['-', '_'], " ");
    let t = title_case(words.trim());
    (!t.is_empty()).then_some(t)
}

/// Location embedded in listing links such as `...-internship-in-new-delhi-at-acme123`.
pub fn location_from_slug(url: &str) -> Option<String> {
    static RE_LOC: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"-in-([a-zA-Z0-9-]+?)-at-").unwrap());
    let caps = RE_LOC.captures(url)?;
    let slug = caps.get(1)?.as_str();
    let loc = title_case(&slug.replace('-', " "));
    (!loc.is_empty()).then_some(loc)
}

/// Capitalise each whitespace-separated word.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
