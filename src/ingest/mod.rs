// src/ingest/mod.rs
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod politeness;
pub mod providers;
pub mod store;
pub mod types;

use once_cell::sync::Lazy;
use regex::Regex;

/// Location terms a hackathon must mention to be kept.
pub const RELEVANT_LOCATION_TERMS: &[&str] = &[
    "online",
    "india",
    "bangalore",
    "bengaluru",
    "delhi",
    "ncr",
    "mumbai",
];

const MAX_TEXT_CHARS: usize = 1500;

/// Clean scraped or API text: decode entities, strip tags, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = RE_TAGS.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (including nbsp left over from decoding)
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\u{00A0}]+").unwrap());
    out = RE_WS.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

/// Empty locations fall back to `default`; work-from-home wording becomes "Remote".
pub fn normalize_location(raw: &str, default: &str) -> String {
    let loc = clean_text(raw);
    if loc.is_empty() {
        return default.to_string();
    }
    if loc.to_lowercase().contains("work from home") {
        return "Remote".to_string();
    }
    loc
}

/// Case-insensitive allow-list check used by the hackathon boards.
pub fn is_relevant_location<S: AsRef<str>>(location: S) -> bool {
    let l = location.as_ref().to_lowercase();
    RELEVANT_LOCATION_TERMS.iter().any(|t| l.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_ws_and_tags() {
        let s = "  <b>Build&nbsp;&nbsp;for</b>\n\t&ldquo;Bharat&rdquo;  ";
        assert_eq!(clean_text(s), r#"Build for "Bharat""#);
    }

    #[test]
    fn clean_text_keeps_trailing_punctuation() {
        assert_eq!(clean_text("Acme Pvt. Ltd."), "Acme Pvt. Ltd.");
    }

    #[test]
    fn location_normalization() {
        assert_eq!(normalize_location("Work From Home", "India"), "Remote");
        assert_eq!(normalize_location("   ", "India"), "India");
        assert_eq!(normalize_location(" Pune ", "India"), "Pune");
    }

    #[test]
    fn relevance_matching_is_case_insensitive() {
        assert!(is_relevant_location("Remote / Online"));
        assert!(is_relevant_location("BENGALURU, KA"));
        assert!(is_relevant_location("New Delhi"));
        assert!(!is_relevant_location("Berlin, Germany"));
    }
}
