//! Sitemap parsing
//!
//! The store publishes a sitemap index whose `<loc>` entries point at shard
//! sitemaps (`<index>?shard=N&numshards=M`); each shard lists listing URLs
//! ending in the extension id.

use crate::state::ExtensionId;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Extracts the text of every `<loc>` element in a sitemap document
pub fn parse_locations(document: &str) -> Vec<String> {
    let html = Html::parse_document(document);
    let selector = match Selector::parse("loc") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    html.select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// Matches shard URLs belonging to one sitemap index
#[derive(Debug, Clone)]
pub struct ShardMatcher {
    pattern: Regex,
}

impl ShardMatcher {
    pub fn new(index_url: &str) -> Result<Self, regex::Error> {
        let pattern = format!(r"^{}\?shard=\d+&numshards=\d+$", regex::escape(index_url));
        Ok(Self {
            pattern: Regex::new(&pattern)?,
        })
    }

    pub fn is_shard(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    /// Keeps only the shard URLs among `locations`
    pub fn shards<'a>(&self, locations: &'a [String]) -> Vec<&'a str> {
        locations
            .iter()
            .map(String::as_str)
            .filter(|url| self.is_shard(url))
            .collect()
    }
}

/// Pulls the extension id out of a listing URL
///
/// The id is the last match of 32 lowercase letters in the URL, which skips
/// over a long human-readable slug before it.
pub fn extract_id(listing_url: &str) -> Option<ExtensionId> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new("[a-z]{32}").expect("static pattern"));

    pattern
        .find_iter(listing_url)
        .last()
        .and_then(|m| ExtensionId::parse(m.as_str()).ok())
}
