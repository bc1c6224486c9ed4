//! Concrete source adapters.

pub mod arbeitnow;
pub mod arbeitsagentur;
pub mod fixture;
pub mod jooble;

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

pub use arbeitnow::ArbeitnowAdapter;
pub use arbeitsagentur::ArbeitsagenturAdapter;
pub use fixture::StaticSource;
pub use jooble::JoobleAdapter;

fn tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").ok()).as_ref()
}

/// Reduce an HTML fragment to plain text on one line.
pub(crate) fn strip_html(html: &str) -> String {
    let text = match tag_pattern() {
        Some(pattern) => pattern.replace_all(html, " ").into_owned(),
        None => html.to_string(),
    };
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode each listing on its own so one bad item cannot fail a page.
///
/// Returns the decoded items and the number that failed to decode.
pub(crate) fn decode_items<T: DeserializeOwned>(source_id: &str, values: Vec<Value>) -> (Vec<T>, usize) {
    let mut items = Vec::with_capacity(values.len());
    let mut failed = 0;
    for value in values {
        match serde_json::from_value(value) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!(source = %source_id, error = %e, "Dropping undecodable item");
                failed += 1;
            }
        }
    }
    (items, failed)
}
