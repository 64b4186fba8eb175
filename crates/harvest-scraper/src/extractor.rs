//! Content extraction shared by both acquisition strategies.
//!
//! HTML titles and meta tags are harvested with patterns rather than a full
//! parse so that malformed markup still yields something. Custom selector
//! captures on static HTML use a real CSS engine.

use harvest_core::{Metadata, CUSTOM_SELECTORS_KEY};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use url::Url;

/// Title used when an HTML page has neither `<title>` nor `<h1>`.
pub const NO_TITLE: &str = "No title";
/// Title used for JSON documents without a usable title key.
pub const JSON_DOCUMENT_TITLE: &str = "JSON Document";
/// Title used when a JSON body fails to parse.
pub const INVALID_JSON_TITLE: &str = "Invalid JSON";

/// Title and metadata derived from one body.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Extracted or synthesized title
    pub title: String,
    /// Meta tags keyed by name, plus `customSelectors` when any matched
    pub metadata: Metadata,
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)<title\b[^>]*>(.*?)</title\s*>")
}

fn h1_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)<h1\b[^>]*>(.*?)</h1\s*>")
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?s)<[^>]*>")
}

fn meta_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)<meta\b([^>]*)>")
}

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#,
    )
}

/// Decode the handful of entities common in titles and meta content.
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn clean_text(raw: &str) -> String {
    let stripped = tag_regex().replace_all(raw, " ");
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title from `<title>`, falling back to the first `<h1>`, else [`NO_TITLE`].
pub fn html_title(html: &str) -> String {
    [title_regex(), h1_regex()]
        .iter()
        .filter_map(|re| re.captures(html))
        .filter_map(|caps| caps.get(1).map(|m| clean_text(m.as_str())))
        .find(|title| !title.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string())
}

/// Every `<meta>` tag with a `name` or `property` and a `content`, keyed by
/// the name. Later duplicates win.
pub fn meta_tags(html: &str) -> Metadata {
    let mut metadata = Metadata::new();

    for tag in meta_regex().captures_iter(html) {
        let Some(attrs) = tag.get(1) else { continue };

        let mut key = None;
        let mut content = None;
        for attr in attribute_regex().captures_iter(attrs.as_str()) {
            let name = attr[1].to_ascii_lowercase();
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .or_else(|| attr.get(4))
                .map_or("", |m| m.as_str());
            match name.as_str() {
                "name" | "property" if key.is_none() => key = Some(value.to_string()),
                "content" => content = Some(decode_entities(value)),
                _ => {}
            }
        }

        if let (Some(key), Some(content)) = (key, content) {
            if !key.is_empty() {
                metadata.insert(key, Value::String(content));
            }
        }
    }

    metadata
}

/// Title for a JSON body: the first string among top-level `title`, `name`,
/// `heading`.
pub fn json_title(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ["title", "name", "heading"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .unwrap_or_else(|| JSON_DOCUMENT_TITLE.to_string()),
        Ok(_) => JSON_DOCUMENT_TITLE.to_string(),
        Err(e) => {
            tracing::debug!("JSON body failed to parse: {}", e);
            INVALID_JSON_TITLE.to_string()
        }
    }
}

/// Title for content that is neither HTML nor JSON.
pub fn generic_title(url: &Url) -> String {
    format!("Content from {}", url.host_str().unwrap_or("unknown host"))
}

/// Extract title and meta tags according to the declared content type.
pub fn extract(body: &str, content_type: &str, url: &Url) -> Extraction {
    let content_type = content_type.to_ascii_lowercase();

    if content_type.contains("html") {
        Extraction {
            title: html_title(body),
            metadata: meta_tags(body),
        }
    } else if content_type.contains("json") {
        Extraction {
            title: json_title(body),
            metadata: Metadata::new(),
        }
    } else {
        Extraction {
            title: generic_title(url),
            metadata: Metadata::new(),
        }
    }
}

/// Evaluate named CSS selectors against an HTML document.
///
/// Each field is independent: invalid selectors and misses are logged and
/// left out.
pub fn select_fields(html: &str, selectors: &BTreeMap<String, String>) -> Metadata {
    let mut captures = Metadata::new();
    if selectors.is_empty() {
        return captures;
    }

    let document = Html::parse_document(html);
    for (field, expression) in selectors {
        let selector = match Selector::parse(expression) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::warn!(field = %field, selector = %expression, "invalid selector: {}", e);
                continue;
            }
        };

        let text = document.select(&selector).next().map(|element| {
            element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        });

        match text {
            Some(text) if !text.is_empty() => {
                captures.insert(field.clone(), Value::String(text));
            }
            _ => tracing::warn!(field = %field, selector = %expression, "selector matched nothing"),
        }
    }

    captures
}

/// Merge selector captures under [`CUSTOM_SELECTORS_KEY`]; nothing is added
/// when there are no captures.
pub fn merge_custom_selectors(metadata: &mut Metadata, captures: Metadata) {
    if !captures.is_empty() {
        metadata.insert(CUSTOM_SELECTORS_KEY.to_string(), Value::Object(captures));
    }
}
