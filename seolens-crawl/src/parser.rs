//! HTML page parsing
//!
//! Turns a fetched HTML document into a [`ParsedPage`]:
//! - `<head>` metadata (title, description, og:type, canonical, lang)
//! - h1/h2/h3 headings
//! - main content text with navigation and script noise removed
//! - schema.org types from JSON-LD and microdata
//! - internal and external links

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use seolens_core::{normalize_whitespace, Headings, Links, PageMeta, ParsedPage};

use crate::filter::site_host;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid page URL {0}: {1}")]
    InvalidUrl(String, url::ParseError),

    #[error("Empty document: {0}")]
    EmptyDocument(String),
}

/// Turns raw HTML into structured page content
pub trait PageParser: Send + Sync {
    fn parse(&self, html: &str, url: &str) -> Result<ParsedPage, ParseError>;
}

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static TITLE: LazyLock<Selector> = LazyLock::new(|| sel("title"));
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| sel(r#"meta[name="description"]"#));
static OG_TYPE: LazyLock<Selector> = LazyLock::new(|| sel(r#"meta[property="og:type"]"#));
static CANONICAL: LazyLock<Selector> = LazyLock::new(|| sel(r#"link[rel="canonical"]"#));
static HTML_ROOT: LazyLock<Selector> = LazyLock::new(|| sel("html"));
static BODY: LazyLock<Selector> = LazyLock::new(|| sel("body"));
static H1: LazyLock<Selector> = LazyLock::new(|| sel("h1"));
static H2: LazyLock<Selector> = LazyLock::new(|| sel("h2"));
static H3: LazyLock<Selector> = LazyLock::new(|| sel("h3"));
static JSON_LD: LazyLock<Selector> =
    LazyLock::new(|| sel(r#"script[type="application/ld+json"]"#));
static ITEMTYPE: LazyLock<Selector> = LazyLock::new(|| sel("[itemtype]"));
static ANCHORS: LazyLock<Selector> = LazyLock::new(|| sel("a[href]"));
static MAIN_CONTENT: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "main",
        "article",
        r#"[role="main"]"#,
        ".main-content",
        ".content",
        ".post-content",
        ".entry-content",
    ]
    .iter()
    .map(|css| sel(css))
    .collect()
});

/// Subtrees whose text never counts as content
const SKIPPED_TAGS: [&str; 7] = ["script", "style", "noscript", "svg", "nav", "footer", "aside"];

/// JSON-LD types that name the site owner
const ORGANIZATION_TYPES: [&str; 3] = ["Organization", "Brand", "Corporation"];

/// `scraper`-backed HTML parser
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlPageParser;

impl HtmlPageParser {
    pub fn new() -> Self {
        Self
    }
}

impl PageParser for HtmlPageParser {
    fn parse(&self, html: &str, url: &str) -> Result<ParsedPage, ParseError> {
        let base = Url::parse(url).map_err(|e| ParseError::InvalidUrl(url.to_string(), e))?;
        if html.trim().is_empty() {
            return Err(ParseError::EmptyDocument(url.to_string()));
        }

        let document = Html::parse_document(html);
        let main_text = main_text(&document);
        let (structured_types, organization_names) = structured_data(&document);

        let page = ParsedPage {
            url: url.to_string(),
            meta: meta(&document),
            headings: Headings {
                h1: heading_texts(&document, &H1),
                h2: heading_texts(&document, &H2),
                h3: heading_texts(&document, &H3),
            },
            word_count: main_text.split_whitespace().count(),
            main_text,
            structured_types,
            organization_names,
            links: links(&document, &base),
        };

        debug!(
            "Parsed {}: {} words, {} internal links",
            url,
            page.word_count,
            page.links.internal.len()
        );
        Ok(page)
    }
}

fn element_text(el: ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(normalize_whitespace)
        .filter(|v| !v.is_empty())
}

fn attr_of(document: &Html, selector: &Selector, attr: &str) -> Option<String> {
    document
        .select(selector)
        .find_map(|el| non_empty(el.value().attr(attr)))
}

fn meta(document: &Html) -> PageMeta {
    let lang = document
        .select(&HTML_ROOT)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .and_then(|lang| lang.split(['-', '_']).next())
        .map(|lang| lang.trim().to_ascii_lowercase())
        .filter(|lang| !lang.is_empty());

    PageMeta {
        title: document
            .select(&TITLE)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty()),
        description: attr_of(document, &DESCRIPTION, "content"),
        og_type: attr_of(document, &OG_TYPE, "content").map(|t| t.to_lowercase()),
        canonical: attr_of(document, &CANONICAL, "href"),
        lang,
    }
}

fn heading_texts(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Visible text under `root`, skipping script/navigation subtrees
fn visible_text(root: ElementRef) -> String {
    let mut parts = Vec::new();

    for node_ref in root.descendants() {
        if let Node::Text(text_node) = node_ref.value() {
            let skipped = node_ref.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
            });
            if skipped {
                continue;
            }
            let trimmed = text_node.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
    }

    normalize_whitespace(&parts.join(" "))
}

/// Longest main-content block, or the whole body
fn main_text(document: &Html) -> String {
    let best = MAIN_CONTENT
        .iter()
        .flat_map(|selector| document.select(selector))
        .map(visible_text)
        .max_by_key(String::len)
        .filter(|text| !text.is_empty());

    best.or_else(|| document.select(&BODY).next().map(visible_text))
        .unwrap_or_default()
}

fn collect_json_ld(value: &Value, types: &mut BTreeSet<String>, orgs: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_json_ld(item, types, orgs);
            }
        }
        Value::Object(map) => {
            let own_types: Vec<&str> = match map.get("@type") {
                Some(Value::String(t)) => vec![t.as_str()],
                Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            for t in &own_types {
                types.insert(t.to_string());
            }

            if own_types.iter().any(|t| ORGANIZATION_TYPES.contains(t)) {
                if let Some(name) = map.get("name").and_then(Value::as_str) {
                    let name = normalize_whitespace(name);
                    if !name.is_empty() && !orgs.contains(&name) {
                        orgs.push(name);
                    }
                }
            }

            // Nested entities (@graph, offers, brand, publisher, ...)
            for (key, nested) in map {
                if key != "@type" && (nested.is_object() || nested.is_array()) {
                    collect_json_ld(nested, types, orgs);
                }
            }
        }
        _ => {}
    }
}

/// schema.org types and organization names
fn structured_data(document: &Html) -> (BTreeSet<String>, Vec<String>) {
    let mut types = BTreeSet::new();
    let mut orgs = Vec::new();

    for script in document.select(&JSON_LD) {
        let raw: String = script.text().collect();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => collect_json_ld(&value, &mut types, &mut orgs),
            Err(e) => debug!("Skipping malformed JSON-LD block: {}", e),
        }
    }

    for el in document.select(&ITEMTYPE) {
        if let Some(itemtype) = el.value().attr("itemtype") {
            for t in itemtype.split_whitespace() {
                if let Some(name) = t.trim_end_matches('/').rsplit('/').next() {
                    if !name.is_empty() {
                        types.insert(name.to_string());
                    }
                }
            }
        }
    }

    (types, orgs)
}

fn links(document: &Html, base: &Url) -> Links {
    let host = base.host_str().map(site_host).unwrap_or_default();
    let mut seen = HashSet::new();
    let mut links = Links::default();

    for anchor in document.select(&ANCHORS) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }
        let Ok(mut resolved) = base.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        resolved.set_fragment(None);

        let resolved = resolved.to_string();
        if !seen.insert(resolved.clone()) {
            continue;
        }
        let internal = Url::parse(&resolved)
            .ok()
            .and_then(|u| u.host_str().map(site_host))
            .is_some_and(|h| h == host);
        if internal {
            links.internal.push(resolved);
        } else {
            links.external.push(resolved);
        }
    }

    links
}
