//! Sitemap parsing and traversal
//!
//! Reads sitemaps.org documents (`urlset` and `sitemapindex`), optionally
//! gzip-compressed, and expands indexes into a flat list of URL records.
//! A malformed or unreachable sitemap only drops its own branch.

use std::collections::{HashSet, VecDeque};
use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use seolens_core::{ChangeFrequency, UrlRecord};

use crate::fetcher::PageFetcher;

/// Errors from parsing a single sitemap document
#[derive(Debug, Error, PartialEq)]
pub enum SitemapParseError {
    #[error("Malformed XML: {0}")]
    Xml(String),

    #[error("Document ended inside an open element")]
    Truncated,

    #[error("Not a sitemap document (root <{0}>)")]
    UnknownRoot(String),

    #[error("Document has no root element")]
    Empty,

    #[error("Failed to decompress sitemap: {0}")]
    Decompress(String),
}

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// Leaf document listing page URLs
    UrlSet(Vec<UrlRecord>),
    /// Index listing child sitemap URLs
    Index(Vec<String>),
}

/// Sitemap traversal limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    /// Records collected before traversal stops
    pub max_records: usize,
    /// Sitemap documents fetched before traversal stops
    pub max_sitemaps: usize,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            max_records: 5000,
            max_sitemaps: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Root {
    UrlSet,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Loc,
    LastMod,
    ChangeFreq,
    Priority,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"loc" => Some(Field::Loc),
            b"lastmod" => Some(Field::LastMod),
            b"changefreq" => Some(Field::ChangeFreq),
            b"priority" => Some(Field::Priority),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    loc: String,
    lastmod: String,
    changefreq: String,
    priority: String,
}

impl Entry {
    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Loc => &mut self.loc,
            Field::LastMod => &mut self.lastmod,
            Field::ChangeFreq => &mut self.changefreq,
            Field::Priority => &mut self.priority,
        };
        target.push_str(text);
    }

    fn into_record(self) -> Option<UrlRecord> {
        let loc = self.loc.trim();
        if loc.is_empty() {
            return None;
        }
        let priority = self
            .priority
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite())
            .unwrap_or(UrlRecord::DEFAULT_PRIORITY);

        Some(
            UrlRecord::new(loc)
                .with_priority(priority)
                .with_last_modified(parse_lastmod(&self.lastmod))
                .with_change_frequency(ChangeFrequency::parse(&self.changefreq)),
        )
    }
}

/// Parse a W3C datetime or plain date
pub fn parse_lastmod(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a sitemap or sitemap index
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, SitemapParseError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut root = None;
    let mut depth = 0usize;
    let mut entry: Option<Entry> = None;
    let mut field: Option<Field> = None;
    let mut records = Vec::new();
    let mut children = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = e.local_name();
                let name = name.as_ref();
                match depth {
                    1 => {
                        root = Some(match name {
                            b"urlset" => Root::UrlSet,
                            b"sitemapindex" => Root::Index,
                            other => {
                                return Err(SitemapParseError::UnknownRoot(
                                    String::from_utf8_lossy(other).into_owned(),
                                ))
                            }
                        });
                    }
                    2 if name == b"url" || name == b"sitemap" => entry = Some(Entry::default()),
                    3 if entry.is_some() => field = Field::from_name(name),
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(entry), Some(field)) = (entry.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map_err(|e| SitemapParseError::Xml(e.to_string()))?;
                    entry.push(field, &text);
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(entry), Some(field)) = (entry.as_mut(), field) {
                    entry.push(field, &String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                match depth {
                    3 => field = None,
                    2 => {
                        if let Some(done) = entry.take() {
                            match root {
                                Some(Root::UrlSet) => records.extend(done.into_record()),
                                Some(Root::Index) => {
                                    let loc = done.loc.trim();
                                    if !loc.is_empty() {
                                        children.push(loc.to_string());
                                    }
                                }
                                None => {}
                            }
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SitemapParseError::Xml(e.to_string())),
            _ => {}
        }
    }

    if depth != 0 {
        return Err(SitemapParseError::Truncated);
    }
    match root {
        Some(Root::UrlSet) => Ok(SitemapDocument::UrlSet(records)),
        Some(Root::Index) => Ok(SitemapDocument::Index(children)),
        None => Err(SitemapParseError::Empty),
    }
}

/// Whether bytes start with the gzip magic number
fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x1f, 0x8b])
}

/// Decode a sitemap body, inflating gzip when needed
pub fn decode_sitemap_body(url: &str, bytes: &[u8]) -> Result<String, SitemapParseError> {
    if is_gzip(bytes) || (url.ends_with(".gz") && !bytes.starts_with(b"<")) {
        let mut decoder = GzDecoder::new(bytes);
        let mut inflated = Vec::new();
        decoder
            .read_to_end(&mut inflated)
            .map_err(|e| SitemapParseError::Decompress(e.to_string()))?;
        return Ok(String::from_utf8_lossy(&inflated).into_owned());
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Expand a sitemap (and any nested indexes) into URL records
///
/// `root_body` lets the caller reuse a body it already fetched. Records are
/// de-duplicated by URL and returned in discovery order.
pub async fn expand_sitemaps(
    fetcher: &dyn PageFetcher,
    root_url: &str,
    root_body: Option<Vec<u8>>,
    config: &SitemapConfig,
) -> Vec<UrlRecord> {
    let mut queue: VecDeque<(String, Option<Vec<u8>>)> = VecDeque::new();
    queue.push_back((root_url.to_string(), root_body));

    let mut processed: HashSet<String> = HashSet::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    while let Some((url, body)) = queue.pop_front() {
        if records.len() >= config.max_records {
            break;
        }
        if !processed.insert(url.clone()) {
            debug!("Sitemap {} already processed", url);
            continue;
        }
        if processed.len() > config.max_sitemaps {
            warn!("Sitemap limit ({}) reached, stopping traversal", config.max_sitemaps);
            break;
        }

        let body = match body {
            Some(body) => body,
            None => match fetcher.fetch(&url).await {
                Ok(page) => page.body,
                Err(e) => {
                    warn!("Skipping sitemap {}: {}", url, e);
                    continue;
                }
            },
        };

        let document = decode_sitemap_body(&url, &body).and_then(|xml| parse_sitemap(&xml));
        match document {
            Ok(SitemapDocument::UrlSet(entries)) => {
                debug!("Sitemap {} lists {} URLs", url, entries.len());
                for record in entries {
                    if records.len() >= config.max_records {
                        break;
                    }
                    if seen_urls.insert(record.url.clone()) {
                        records.push(record);
                    }
                }
            }
            Ok(SitemapDocument::Index(children)) => {
                debug!("Sitemap index {} lists {} sitemaps", url, children.len());
                for child in children {
                    if !processed.contains(&child) {
                        queue.push_back((child, None));
                    }
                }
            }
            Err(e) => warn!("Skipping malformed sitemap {}: {}", url, e),
        }
    }

    info!("Collected {} URLs from {} sitemaps", records.len(), processed.len());
    records
}
