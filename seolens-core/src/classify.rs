//! Page classification
//!
//! Heuristic detection over a parsed page and its URL:
//! - page type (e-commerce, blog, mixed) from schema.org types, vocabulary and paths
//! - target audiences
//! - dominant search intent
//! - brand name and domain

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{clamp_unit, BrandInfo, Intent, PageType, ParsedPage};

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

static PRICE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(precio|price|cost|coste|costo|eur|usd)\b|[€$]"));
static CART_WORDS: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(añadir|agregar|add|carrito|cart|comprar|buy)\b"));
static PRODUCT_WORDS: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(producto|product|item|artículo|sku|código)\b"));
static COMMERCE_PATH: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)/(producto|product|tienda|shop|cart|carrito|checkout)/"));

static ARTICLE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(artículo|article|post|entrada|blog|noticia|news)\b"));
static AUTHOR_WORDS: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(autor|author|escrito|por|by)\b"));
static DATE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(fecha|date|publicado|published|ago|hace)\b"));
static BLOG_PATH: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)/(blog|articulo|article|post|noticia|news)/"));

const MONTHS: &str =
    "enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre";

static EXPLICIT_DATE: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        re(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b"),
        re(&format!(r"(?i)\b({MONTHS})\s+\d{{1,2}},?\s+\d{{4}}\b")),
        re(&format!(r"(?i)\b\d{{1,2}}\s+de\s+({MONTHS})\s+de\s+\d{{4}}\b")),
    ]
});
static BYLINE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(por|escrito por|autor|author|publicado por|published by)\s+[a-z]+")
});

static AUDIENCES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        (
            "beginners",
            re(r"(?i)\b(principiantes|para empezar|básico|básica|iniciación|beginners?)\b"),
        ),
        (
            "professionals",
            re(r"(?i)\b(profesionales|empresas|b2b|corporativo|corporación|empresarial|professionals?)\b"),
        ),
        (
            "families",
            re(r"(?i)\b(niños|niñas|infantil|familia|familiar|padres|madres|kids|family|parents)\b"),
        ),
        (
            "students",
            re(r"(?i)\b(estudiantes|alumnos|universitarios|students?)\b"),
        ),
        (
            "gaming",
            re(r"(?i)\b(gaming|juegos|videojuegos|gamers?|playstation|xbox|nintendo)\b"),
        ),
    ]
});

const B2B_WORDS: &[&str] = &["empresa", "corporativ", "corporación", "b2b", "negocio", "business"];
const B2C_WORDS: &[&str] = &["consumidor", "cliente", "particular", "b2c", "consumer", "customer"];

static COMMERCIAL_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(comprar|precio|oferta|descuento|carrito|checkout|pagar|buy|price|discount)\b")
});
static COMMERCIAL_URL: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        re(r"(?i)/(comprar|buy|purchase|carrito|cart|checkout|pagar|payment)/"),
        re(r"(?i)/(oferta|offer|descuento|discount|promocion|promotion)/"),
        re(r"(?i)/(tienda|shop|store|venta|sale)/"),
    ]
});
static COMMERCIAL_CTA: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        re(r"(?i)\b(comprar ahora|buy now|añadir al carrito|add to cart)\b"),
        re(r"(?i)\b(solicitar presupuesto|request quote|contactar|contact)\b"),
        re(r"(?i)\b(reservar|book|reserve|inscribirse|sign up)\b"),
    ]
});

static CONSIDERATION_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(comparar|mejor|vs|versus|opiniones|review|reseña|comparativa|compare)\b")
});
static CONSIDERATION_URL: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        re(r"(?i)/(comparar|compare|comparativa|comparison|vs|versus)/"),
        re(r"(?i)/(mejor|best|top|ranking|rankings)/"),
        re(r"(?i)/(opiniones|reviews|reseñas|test|tests)/"),
    ]
});
static COMPARISON: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        re(r"(?i)\b(mejor|best|top|ranking)\s+\w+"),
        re(r"(?i)\b(comparar|compare|comparativa)\s+\w+"),
        re(r"(?i)\b(vs|versus|frente a)\b"),
        re(r"(?i)\b(pros y contras|pros and cons)\b"),
    ]
});

static INFORMATIONAL_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(guía|tutorial|cómo|qué es|qué son|definición|explicación|aprender|guide|how to)\b")
});
static INFORMATIONAL_URL: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        re(r"(?i)/(guia|guide|tutorial|tutoriales|como|cómo|how)/"),
        re(r"(?i)/(que-es|what-is|definicion|definition)/"),
        re(r"(?i)/(aprender|learn|conocimiento|knowledge)/"),
        re(r"(?i)/(blog|articulo|article|noticia|news)/"),
    ]
});
static EDUCATIONAL: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        re(r"(?i)\b(guía|guide|tutorial|tutoriales)\s+\w+"),
        re(r"(?i)\b(cómo|how to|como hacer)\b"),
        re(r"(?i)\b(qué es|what is|definición|definition)\b"),
        re(r"(?i)\b(aprender|learn|conocer|know)\b"),
        re(r"(?i)\b(paso a paso|step by step)\b"),
    ]
});

/// Classifier thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum e-commerce score for an e-commerce verdict
    pub ecommerce_threshold: f64,
    /// Score gap under which a page is mixed
    pub mixed_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ecommerce_threshold: 0.6,
            mixed_threshold: 0.1,
        }
    }
}

/// Full classification of one page
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub page_type: PageType,
    pub ecommerce_score: f64,
    pub blog_score: f64,
    pub audiences: BTreeSet<String>,
    pub intent: Intent,
    pub brand: BrandInfo,
}

/// Heuristic page classifier
#[derive(Debug, Clone, Default)]
pub struct PageClassifier {
    config: ClassifierConfig,
}

fn count_hits(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().filter(|p| p.is_match(text)).count()
}

impl PageClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, page: &ParsedPage, url: &str) -> Classification {
        let ecommerce_score = self.ecommerce_score(page, url);
        let blog_score = self.blog_score(page, url);
        let page_type = self.page_type_from_scores(ecommerce_score, blog_score);
        debug!(
            "Page type for {}: {:?} (ecommerce {:.2}, blog {:.2})",
            url, page_type, ecommerce_score, blog_score
        );

        Classification {
            page_type,
            ecommerce_score,
            blog_score,
            audiences: self.audiences(page),
            intent: self.intent(page, url),
            brand: detect_brand(page, url),
        }
    }

    pub fn ecommerce_score(&self, page: &ParsedPage, url: &str) -> f64 {
        let mut score = 0.0;
        if page.has_type("Product") {
            score += 0.4;
        }
        if page.has_type("Offer") {
            score += 0.3;
        }

        let text = page.content_text();
        if PRICE_WORDS.is_match(&text) {
            score += 0.2;
        }
        if CART_WORDS.is_match(&text) {
            score += 0.2;
        }
        if PRODUCT_WORDS.is_match(&text) {
            score += 0.15;
        }
        if COMMERCE_PATH.is_match(url) {
            score += 0.25;
        }
        if og_type_contains(page, "product") {
            score += 0.2;
        }
        for heading in page.headings.iter() {
            if PRICE_WORDS.is_match(heading) {
                score += 0.1;
            }
            if PRODUCT_WORDS.is_match(heading) {
                score += 0.1;
            }
        }

        clamp_unit(score)
    }

    pub fn blog_score(&self, page: &ParsedPage, url: &str) -> f64 {
        let mut score = 0.0;
        if page.has_type("Article") {
            score += 0.3;
        }
        if page.has_type("BlogPosting") {
            score += 0.4;
        }

        let text = page.content_text();
        if ARTICLE_WORDS.is_match(&text) {
            score += 0.2;
        }
        if AUTHOR_WORDS.is_match(&text) {
            score += 0.15;
        }
        if DATE_WORDS.is_match(&text) {
            score += 0.15;
        }
        if BLOG_PATH.is_match(url) {
            score += 0.3;
        }
        if og_type_contains(page, "article") {
            score += 0.2;
        }
        if EXPLICIT_DATE.iter().any(|p| p.is_match(&text)) {
            score += 0.1;
        }
        if BYLINE.is_match(&text) {
            score += 0.1;
        }

        clamp_unit(score)
    }

    pub fn page_type_from_scores(&self, ecommerce: f64, blog: f64) -> PageType {
        if (ecommerce - blog).abs() < self.config.mixed_threshold {
            PageType::Mixed
        } else if ecommerce > blog && ecommerce > self.config.ecommerce_threshold {
            PageType::Ecommerce
        } else if blog > ecommerce {
            PageType::Blog
        } else {
            PageType::Mixed
        }
    }

    pub fn audiences(&self, page: &ParsedPage) -> BTreeSet<String> {
        let text = page.all_text();
        let mut audiences: BTreeSet<String> = AUDIENCES
            .iter()
            .filter(|(_, pattern)| pattern.is_match(&text))
            .map(|(name, _)| name.to_string())
            .collect();

        let lower = text.to_lowercase();
        let count = |words: &[&str]| words.iter().map(|w| lower.matches(w).count()).sum::<usize>();
        let b2b = count(B2B_WORDS);
        let b2c = count(B2C_WORDS);
        if b2b > b2c && b2b > 2 {
            audiences.insert("B2B".to_string());
        } else if b2c > b2b && b2c > 2 {
            audiences.insert("B2C".to_string());
        }

        audiences
    }

    pub fn intent(&self, page: &ParsedPage, url: &str) -> Intent {
        let text = page.all_text();

        let mut commercial = 0.0;
        if COMMERCIAL_TEXT.is_match(&text) {
            commercial += 0.4;
        }
        commercial += 0.3 * count_hits(COMMERCIAL_URL.as_slice(), url) as f64;
        commercial += 0.2 * count_hits(COMMERCIAL_CTA.as_slice(), &text) as f64;

        let mut consideration = 0.0;
        if CONSIDERATION_TEXT.is_match(&text) {
            consideration += 0.4;
        }
        consideration += 0.3 * count_hits(CONSIDERATION_URL.as_slice(), url) as f64;
        consideration += 0.2 * count_hits(COMPARISON.as_slice(), &text) as f64;

        let mut informational = 0.0;
        if INFORMATIONAL_TEXT.is_match(&text) {
            informational += 0.4;
        }
        informational += 0.3 * count_hits(INFORMATIONAL_URL.as_slice(), url) as f64;
        informational += 0.2 * count_hits(EDUCATIONAL.as_slice(), &text) as f64;
        let words = text.split_whitespace().count();
        if words > 500 {
            informational += 0.1;
        }
        if words > 1000 {
            informational += 0.1;
        }

        let scores = [
            (Intent::Commercial, clamp_unit(commercial)),
            (Intent::Consideration, clamp_unit(consideration)),
            (Intent::Informational, clamp_unit(informational)),
        ];
        // Strictly greater keeps the earliest intent on ties
        let (mut best, mut best_score) = (Intent::Informational, f64::MIN);
        for (intent, score) in scores {
            if score > best_score {
                best = intent;
                best_score = score;
            }
        }
        if best_score < 0.1 {
            Intent::Informational
        } else {
            best
        }
    }
}

fn og_type_contains(page: &ParsedPage, needle: &str) -> bool {
    page.meta
        .og_type
        .as_deref()
        .is_some_and(|t| t.to_lowercase().contains(needle))
}

/// Host of a URL without any `www.` prefix
pub fn brand_domain(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Detect the brand from structured data, falling back to the title
pub fn detect_brand(page: &ParsedPage, url: &str) -> BrandInfo {
    let mut brand = BrandInfo {
        domain: brand_domain(url),
        ..Default::default()
    };

    if let Some(name) = page
        .organization_names
        .iter()
        .map(|n| n.trim())
        .find(|n| !n.is_empty())
    {
        return brand.with_name(name, 0.8);
    }

    let title = page.title();
    let candidate = title
        .split(" - ")
        .next()
        .and_then(|part| part.split(" | ").next())
        .unwrap_or_default()
        .trim();
    let len = candidate.chars().count();
    if len > 2 && len < 50 {
        brand = brand.with_name(candidate, 0.3);
    }
    brand
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Headings, PageMeta};

    fn product_page() -> ParsedPage {
        ParsedPage {
            meta: PageMeta {
                title: Some("Acme Laptop X1 | Acme Store".into()),
                og_type: Some("product".into()),
                ..Default::default()
            },
            headings: Headings {
                h1: vec!["Acme Laptop X1 price".into()],
                ..Default::default()
            },
            main_text: "Price 999 USD. Add to cart now. Product SKU 1234.".into(),
            structured_types: ["Product".to_string(), "Offer".to_string()].into(),
            ..Default::default()
        }
    }

    fn blog_page() -> ParsedPage {
        ParsedPage {
            meta: PageMeta {
                title: Some("How to choose a laptop - Acme Blog".into()),
                og_type: Some("article".into()),
                ..Default::default()
            },
            main_text: "Published by Jane Doe on 12/03/2024. This guide explains how to pick a \
                        laptop step by step for students."
                .into(),
            structured_types: ["BlogPosting".to_string()].into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_product_page_is_ecommerce() {
        let classifier = PageClassifier::default();
        let page = product_page();
        let result = classifier.classify(&page, "https://acme.com/product/x1/");
        assert_eq!(result.page_type, PageType::Ecommerce);
        assert_eq!(result.ecommerce_score, 1.0);
        assert_eq!(result.intent, Intent::Commercial);
    }

    #[test]
    fn test_blog_page_is_blog() {
        let classifier = PageClassifier::default();
        let page = blog_page();
        let result = classifier.classify(&page, "https://acme.com/blog/choose-laptop/");
        assert_eq!(result.page_type, PageType::Blog);
        assert_eq!(result.intent, Intent::Informational);
        assert!(result.audiences.contains("students"));
    }

    #[test]
    fn test_page_type_thresholds() {
        let classifier = PageClassifier::default();
        assert_eq!(classifier.page_type_from_scores(0.5, 0.45), PageType::Mixed);
        assert_eq!(classifier.page_type_from_scores(0.5, 0.2), PageType::Mixed);
        assert_eq!(classifier.page_type_from_scores(0.7, 0.2), PageType::Ecommerce);
        assert_eq!(classifier.page_type_from_scores(0.2, 0.5), PageType::Blog);
    }

    #[test]
    fn test_empty_page_defaults() {
        let classifier = PageClassifier::default();
        let result = classifier.classify(&ParsedPage::default(), "https://example.com/");
        assert_eq!(result.page_type, PageType::Mixed);
        assert_eq!(result.intent, Intent::Informational);
        assert!(result.audiences.is_empty());
    }

    #[test]
    fn test_b2b_audience() {
        let page = ParsedPage {
            main_text: "Soluciones para empresas. Cada empresa y negocio necesita un \
                        servicio corporativo."
                .into(),
            ..Default::default()
        };
        let audiences = PageClassifier::default().audiences(&page);
        assert!(audiences.contains("B2B"));
    }

    #[test]
    fn test_brand_from_structured_data() {
        let page = ParsedPage {
            organization_names: vec!["Acme Corp".into()],
            ..product_page()
        };
        let brand = detect_brand(&page, "https://www.acme.com/product/x1");
        assert_eq!(brand.name.as_deref(), Some("Acme Corp"));
        assert_eq!(brand.domain.as_deref(), Some("acme.com"));
        assert_eq!(brand.confidence, 0.8);
    }

    #[test]
    fn test_brand_from_title() {
        let brand = detect_brand(&blog_page(), "https://acme.com/blog/x");
        assert_eq!(brand.name.as_deref(), Some("How to choose a laptop"));
        assert_eq!(brand.confidence, 0.3);

        let untitled = detect_brand(&ParsedPage::default(), "https://acme.com/");
        assert_eq!(untitled.name, None);
        assert_eq!(untitled.domain.as_deref(), Some("acme.com"));
    }
}
