//! Extraction from the older card-based search result markup
//!
//! Each search hit used to be rendered as a "card" holding a link to the wine,
//! the average rating, and a "N ratings" caption. Class names drifted over time,
//! so cards and every piece inside them are looked up through ordered lists of
//! progressively looser selectors.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use super::html::{element_text, spaced_text};
use super::{ExtractionStrategy, ParseError, VIVINO_BASE_URL};
use crate::data::RatingResult;

lazy_static! {
    /// Card elements, most specific first
    static ref CARD_SELECTORS: Vec<Selector> = selectors(&[
        ".wine-card__content",
        r#"[class*="wine-card"], [class*="wineCard"], [class*="winecard"], [class*="WineCard"]"#,
        r#"[data-testid*="wine"], [data-testid*="Wine"]"#,
    ]);

    /// Wine links inside a card
    static ref LINK_SELECTORS: Vec<Selector> = selectors(&[
        "a.link-color-alt-grey[href]",
        r#"a[href*="/wines/"], a[href*="/w/"]"#,
    ]);

    /// Elements holding the average rating, each with the text shape it must have
    static ref RATING_PATTERNS: Vec<(Selector, Regex)> = vec![
        (selector(".average__number"), pattern(r"^([0-9]+(?:[.,][0-9]+)?)$")),
        (
            selector(r#"[class*="average"], [class*="Average"]"#),
            pattern(r"^([0-9](?:[.,][0-9]+)?)$"),
        ),
        (
            selector(r#"[class*="rating"], [class*="Rating"]"#),
            pattern(r"^([0-9][.,][0-9])$"),
        ),
    ];

    /// Caption that carries the review count on most card layouts
    static ref CAPTION_SELECTOR: Selector = selector(".text-micro");

    /// "1,234 ratings"; group 1 is one digit group with its thousands separators
    static ref REVIEW_COUNT: Regex =
        pattern(r"(?i)\b([0-9]{1,3}(?:[.,\x{A0}\x{202F}][0-9]{3})+|[0-9]+)\s*ratings?\b");
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid CSS selector")
}

fn selectors(css: &[&str]) -> Vec<Selector> {
    css.iter().map(|c| selector(c)).collect()
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("Invalid regex pattern")
}

/// Reads the first complete card from legacy search markup
#[derive(Debug, Clone)]
pub struct LegacyCardStrategy {
    base_url: String,
}

impl Default for LegacyCardStrategy {
    fn default() -> Self {
        Self::with_base_url(VIVINO_BASE_URL)
    }
}

impl LegacyCardStrategy {
    /// Creates a strategy that resolves relative links against `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Reads one card element
    ///
    /// `Ok(None)` if a piece is missing, an error if a piece is present but unreadable.
    fn read_card(&self, card: ElementRef<'_>) -> Result<Option<RatingResult>, ParseError> {
        let Some((href, display_name)) = find_link(card) else {
            return Ok(None);
        };
        let Some(rating_text) = find_rating(card) else {
            return Ok(None);
        };
        let Some(count_text) = find_review_count(card) else {
            return Ok(None);
        };

        let rating = parse_rating(&rating_text)?;
        let review_count = parse_count(&count_text)?;
        let detail_url = self.absolute_url(href)?;

        Ok(Some(RatingResult {
            rating,
            review_count,
            display_name,
            detail_url,
        }))
    }

    fn absolute_url(&self, href: &str) -> Result<String, ParseError> {
        let href = href.trim();
        Url::parse(&self.base_url)
            .and_then(|base| base.join(href))
            .map(String::from)
            .map_err(|e| ParseError::InvalidLink {
                href: href.to_string(),
                reason: e.to_string(),
            })
    }
}

impl ExtractionStrategy for LegacyCardStrategy {
    fn name(&self) -> &'static str {
        "legacy-cards"
    }

    fn extract(&self, html: &str) -> Result<Option<RatingResult>, ParseError> {
        let document = Html::parse_document(html);

        for card in cards(&document) {
            match self.read_card(card) {
                Ok(Some(result)) => return Ok(Some(result)),
                Ok(None) => {}
                Err(e) => debug!("Skipping card: {}", e),
            }
        }
        Ok(None)
    }
}

/// Card elements in document order, from the first selector that matches any
///
/// A looser selector can also match a card's own children; the enclosing card
/// comes first in document order and holds the whole subtree.
fn cards(document: &Html) -> Vec<ElementRef<'_>> {
    CARD_SELECTORS
        .iter()
        .map(|s| document.select(s).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default()
}

/// Finds the wine link in a card, preferring one with visible text
///
/// Returns the raw href and the link's display text.
fn find_link<'a>(card: ElementRef<'a>) -> Option<(&'a str, String)> {
    let mut fallback = None;

    for selector in LINK_SELECTORS.iter() {
        for link in card.select(selector) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let text = element_text(link);
            if !text.is_empty() {
                return Some((href, text));
            }
            fallback.get_or_insert((href, text));
        }
    }
    fallback
}

fn find_rating(card: ElementRef<'_>) -> Option<String> {
    RATING_PATTERNS.iter().find_map(|(selector, shape)| {
        card.select(selector).find_map(|element| {
            let text = element_text(element);
            shape
                .captures(&text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
    })
}

/// Looks for the count in caption elements first, then anywhere in the card
fn find_review_count(card: ElementRef<'_>) -> Option<String> {
    card.select(&CAPTION_SELECTOR)
        .map(spaced_text)
        .chain(std::iter::once(spaced_text(card)))
        .find_map(|text| review_count_in(&text).map(str::to_string))
}

fn review_count_in(text: &str) -> Option<&str> {
    REVIEW_COUNT
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Parses a rating that may use a comma as decimal separator
fn parse_rating(text: &str) -> Result<f64, ParseError> {
    let normalized = text.trim().replace(',', ".");
    normalized
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber(text.to_string()))
}

/// Parses a count that may contain thousands separators ("1,234", "1.234", "12 345")
fn parse_count(text: &str) -> Result<u64, ParseError> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits
        .parse()
        .map_err(|_| ParseError::InvalidNumber(text.to_string()))
}
