//! Extraction from the JSON state Vivino embeds in its search pages

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;

use super::{ExtractionStrategy, ParseError, VIVINO_BASE_URL};
use crate::data::RatingResult;

/// Attribute holding the entity-escaped state JSON
const STATE_ATTRIBUTE_NAME: &str = "data-preloaded-state";

lazy_static! {
    static ref STATE_ATTRIBUTE: Selector =
        Selector::parse("[data-preloaded-state]").expect("Invalid CSS selector");

    /// `window.__PRELOADED_STATE__ = {...}` in an inline script, value is raw JSON
    static ref STATE_SCRIPT: Regex =
        Regex::new(r"window\.__PRELOADED_STATE__\s*=\s*")
            .expect("Invalid regex pattern");
}

/// Where in a page the state blob can live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateLocation {
    /// Entity-escaped JSON in a `data-preloaded-state` attribute
    PreloadedStateAttribute,
    /// Raw JSON assigned to `window.__PRELOADED_STATE__`
    PreloadedStateScript,
}

impl StateLocation {
    /// Finds the blob and decodes it to JSON text
    fn locate(self, html: &str) -> Option<String> {
        match self {
            StateLocation::PreloadedStateAttribute => {
                // The parser decodes entities in attribute values
                let document = Html::parse_document(html);
                let state = document
                    .select(&STATE_ATTRIBUTE)
                    .find_map(|element| element.value().attr(STATE_ATTRIBUTE_NAME))
                    .map(str::to_string);
                state
            }
            StateLocation::PreloadedStateScript => {
                let assignment = STATE_SCRIPT.find(html)?;
                balanced_object(&html[assignment.end()..]).map(str::to_string)
            }
        }
    }
}

/// Reads the first search match out of the embedded page state
#[derive(Debug, Clone)]
pub struct StructuredStateStrategy {
    locations: Vec<StateLocation>,
}

impl Default for StructuredStateStrategy {
    fn default() -> Self {
        Self::new(vec![
            StateLocation::PreloadedStateAttribute,
            StateLocation::PreloadedStateScript,
        ])
    }
}

impl StructuredStateStrategy {
    /// Creates a strategy that checks `locations` in order
    pub fn new(locations: Vec<StateLocation>) -> Self {
        Self { locations }
    }
}

impl ExtractionStrategy for StructuredStateStrategy {
    fn name(&self) -> &'static str {
        "structured-state"
    }

    fn extract(&self, html: &str) -> Result<Option<RatingResult>, ParseError> {
        for location in &self.locations {
            let Some(json) = location.locate(html) else {
                continue;
            };

            match rating_from_state(&json) {
                Ok(Some(result)) => return Ok(Some(result)),
                Ok(None) => log::debug!("{:?} holds no search matches", location),
                Err(e) => log::debug!("{:?} unusable: {}", location, e),
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct PreloadedState {
    search_results: Option<SearchResults>,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    matches: Vec<SearchMatch>,
}

#[derive(Debug, Deserialize)]
struct SearchMatch {
    vintage: Option<Vintage>,
}

#[derive(Debug, Deserialize)]
struct Vintage {
    name: Option<String>,
    wine: Option<Wine>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct Wine {
    id: Option<u64>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Statistics {
    ratings_average: Option<f64>,
    ratings_count: Option<u64>,
}

/// Builds a rating from the first match of a decoded state blob
///
/// `Ok(None)` when there are no matches; an error when the first match lacks
/// the vintage or the wine id.
fn rating_from_state(json: &str) -> Result<Option<RatingResult>, ParseError> {
    let state: PreloadedState = serde_json::from_str(json)?;

    let Some(first) = state
        .search_results
        .and_then(|results| results.matches.into_iter().next())
    else {
        return Ok(None);
    };

    let vintage = first.vintage.ok_or(ParseError::MissingField("vintage"))?;
    let wine = vintage.wine.ok_or(ParseError::MissingField("vintage.wine"))?;
    let wine_id = wine.id.ok_or(ParseError::MissingField("vintage.wine.id"))?;

    let display_name = non_empty(vintage.name)
        .or_else(|| non_empty(wine.name))
        .unwrap_or_default();
    let (rating, review_count) = vintage
        .statistics
        .map(|s| (s.ratings_average.unwrap_or(0.0), s.ratings_count.unwrap_or(0)))
        .unwrap_or((0.0, 0));

    Ok(Some(RatingResult {
        rating,
        review_count,
        display_name,
        detail_url: format!("{}/wines/{}", VIVINO_BASE_URL, wine_id),
    }))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Returns the JSON object at the start of `text`, delimited by its matching brace
///
/// Braces inside string literals are ignored. `None` if `text` does not start
/// with an object or the object is unterminated.
fn balanced_object(text: &str) -> Option<&str> {
    let text = text.trim_start();
    if !text.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, byte) in text.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
