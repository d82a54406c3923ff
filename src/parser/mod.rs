//! Rating extraction from Vivino search pages
//!
//! Vivino has served several incompatible page formats over time. Extraction is
//! an ordered chain of strategies: the embedded JSON state first, then the older
//! card markup. The first strategy that finds a rating wins; a strategy that
//! fails is treated as having found nothing.

mod html;
mod legacy;
mod structured;

use log::debug;
use thiserror::Error;

use crate::data::RatingResult;

pub use legacy::LegacyCardStrategy;
pub use structured::{StateLocation, StructuredStateStrategy};

/// Base URL that relative wine links resolve against
pub const VIVINO_BASE_URL: &str = "https://www.vivino.com";

/// Errors a strategy can hit while reading a page
#[derive(Debug, Error)]
pub enum ParseError {
    /// An embedded state blob was not valid JSON of the expected shape
    #[error("Failed to parse embedded JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A field needed to build a result was absent
    #[error("Missing expected field: {0}")]
    MissingField(&'static str),

    /// A number in the markup could not be read
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    /// A link could not be turned into an absolute URL
    #[error("Invalid link '{href}': {reason}")]
    InvalidLink { href: String, reason: String },
}

/// One way of reading a rating out of a page
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Reads a rating from `html`
    ///
    /// # Returns
    /// * `Ok(Some(RatingResult))` if this strategy found a rating
    /// * `Ok(None)` if the page has no data in the form this strategy understands
    /// * `Err(ParseError)` if the data was there but unreadable
    fn extract(&self, html: &str) -> Result<Option<RatingResult>, ParseError>;
}

/// Ordered chain of extraction strategies
pub struct ParserPipeline {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for ParserPipeline {
    /// Structured state first, legacy card markup as fallback
    fn default() -> Self {
        Self::new(vec![
            Box::new(StructuredStateStrategy::default()),
            Box::new(LegacyCardStrategy::default()),
        ])
    }
}

impl ParserPipeline {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Extracts a rating with the first strategy that finds one
    ///
    /// # Returns
    /// * `Some(RatingResult)` from the first successful strategy
    /// * `None` if no strategy found rating data
    pub fn extract(&self, html: &str) -> Option<RatingResult> {
        for strategy in &self.strategies {
            match strategy.extract(html) {
                Ok(Some(result)) => {
                    debug!("{} extracted '{}'", strategy.name(), result.display_name);
                    return Some(result);
                }
                Ok(None) => debug!("{} found no rating data", strategy.name()),
                Err(e) => debug!("{} failed: {}", strategy.name(), e),
            }
        }
        None
    }
}
