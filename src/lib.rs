//! Vivino rating resolution
//!
//! Resolves free-text wine names, as shown on a retailer's page, to Vivino rating
//! records. Lookups are cached persistently with a TTL and a capacity bound,
//! concurrent lookups for the same wine are coalesced into one request, search
//! URLs are tried in order with a per-request timeout, and ratings are read from
//! whichever page format Vivino happens to serve.
//!
//! ```no_run
//! use vinorate::{RatingOutcome, RatingResolver, ResolverConfig};
//!
//! # async fn run() -> Result<(), vinorate::FetchError> {
//! let resolver = RatingResolver::connect(ResolverConfig::default())?;
//! match resolver.resolve("Baron de Ley Reserva 2018").await {
//!     RatingOutcome::Rated(r) => println!("{}: {} ({} ratings)", r.display_name, r.rating, r.review_count),
//!     RatingOutcome::LookupFailed => println!("lookup failed"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod data;
pub mod fetch;
pub mod normalize;
pub mod parser;
pub mod resolver;

#[cfg(test)]
mod test_support;

pub use cache::{FileStore, KeyValueStore, MemoryStore, RatingCache, StoreError};
pub use config::ResolverConfig;
pub use data::{RatingOutcome, RatingResult};
pub use fetch::{FetchError, FetchOptions, Fetcher, HttpClient, HttpResponse, ReqwestHttpClient};
pub use normalize::normalize;
pub use parser::{ExtractionStrategy, ParseError, ParserPipeline};
pub use resolver::RatingResolver;
