//! Resolver configuration
//!
//! Holds the tunables of the rating resolution core. `ResolverConfig::default()`
//! gives the values the resolver was designed around.

use std::time::Duration;

/// How long a cached rating stays fresh (6 hours)
pub const CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Maximum number of ratings kept in the persistent cache
pub const MAX_CACHE_ENTRIES: usize = 200;

/// Per-candidate network timeout in milliseconds
pub const FETCH_TIMEOUT_MS: u64 = 12_000;

/// Bodies shorter than this are treated as stub or error pages
pub const MIN_RESPONSE_BYTES: usize = 200;

/// Storage key under which the whole rating map is persisted
pub const CACHE_STORAGE_KEY: &str = "vivinoRatingCache";

/// Placeholder replaced by the percent-encoded wine name in URL templates
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Search endpoint templates, tried in order
pub const URL_CANDIDATES: &[&str] = &[
    "https://www.vivino.com/en/search/wines?q={query}",
    "https://www.vivino.com/search/wines?q={query}",
];

/// Configuration for the rating resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Lifetime of a cache entry before it is lazily expired
    pub cache_ttl: Duration,
    /// Capacity bound of the persistent cache
    pub max_cache_entries: usize,
    /// Timeout applied to each URL candidate separately
    pub fetch_timeout: Duration,
    /// Minimum body size for a response to count as a real page
    pub min_response_bytes: usize,
    /// Ordered search URL templates containing `{query}`
    pub url_candidates: Vec<String>,
    /// Whether requests keep cookies set by the upstream site
    pub retain_credentials: bool,
    /// Key of the persisted rating map in the key-value store
    pub storage_key: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: CACHE_TTL,
            max_cache_entries: MAX_CACHE_ENTRIES,
            fetch_timeout: Duration::from_millis(FETCH_TIMEOUT_MS),
            min_response_bytes: MIN_RESPONSE_BYTES,
            url_candidates: URL_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            retain_credentials: true,
            storage_key: CACHE_STORAGE_KEY.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Expands the URL templates for a wine name
    ///
    /// The name is trimmed and percent-encoded before substitution. Templates
    /// without a placeholder are used verbatim.
    pub fn candidate_urls(&self, wine_name: &str) -> Vec<String> {
        let encoded = urlencoding::encode(wine_name.trim());
        self.url_candidates
            .iter()
            .map(|template| template.replace(QUERY_PLACEHOLDER, &encoded))
            .collect()
    }
}
