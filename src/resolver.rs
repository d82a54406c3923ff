//! Rating resolution façade
//!
//! `RatingResolver` turns a wine name into a `RatingOutcome`: it checks the
//! persistent cache, joins or starts a coalesced lookup, fetches the Vivino
//! search page, extracts the rating, and caches successful results.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{info, warn};

use crate::cache::{FileStore, KeyValueStore, MemoryStore, RatingCache};
use crate::coalesce::InFlightCoalescer;
use crate::config::ResolverConfig;
use crate::data::{RatingOutcome, RatingResult};
use crate::fetch::{FetchError, FetchOptions, Fetcher, HttpClient, ReqwestHttpClient};
use crate::normalize::normalize;
use crate::parser::ParserPipeline;

/// Everything a single uncached lookup needs, detached from the coalescer
#[derive(Clone)]
struct LookupContext {
    cache: RatingCache,
    fetcher: Fetcher,
    pipeline: Arc<ParserPipeline>,
    options: FetchOptions,
}

impl LookupContext {
    /// Fetches and parses the rating for `key`, caching any result
    async fn lookup(&self, key: &str, urls: &[String]) -> RatingOutcome {
        // A lookup that settled between our cache miss and registration already stored its result
        if let Some(hit) = self.cache.get(key).await {
            return RatingOutcome::Rated(hit);
        }

        info!("Looking up '{}' on Vivino", key);
        let html = match self.fetcher.fetch_text(urls, &self.options).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Lookup for '{}' failed: {}", key, e);
                return RatingOutcome::LookupFailed;
            }
        };

        let result = self.pipeline.extract(&html).unwrap_or_else(|| {
            info!("No rating data found for '{}'", key);
            RatingResult::empty()
        });

        self.cache.set(key, result.clone()).await;
        info!(
            "Resolved '{}' to {} ({} ratings)",
            key, result.rating, result.review_count
        );
        RatingOutcome::Rated(result)
    }
}

/// Resolves wine names to Vivino ratings
///
/// Cheap to clone; clones share the cache, the in-flight map, and the HTTP client.
#[derive(Clone)]
pub struct RatingResolver {
    config: Arc<ResolverConfig>,
    context: LookupContext,
    coalescer: InFlightCoalescer<RatingOutcome>,
}

impl RatingResolver {
    /// Creates a resolver over the given HTTP and storage capabilities
    pub fn new(
        config: ResolverConfig,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let context = LookupContext {
            cache: RatingCache::from_config(store, &config),
            fetcher: Fetcher::new(http, config.min_response_bytes),
            pipeline: Arc::new(ParserPipeline::default()),
            options: FetchOptions {
                timeout: config.fetch_timeout,
                retain_credentials: config.retain_credentials,
            },
        };

        Self {
            config: Arc::new(config),
            context,
            coalescer: InFlightCoalescer::new(),
        }
    }

    /// Creates a resolver using reqwest and the on-disk cache
    ///
    /// Falls back to an in-memory cache when no cache directory can be determined.
    pub fn connect(config: ResolverConfig) -> Result<Self, FetchError> {
        let http = Arc::new(ReqwestHttpClient::new()?);
        let store: Arc<dyn KeyValueStore> = match FileStore::new() {
            Some(store) => {
                info!("Caching ratings in {}", store.dir().display());
                Arc::new(store)
            }
            None => {
                warn!("No cache directory available; ratings are cached in memory only");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::new(config, http, store))
    }

    /// Replaces the extraction pipeline
    pub fn with_pipeline(mut self, pipeline: ParserPipeline) -> Self {
        self.context.pipeline = Arc::new(pipeline);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Number of lookups currently hitting the network
    pub fn in_flight_count(&self) -> usize {
        self.coalescer.in_flight_count()
    }

    /// Resolves a display name to a rating
    ///
    /// Never fails: a lookup that could not complete is reported as
    /// `RatingOutcome::LookupFailed` and is not cached, so the next call retries.
    /// A page without rating data yields the cached known-empty result.
    ///
    /// # Arguments
    /// * `raw_name` - Wine name as shown by the retailer
    pub async fn resolve(&self, raw_name: &str) -> RatingOutcome {
        let key = normalize(raw_name);
        if key.is_empty() {
            return RatingOutcome::Rated(RatingResult::empty());
        }

        if let Some(hit) = self.context.cache.get(&key).await {
            return RatingOutcome::Rated(hit);
        }

        let lookup = self.coalescer.get_or_create(&key, || {
            let context = self.context.clone();
            let urls = self.config.candidate_urls(raw_name);
            let key = key.clone();

            async move {
                AssertUnwindSafe(context.lookup(&key, &urls))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        warn!("Lookup for '{}' panicked", key);
                        RatingOutcome::LookupFailed
                    })
            }
        });

        lookup.await
    }
}
