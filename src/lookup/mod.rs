pub use async_trait::async_trait;

pub mod openalex;
pub mod scopus;

use crate::entry::{Hit, Provenance, SearchMode};
use crate::interrupt::{Cancelled, Interrupt};
use crate::stats::RunStats;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

pub(crate) const USER_AGENT: &str = concat!("scopusid/", env!("CARGO_PKG_VERSION"));

/// Transport timeout for every request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after each item's lookups to stay under the service quota
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Pause after a 429 before moving on
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("Unauthorized, check the API key")]
    Unauthorized,
    #[error("Rate limited, try again later")]
    RateLimited,
    #[error("Unexpected status code: {0}")]
    Status(u16),
}

/// A remote bibliographic search service
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Exact lookup by DOI
    async fn search_by_doi(&self, doi: &str) -> Result<Option<Hit>, LookupError>;

    /// Best single match for a title
    async fn search_by_title(&self, title: &str) -> Result<Option<Hit>, LookupError>;

    fn name(&self) -> &'static str;
}

/// Outcome of the primary + fallback sequence for one item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub hit: Hit,
    /// Service that supplied the data, if any did
    pub source: Option<Provenance>,
}

impl Resolution {
    pub fn has_scopus_id(&self) -> bool {
        self.hit.scopus_id.is_some()
    }
}

/// Runs the primary search and falls back to the metadata service when no
/// Scopus ID comes back. Service errors never escape; only [`Cancelled`] does.
pub struct LookupClient {
    primary: Box<dyn SearchService>,
    fallback: Box<dyn SearchService>,
    stats: Arc<RunStats>,
    interrupt: Interrupt,
    delay: Duration,
    backoff: Duration,
}

impl LookupClient {
    pub fn new(
        primary: Box<dyn SearchService>,
        fallback: Box<dyn SearchService>,
        stats: Arc<RunStats>,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            primary,
            fallback,
            stats,
            interrupt,
            delay: DEFAULT_DELAY,
            backoff: RATE_LIMIT_BACKOFF,
        }
    }

    pub fn with_delays(mut self, delay: Duration, backoff: Duration) -> Self {
        self.delay = delay;
        self.backoff = backoff;
        self
    }

    pub async fn resolve(&self, item: &str, mode: SearchMode) -> Result<Resolution, Cancelled> {
        let primary = self.call(self.primary.as_ref(), item, mode).await?;

        let resolution = match primary {
            Some(hit) if hit.scopus_id.is_some() => Resolution {
                hit: Hit {
                    doi: if mode == SearchMode::Title { hit.doi } else { None },
                    ..hit
                },
                source: Some(Provenance::Scopus),
            },
            _ => {
                let fallback = self.call(self.fallback.as_ref(), item, mode).await?;
                match fallback {
                    Some(hit) => Resolution {
                        hit: Hit {
                            title: hit.title,
                            scopus_id: None,
                            doi: if mode == SearchMode::Title { hit.doi } else { None },
                        },
                        source: Some(Provenance::OpenAlex),
                    },
                    None => Resolution::default(),
                }
            }
        };

        tokio::time::sleep(self.delay).await;
        Ok(resolution)
    }

    async fn call(
        &self,
        service: &dyn SearchService,
        item: &str,
        mode: SearchMode,
    ) -> Result<Option<Hit>, Cancelled> {
        self.interrupt.check()?;
        self.stats.record_request();

        let result = match mode {
            SearchMode::Doi => service.search_by_doi(item).await,
            SearchMode::Title => service.search_by_title(item).await,
        };

        match result {
            Ok(Some(hit)) => return Ok(Some(hit)),
            Ok(None) => debug!(service = service.name(), item, "no match"),
            Err(LookupError::Unauthorized) => {
                error!(service = service.name(), "Unauthorized - check API key")
            }
            Err(LookupError::RateLimited) => {
                warn!(service = service.name(), "Rate limited - waiting...");
                tokio::time::sleep(self.backoff).await;
            }
            Err(e) => debug!(service = service.name(), item, error = %e, "lookup failed"),
        }

        self.stats.record_error();
        Ok(None)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    pub(crate) enum Reply {
        Found(Hit),
        Empty,
        RateLimited,
        Unauthorized,
    }

    /// Service double answering every query with the same reply
    pub(crate) struct FakeService {
        reply: Reply,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeService {
        pub(crate) fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl SearchService for FakeService {
        async fn search_by_doi(&self, _doi: &str) -> Result<Option<Hit>, LookupError> {
            self.search_by_title("").await
        }

        async fn search_by_title(&self, _title: &str) -> Result<Option<Hit>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Found(hit) => Ok(Some(hit.clone())),
                Reply::Empty => Ok(None),
                Reply::RateLimited => Err(LookupError::RateLimited),
                Reply::Unauthorized => Err(LookupError::Unauthorized),
            }
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    pub(crate) fn scopus_hit() -> Hit {
        Hit {
            title: Some("Scopus Title".to_string()),
            scopus_id: Some("2-s2.0-1".to_string()),
            doi: Some("10.1000/xyz".to_string()),
        }
    }

    fn openalex_hit() -> Hit {
        Hit {
            title: Some("OpenAlex Title".to_string()),
            scopus_id: None,
            doi: Some("10.1000/other".to_string()),
        }
    }

    fn client(primary: FakeService, fallback: FakeService, stats: Arc<RunStats>) -> LookupClient {
        LookupClient::new(Box::new(primary), Box::new(fallback), stats, Interrupt::new())
            .with_delays(Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn primary_hit_skips_fallback() {
        let fallback = FakeService::new(Reply::Found(openalex_hit()));
        let fallback_calls = Arc::clone(&fallback.calls);
        let stats = Arc::new(RunStats::new());
        let lookup = client(FakeService::new(Reply::Found(scopus_hit())), fallback, stats.clone());

        let resolution = lookup.resolve("10.1000/xyz", SearchMode::Doi).await.unwrap();

        assert_eq!(resolution.source, Some(Provenance::Scopus));
        assert_eq!(resolution.hit.scopus_id.as_deref(), Some("2-s2.0-1"));
        assert_eq!(resolution.hit.doi, None);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
        assert_eq!(stats.requests(), 1);
        assert_eq!(stats.errors(), 0);
    }

    #[tokio::test]
    async fn title_mode_fallback_supplies_title_and_doi() {
        let stats = Arc::new(RunStats::new());
        let lookup = client(
            FakeService::new(Reply::Empty),
            FakeService::new(Reply::Found(openalex_hit())),
            stats.clone(),
        );

        let resolution = lookup
            .resolve("A Paper About Something", SearchMode::Title)
            .await
            .unwrap();

        assert_eq!(resolution.source, Some(Provenance::OpenAlex));
        assert_eq!(resolution.hit.title.as_deref(), Some("OpenAlex Title"));
        assert_eq!(resolution.hit.doi.as_deref(), Some("10.1000/other"));
        assert!(!resolution.has_scopus_id());
        assert_eq!(stats.requests(), 2);
        assert_eq!(stats.errors(), 1);
    }

    #[tokio::test]
    async fn rate_limited_primary_still_tries_fallback() {
        let fallback = FakeService::new(Reply::Empty);
        let fallback_calls = Arc::clone(&fallback.calls);
        let stats = Arc::new(RunStats::new());
        let lookup = client(FakeService::new(Reply::RateLimited), fallback, stats.clone());

        let resolution = lookup.resolve("10.1000/xyz", SearchMode::Doi).await.unwrap();

        assert_eq!(resolution, Resolution::default());
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.errors(), 2);
    }

    #[tokio::test]
    async fn unauthorized_is_absorbed() {
        let stats = Arc::new(RunStats::new());
        let lookup = client(
            FakeService::new(Reply::Unauthorized),
            FakeService::new(Reply::Found(openalex_hit())),
            stats.clone(),
        );

        let resolution = lookup.resolve("10.1000/xyz", SearchMode::Doi).await.unwrap();

        assert_eq!(resolution.hit.title.as_deref(), Some("OpenAlex Title"));
        assert_eq!(resolution.hit.doi, None);
        assert_eq!(stats.errors(), 1);
    }

    #[tokio::test]
    async fn interrupt_prevents_dispatch() {
        let primary = FakeService::new(Reply::Found(scopus_hit()));
        let primary_calls = Arc::clone(&primary.calls);
        let stats = Arc::new(RunStats::new());
        let interrupt = Interrupt::new();
        let lookup = LookupClient::new(
            Box::new(primary),
            Box::new(FakeService::new(Reply::Empty)),
            stats.clone(),
            interrupt.clone(),
        )
        .with_delays(Duration::ZERO, Duration::ZERO);

        interrupt.trigger();
        let result = lookup.resolve("10.1000/xyz", SearchMode::Doi).await;

        assert_eq!(result, Err(Cancelled));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
        assert_eq!(stats.requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_out_backoff() {
        let lookup = LookupClient::new(
            Box::new(FakeService::new(Reply::RateLimited)),
            Box::new(FakeService::new(Reply::Empty)),
            Arc::new(RunStats::new()),
            Interrupt::new(),
        )
        .with_delays(Duration::ZERO, RATE_LIMIT_BACKOFF);
        let start = tokio::time::Instant::now();

        lookup.resolve("10.1000/xyz", SearchMode::Doi).await.unwrap();

        assert!(start.elapsed() >= RATE_LIMIT_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn each_item_pauses_for_delay() {
        let lookup = LookupClient::new(
            Box::new(FakeService::new(Reply::Found(scopus_hit()))),
            Box::new(FakeService::new(Reply::Empty)),
            Arc::new(RunStats::new()),
            Interrupt::new(),
        );
        let start = tokio::time::Instant::now();

        lookup.resolve("10.1000/xyz", SearchMode::Doi).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= DEFAULT_DELAY);
        assert!(elapsed < DEFAULT_DELAY + RATE_LIMIT_BACKOFF);
    }
}
