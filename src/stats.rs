use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters for one run, shared by all concurrent lookups
#[derive(Debug, Default)]
pub struct RunStats {
    requests: AtomicUsize,
    errors: AtomicUsize,
    cache_hits: AtomicUsize,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests dispatched to either service
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Lookups that failed or came back empty
    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::SeqCst)
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::SeqCst);
    }
}
