use crate::models::ExtractionReport;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct CachedReport {
    report: Arc<ExtractionReport>,
    stored_at: i64,
}

/// Result of asking the cache for a report.
#[derive(Debug)]
pub enum RefreshOutcome<E> {
    /// A report younger than the time-to-live was already stored.
    Cached(Arc<ExtractionReport>),
    /// A new report was loaded and stored.
    Fetched(Arc<ExtractionReport>),
    /// Loading failed; the previous report for this key stays authoritative.
    Stale {
        report: Arc<ExtractionReport>,
        error: E,
    },
    /// Loading failed and nothing was ever stored for this key.
    Failed(E),
}

impl<E> RefreshOutcome<E> {
    pub fn report(&self) -> Option<&Arc<ExtractionReport>> {
        match self {
            RefreshOutcome::Cached(report)
            | RefreshOutcome::Fetched(report)
            | RefreshOutcome::Stale { report, .. } => Some(report),
            RefreshOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            RefreshOutcome::Stale { error, .. } | RefreshOutcome::Failed(error) => Some(error),
            RefreshOutcome::Cached(_) | RefreshOutcome::Fetched(_) => None,
        }
    }
}

/// Keeps the last successful report per source, reloading at most once per
/// time-to-live. Times are UTC epoch seconds supplied by the caller.
#[derive(Debug)]
pub struct ReportCache {
    ttl_secs: i64,
    entries: HashMap<String, CachedReport>,
}

impl ReportCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
            entries: HashMap::new(),
        }
    }

    pub fn fresh(&self, key: &str, now: i64) -> Option<Arc<ExtractionReport>> {
        self.entries
            .get(key)
            .filter(|entry| now.saturating_sub(entry.stored_at) < self.ttl_secs)
            .map(|entry| Arc::clone(&entry.report))
    }

    pub fn last_good(&self, key: &str) -> Option<Arc<ExtractionReport>> {
        self.entries.get(key).map(|entry| Arc::clone(&entry.report))
    }

    pub fn store(
        &mut self,
        key: &str,
        report: ExtractionReport,
        now: i64,
    ) -> Arc<ExtractionReport> {
        let report = Arc::new(report);
        self.entries.insert(
            key.to_string(),
            CachedReport {
                report: Arc::clone(&report),
                stored_at: now,
            },
        );
        report
    }

    /// Serves the stored report while fresh, otherwise runs `load`. A failed
    /// load never replaces what is stored.
    pub async fn refresh<F, Fut, E>(&mut self, key: &str, now: i64, load: F) -> RefreshOutcome<E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ExtractionReport, E>>,
        E: std::fmt::Display,
    {
        if let Some(report) = self.fresh(key, now) {
            debug!(key, "serving cached report");
            return RefreshOutcome::Cached(report);
        }

        match load().await {
            Ok(report) => RefreshOutcome::Fetched(self.store(key, report, now)),
            Err(error) => {
                warn!(key, %error, "refresh failed");
                match self.last_good(key) {
                    Some(report) => RefreshOutcome::Stale { report, error },
                    None => RefreshOutcome::Failed(error),
                }
            }
        }
    }
}
