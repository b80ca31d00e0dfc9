//! Mock classification service for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::classify::{Candidate, ClassificationService, ClassifyError, LookupQuery};

/// Builds the error a scripted failure returns.
///
/// `ClassifyError` is not `Clone`, so failures are produced on demand.
pub type ErrorFactory = Arc<dyn Fn() -> ClassifyError + Send + Sync>;

/// A recorded service call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedQuery {
    Probe,
    Query(LookupQuery),
}

/// Mock implementation of the ClassificationService trait.
///
/// Provides controllable behavior for testing:
/// - Scripted candidates per query (unknown queries return no candidates)
/// - Failures for the next N queries, or for every call of one query
/// - Simulated latency
/// - Recorded calls, call times and peak concurrency
///
/// # Example
///
/// ```rust,ignore
/// use subjectify_core::testing::{MockClassificationService, fixtures};
///
/// let service = MockClassificationService::new();
/// service.set_response(
///     LookupQuery::Isbn("9780140449266".into()),
///     vec![fixtures::identifier_candidate("823.8", "PR4588")],
/// ).await;
/// service.fail_times(2, || ClassifyError::from_status(503, "busy".into())).await;
///
/// // The first two queries fail, the third succeeds
/// assert_eq!(service.query_count().await, 0);
/// ```
pub struct MockClassificationService {
    /// Scripted candidates per query.
    responses: Arc<RwLock<HashMap<LookupQuery, Vec<Candidate>>>>,
    /// Failures for the next queries, whatever they ask for.
    pending_failures: Arc<RwLock<Vec<ErrorFactory>>>,
    /// Queries that always fail.
    query_failures: Arc<RwLock<HashMap<LookupQuery, ErrorFactory>>>,
    /// Probe failure, if any.
    probe_failure: Arc<RwLock<Option<ErrorFactory>>>,
    /// Latency added to every call.
    delay: Arc<RwLock<Option<Duration>>>,
    /// Recorded calls.
    calls: Arc<RwLock<Vec<(RecordedQuery, Instant)>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockClassificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClassificationService")
            .field("responses", &"<responses>")
            .field("pending_failures", &"<failures>")
            .field("calls", &"<calls>")
            .finish()
    }
}

impl Default for MockClassificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClassificationService {
    /// Create a mock service that knows no queries.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(HashMap::new())),
            pending_failures: Arc::new(RwLock::new(Vec::new())),
            query_failures: Arc::new(RwLock::new(HashMap::new())),
            probe_failure: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the candidates returned for a query.
    pub async fn set_response(&self, query: LookupQuery, candidates: Vec<Candidate>) {
        self.responses.write().await.insert(query, candidates);
    }

    /// Make the next `times` queries fail, whatever they ask for.
    pub async fn fail_times<F>(&self, times: usize, error: F)
    where
        F: Fn() -> ClassifyError + Send + Sync + 'static,
    {
        let factory: ErrorFactory = Arc::new(error);
        let mut pending = self.pending_failures.write().await;
        for _ in 0..times {
            pending.push(factory.clone());
        }
    }

    /// Make every call for `query` fail.
    pub async fn fail_query<F>(&self, query: LookupQuery, error: F)
    where
        F: Fn() -> ClassifyError + Send + Sync + 'static,
    {
        self.query_failures.write().await.insert(query, Arc::new(error));
    }

    /// Make every probe fail.
    pub async fn fail_probe<F>(&self, error: F)
    where
        F: Fn() -> ClassifyError + Send + Sync + 'static,
    {
        *self.probe_failure.write().await = Some(Arc::new(error));
    }

    /// Add latency to every call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// All recorded calls, probes included, in call order.
    pub async fn recorded_queries(&self) -> Vec<RecordedQuery> {
        self.calls.read().await.iter().map(|(q, _)| q.clone()).collect()
    }

    /// When each call started.
    pub async fn call_times(&self) -> Vec<Instant> {
        self.calls.read().await.iter().map(|(_, t)| *t).collect()
    }

    /// Number of `query` calls, probes excluded.
    pub async fn query_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|(q, _)| matches!(q, RecordedQuery::Query(_)))
            .count()
    }

    /// Number of calls for one query.
    pub async fn count_for(&self, query: &LookupQuery) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|(q, _)| matches!(q, RecordedQuery::Query(recorded) if recorded == query))
            .count()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: RecordedQuery) {
        self.calls.write().await.push((call, Instant::now()));

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ClassificationService for MockClassificationService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn query(&self, query: &LookupQuery) -> Result<Vec<Candidate>, ClassifyError> {
        let _guard = InFlight::new(self);
        self.enter(RecordedQuery::Query(query.clone())).await;

        let pending = {
            let mut failures = self.pending_failures.write().await;
            if failures.is_empty() {
                None
            } else {
                Some(failures.remove(0))
            }
        };
        if let Some(error) = pending {
            return Err(error());
        }

        if let Some(error) = self.query_failures.read().await.get(query) {
            return Err(error());
        }

        Ok(self
            .responses
            .read()
            .await
            .get(query)
            .cloned()
            .unwrap_or_default())
    }

    async fn probe(&self) -> Result<(), ClassifyError> {
        let _guard = InFlight::new(self);
        self.enter(RecordedQuery::Probe).await;

        match self.probe_failure.read().await.as_ref() {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }
}

/// Decrements the in-flight counter even when a call is abandoned mid-way.
struct InFlight<'a>(&'a MockClassificationService);

impl<'a> InFlight<'a> {
    fn new(service: &'a MockClassificationService) -> Self {
        let now = service.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        service.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(service)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
