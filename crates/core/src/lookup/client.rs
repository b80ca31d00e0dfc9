//! Throttled, retrying lookup client.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify::{Candidate, ClassificationService, ClassifyError, LookupQuery};
use crate::metrics::{
    CACHE_HITS, CANDIDATES_FOUND, LOOKUP_ATTEMPTS, LOOKUP_DURATION, LOOKUP_RETRIES, THROTTLE_WAIT,
};

use super::config::LookupConfig;
use super::rate_limiter::Throttle;
use super::retry::RetryPolicy;
use super::LookupError;

/// Raw response for one query, after work follow-ups.
#[derive(Debug, Clone)]
pub struct LookupResponse {
    pub query: LookupQuery,
    pub candidates: Vec<Candidate>,
    /// Whether the primary response came from the in-run cache.
    pub from_cache: bool,
}

/// Lookup client shared by all workers of a batch.
pub struct LookupClient {
    service: Arc<dyn ClassificationService>,
    throttle: Throttle,
    policy: RetryPolicy,
    timeout: Duration,
    max_work_followups: usize,
    cache: Option<RwLock<HashMap<LookupQuery, Vec<Candidate>>>>,
}

impl LookupClient {
    /// Create a client with its own throttle built from `config`.
    pub fn new(service: Arc<dyn ClassificationService>, config: &LookupConfig) -> Self {
        let throttle = Throttle::new(config.rate_limit_burst, config.rate_limit_interval());

        Self {
            service,
            throttle,
            policy: config.retry_policy(),
            timeout: config.timeout(),
            max_work_followups: config.max_work_followups,
            cache: config
                .cache_responses
                .then(|| RwLock::new(HashMap::new())),
        }
    }

    /// Name of the underlying service.
    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Check that the service is reachable, with the usual retry policy.
    pub async fn probe(&self, cancel: &CancellationToken) -> Result<(), LookupError> {
        self.call_with_retry("probe", || self.service.probe(), cancel)
            .await
    }

    /// Look up a query and resolve any referenced works.
    pub async fn lookup(
        &self,
        query: &LookupQuery,
        cancel: &CancellationToken,
    ) -> Result<LookupResponse, LookupError> {
        let (candidates, from_cache) = self.fetch(query, cancel).await?;
        let candidates = self.expand_works(candidates, cancel).await?;

        CANDIDATES_FOUND
            .with_label_values(&[query.kind()])
            .observe(candidates.len() as f64);

        Ok(LookupResponse {
            query: query.clone(),
            candidates,
            from_cache,
        })
    }

    /// Run a single query, answering from the cache when possible.
    async fn fetch(
        &self,
        query: &LookupQuery,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Candidate>, bool), LookupError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.read().await.get(query) {
                debug!("Lookup cache hit: {}", query);
                CACHE_HITS.inc();
                return Ok((hit.clone(), true));
            }
        }

        let candidates = self
            .call_with_retry(query.kind(), || self.service.query(query), cancel)
            .await?;

        if let Some(cache) = &self.cache {
            cache
                .write()
                .await
                .insert(query.clone(), candidates.clone());
        }

        Ok((candidates, false))
    }

    /// Fill in classification codes for candidates that only reference a work.
    ///
    /// Only the best `max_work_followups` references are followed. The rest
    /// stay unclassified and are ignored by the resolver.
    async fn expand_works(
        &self,
        mut candidates: Vec<Candidate>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>, LookupError> {
        let mut pending: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.needs_detail())
            .map(|(i, _)| i)
            .collect();
        pending.sort_by(|a, b| candidates[*a].rank_cmp(&candidates[*b]));
        pending.truncate(self.max_work_followups);

        for index in pending {
            let Some(work_id) = candidates[index].work_id.clone() else {
                continue;
            };
            let query = LookupQuery::Work(work_id);
            let (details, _) = self.fetch(&query, cancel).await?;

            if let Some(detail) = details
                .into_iter()
                .map(Candidate::normalized)
                .find(Candidate::is_classified)
            {
                let candidate = &mut candidates[index];
                candidate.ddc = detail.ddc;
                candidate.lcc = detail.lcc;
                if candidate.title.is_none() {
                    candidate.title = detail.title;
                }
                if candidate.author.is_none() {
                    candidate.author = detail.author;
                }
            } else {
                debug!("Work follow-up {} returned no classification", query);
            }
        }

        Ok(candidates)
    }

    /// Throttle, time out and retry a service call.
    async fn call_with_retry<T, F, Fut>(
        &self,
        label: &str,
        op: F,
        cancel: &CancellationToken,
    ) -> Result<T, LookupError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ClassifyError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let waited = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LookupError::Cancelled),
                waited = self.throttle.acquire() => waited,
            };
            THROTTLE_WAIT.observe(waited.as_secs_f64());

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LookupError::Cancelled),
                outcome = tokio::time::timeout(self.timeout, op()) => match outcome {
                    Ok(result) => result,
                    Err(_) => Err(ClassifyError::Timeout(self.timeout.as_millis() as u64)),
                },
            };
            LOOKUP_DURATION
                .with_label_values(&[label])
                .observe(started.elapsed().as_secs_f64());

            let error = match result {
                Ok(value) => {
                    LOOKUP_ATTEMPTS
                        .with_label_values(&[label, "success"])
                        .inc();
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                LOOKUP_ATTEMPTS
                    .with_label_values(&[label, "fatal_error"])
                    .inc();
                warn!("{} lookup failed permanently: {}", label, error);
                return Err(LookupError::NonRetryable(error));
            }

            LOOKUP_ATTEMPTS
                .with_label_values(&[label, "transient_error"])
                .inc();

            if !self.policy.allows_retry(attempt) {
                warn!(
                    "{} lookup failed after {} attempts: {}",
                    label, attempt, error
                );
                return Err(LookupError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                "{} lookup attempt {}/{} failed: {}; retrying in {:?}",
                label, attempt, self.policy.max_attempts, error, delay
            );
            LOOKUP_RETRIES.with_label_values(&[label]).inc();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LookupError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MatchType;
    use crate::testing::{MockClassificationService, RecordedQuery};

    fn fast_config(max_attempts: u32) -> LookupConfig {
        LookupConfig {
            timeout_ms: 200,
            max_attempts,
            rate_limit_interval_ms: 0,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..Default::default()
        }
    }

    fn isbn() -> LookupQuery {
        LookupQuery::Isbn("9780140449266".to_string())
    }

    fn single() -> Vec<Candidate> {
        vec![Candidate::new(
            Some("823.8"),
            Some("PR4588"),
            1.0,
            MatchType::Identifier,
        )]
    }

    #[tokio::test]
    async fn test_lookup_success() {
        let service = Arc::new(MockClassificationService::new());
        service.set_response(isbn(), single()).await;
        let client = LookupClient::new(service.clone(), &fast_config(3));

        let response = client.lookup(&isbn(), &CancellationToken::new()).await.unwrap();
        assert_eq!(response.candidates, single());
        assert!(!response.from_cache);
        assert_eq!(service.query_count().await, 1);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let service = Arc::new(MockClassificationService::new());
        service.set_response(isbn(), single()).await;
        service.fail_times(2, || ClassifyError::from_status(503, "unavailable".into())).await;
        let client = LookupClient::new(service.clone(), &fast_config(3));

        let response = client.lookup(&isbn(), &CancellationToken::new()).await.unwrap();
        assert_eq!(response.candidates.len(), 1);
        assert_eq!(service.query_count().await, 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let service = Arc::new(MockClassificationService::new());
        service.set_response(isbn(), single()).await;
        service.fail_times(3, || ClassifyError::from_status(503, "unavailable".into())).await;
        let client = LookupClient::new(service.clone(), &fast_config(3));

        let err = client.lookup(&isbn(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, LookupError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(service.query_count().await, 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let service = Arc::new(MockClassificationService::new());
        service.fail_times(1, || ClassifyError::from_status(400, "bad request".into())).await;
        let client = LookupClient::new(service.clone(), &fast_config(3));

        let err = client.lookup(&isbn(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, LookupError::NonRetryable(_)));
        assert_eq!(service.query_count().await, 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let service = Arc::new(MockClassificationService::new());
        service.set_response(isbn(), single()).await;
        service.set_delay(Duration::from_millis(500)).await;
        let config = LookupConfig {
            timeout_ms: 20,
            ..fast_config(2)
        };
        let client = LookupClient::new(service.clone(), &config);

        let err = client.lookup(&isbn(), &CancellationToken::new()).await.unwrap_err();
        match err {
            LookupError::RetriesExhausted { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(matches!(last_error, ClassifyError::Timeout(20)));
            }
            other => panic!("Expected RetriesExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let service = Arc::new(MockClassificationService::new());
        service.set_response(isbn(), single()).await;
        let client = LookupClient::new(service.clone(), &fast_config(3));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client.lookup(&isbn(), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(service.query_count().await, 0);
    }

    #[tokio::test]
    async fn test_cache_avoids_duplicate_requests() {
        let service = Arc::new(MockClassificationService::new());
        service.set_response(isbn(), single()).await;
        let client = LookupClient::new(service.clone(), &fast_config(3));
        let cancel = CancellationToken::new();

        client.lookup(&isbn(), &cancel).await.unwrap();
        let second = client.lookup(&isbn(), &cancel).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(service.query_count().await, 1);
    }

    #[tokio::test]
    async fn test_cache_disabled() {
        let service = Arc::new(MockClassificationService::new());
        service.set_response(isbn(), single()).await;
        let config = LookupConfig {
            cache_responses: false,
            ..fast_config(3)
        };
        let client = LookupClient::new(service.clone(), &config);
        let cancel = CancellationToken::new();

        client.lookup(&isbn(), &cancel).await.unwrap();
        client.lookup(&isbn(), &cancel).await.unwrap();
        assert_eq!(service.query_count().await, 2);
    }

    #[tokio::test]
    async fn test_work_followups_fill_in_codes() {
        let service = Arc::new(MockClassificationService::new());
        let query = LookupQuery::AuthorTitle {
            author: "Dickens, Charles".to_string(),
            title: "Great Expectations".to_string(),
        };
        service
            .set_response(
                query.clone(),
                vec![
                    Candidate::new(None, None, 0.7, MatchType::Heuristic).with_work_id("111"),
                    Candidate::new(None, None, 0.2, MatchType::Heuristic).with_work_id("222"),
                    Candidate::new(None, None, 0.1, MatchType::Heuristic).with_work_id("333"),
                ],
            )
            .await;
        service
            .set_response(
                LookupQuery::Work("111".into()),
                vec![Candidate::new(Some("823.8"), Some("PR4560"), 1.0, MatchType::Identifier)],
            )
            .await;
        service
            .set_response(
                LookupQuery::Work("222".into()),
                vec![Candidate::new(Some("823"), None, 1.0, MatchType::Identifier)],
            )
            .await;

        let config = LookupConfig {
            max_work_followups: 2,
            ..fast_config(3)
        };
        let client = LookupClient::new(service.clone(), &config);
        let response = client.lookup(&query, &CancellationToken::new()).await.unwrap();

        let c = &response.candidates;
        assert_eq!(c[0].ddc.as_deref(), Some("823.8"));
        assert_eq!(c[0].match_type, MatchType::Heuristic);
        assert_eq!(c[0].score, 0.7);
        assert_eq!(c[1].ddc.as_deref(), Some("823"));
        // Beyond the follow-up limit
        assert!(c[2].needs_detail());

        let recorded = service.recorded_queries().await;
        assert_eq!(recorded.len(), 3);
        assert!(matches!(&recorded[1], RecordedQuery::Query(LookupQuery::Work(wi)) if wi == "111"));
    }

    #[tokio::test]
    async fn test_probe_uses_retry() {
        let service = Arc::new(MockClassificationService::new());
        service
            .fail_probe(|| ClassifyError::from_status(403, "forbidden".into()))
            .await;
        let client = LookupClient::new(service.clone(), &fast_config(3));

        let err = client.probe(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, LookupError::NonRetryable(ClassifyError::Rejected { status: 403, .. })));
    }
}
