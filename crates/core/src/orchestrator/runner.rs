//! Batch orchestrator implementation.
//!
//! Runs every record through its strategy queue with a bounded number of
//! records in flight, then reassembles the outcomes in input order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::lookup::LookupClient;
use crate::metrics::{BATCH_DURATION, RECORDS_RESUMED, RESOLUTIONS};
use crate::record::{reasons, Record, Resolution};
use crate::resolver::{CandidateResolver, StrategyOutcome};
use crate::selector::strategy_queue;

use super::config::BatchConfig;
use super::journal::{load_journal, ResolutionJournal};
use super::types::{BatchError, BatchReport, BatchSummary};

/// Records between progress log lines.
const PROGRESS_EVERY: usize = 100;

/// Drives a batch of records through lookup and resolution.
pub struct BatchOrchestrator {
    config: BatchConfig,
    client: Arc<LookupClient>,
    resolver: CandidateResolver,
}

impl BatchOrchestrator {
    pub fn new(config: BatchConfig, client: Arc<LookupClient>, resolver: CandidateResolver) -> Self {
        Self {
            config,
            client,
            resolver,
        }
    }

    /// Resolve every record.
    ///
    /// Returns one resolution per record in input order, also when the run is
    /// cancelled. Only a failed startup probe, duplicate record ids or an
    /// unusable journal abort the batch.
    pub async fn run(
        &self,
        records: &[Record],
        cancel: &CancellationToken,
    ) -> Result<BatchReport, BatchError> {
        let started_at = Utc::now();
        let timer = Instant::now();

        check_unique_ids(records)?;

        let mut resolutions = vec![Resolution::Pending; records.len()];
        let mut resumed = 0;

        let mut journal = match &self.config.journal_path {
            Some(path) => {
                let previous = load_journal(path).await?;
                for (index, record) in records.iter().enumerate() {
                    if let Some(resolution) = previous.get(&record.id) {
                        self.finish(&mut resolutions[index], resolution.clone());
                        resumed += 1;
                    }
                }
                if resumed > 0 {
                    info!(
                        "Resumed {} of {} records from {}",
                        resumed,
                        records.len(),
                        path.display()
                    );
                    RECORDS_RESUMED.inc_by(resumed as u64);
                }
                Some(ResolutionJournal::open(path.clone()).await?)
            }
            None => None,
        };

        let pending: Vec<usize> = (0..records.len())
            .filter(|&i| !resolutions[i].is_terminal())
            .collect();

        info!(
            "Starting batch: {} records, {} to process, {} workers",
            records.len(),
            pending.len(),
            self.config.workers
        );

        let needs_network = pending
            .iter()
            .any(|&i| strategy_queue(&records[i]).next().is_some());
        if needs_network && !cancel.is_cancelled() {
            if let Err(e) = self.client.probe(cancel).await {
                if !e.is_cancelled() {
                    error!("Startup probe of {} failed: {}", self.client.service_name(), e);
                    return Err(BatchError::ServiceUnavailable(e));
                }
            }
        }

        let workers = self.config.workers.max(1);
        let mut completed = stream::iter(pending.iter().copied())
            .map(|index| async move { (index, self.resolve_record(&records[index], cancel).await) })
            .buffer_unordered(workers);

        let mut done = 0;
        while let Some((index, resolution)) = completed.next().await {
            let record = &records[index];
            if let Resolution::Failed { error } = &resolution {
                if error != reasons::CANCELLED {
                    warn!("Record {} failed: {}", record.id, error);
                }
            }

            let write_error = match journal.as_mut() {
                Some(writer) => writer.append(&record.id, &resolution).await.err(),
                None => None,
            };
            if let Some(e) = write_error {
                warn!("Disabling journal after write failure: {}", e);
                journal = None;
            }

            self.finish(&mut resolutions[index], resolution);

            done += 1;
            if done % PROGRESS_EVERY == 0 {
                info!("Processed {}/{} records", done, pending.len());
            }
        }
        drop(completed);

        for resolution in resolutions.iter_mut().filter(|r| !r.is_terminal()) {
            *resolution = Resolution::failed(reasons::CANCELLED);
        }

        let cancelled = cancel.is_cancelled();
        let mut summary = BatchSummary::from_resolutions(&resolutions);
        summary.resumed = resumed;

        BATCH_DURATION
            .with_label_values(&[if cancelled { "cancelled" } else { "completed" }])
            .observe(timer.elapsed().as_secs_f64());

        info!(
            "Batch {}: {} resolved, {} ambiguous, {} unresolved, {} failed",
            if cancelled { "cancelled" } else { "finished" },
            summary.resolved,
            summary.ambiguous,
            summary.unresolved,
            summary.failed
        );

        Ok(BatchReport {
            resolutions,
            summary,
            started_at,
            finished_at: Utc::now(),
            cancelled,
        })
    }

    /// Try a record's strategies in priority order.
    ///
    /// Stops at the first `Resolved` outcome. Otherwise an `Ambiguous` outcome
    /// beats a `Failed` one, and the earlier strategy wins between equals.
    pub async fn resolve_record(&self, record: &Record, cancel: &CancellationToken) -> Resolution {
        if cancel.is_cancelled() {
            return Resolution::failed(reasons::CANCELLED);
        }

        let mut attempted = false;
        let mut fallback: Option<Resolution> = None;

        for (strategy, query) in strategy_queue(record) {
            attempted = true;
            debug!("Record {}: trying {} ({})", record.id, strategy, query);

            let outcome = match self.client.lookup(&query, cancel).await {
                Ok(response) => self.resolver.resolve_response(strategy, &response),
                Err(e) if e.is_cancelled() => return Resolution::failed(reasons::CANCELLED),
                Err(e) => {
                    debug!("Record {}: {} lookup failed: {}", record.id, strategy, e);
                    StrategyOutcome::Settled(Resolution::failed(format!("{}: {}", strategy, e)))
                }
            };

            match outcome {
                StrategyOutcome::NoMatch => {
                    debug!("Record {}: no match for {}", record.id, strategy);
                }
                StrategyOutcome::Settled(resolution) if resolution.is_resolved() => {
                    return resolution;
                }
                StrategyOutcome::Settled(resolution) => {
                    fallback = Some(prefer(fallback, resolution));
                }
            }
        }

        if !attempted {
            return Resolution::unresolved(reasons::NO_USABLE_FIELDS);
        }

        fallback.unwrap_or_else(|| Resolution::unresolved(reasons::ALL_STRATEGIES_EXHAUSTED))
    }

    fn finish(&self, slot: &mut Resolution, resolution: Resolution) {
        let state = resolution.state_name();
        let strategy = resolution
            .strategy()
            .map(|s| s.as_str())
            .unwrap_or("none");

        match slot.transition(resolution) {
            Ok(()) => {
                RESOLUTIONS.with_label_values(&[state, strategy]).inc();
            }
            Err(e) => error!("Dropping resolution: {}", e),
        }
    }
}

/// Keep the stronger of two non-resolved outcomes.
fn prefer(current: Option<Resolution>, next: Resolution) -> Resolution {
    match current {
        None => next,
        Some(Resolution::Failed { .. }) if matches!(next, Resolution::Ambiguous { .. }) => next,
        Some(current) => current,
    }
}

fn check_unique_ids(records: &[Record]) -> Result<(), BatchError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.as_str()) {
            return Err(BatchError::DuplicateRecordId(record.id.clone()));
        }
    }
    Ok(())
}
