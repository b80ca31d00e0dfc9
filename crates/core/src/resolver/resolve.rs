//! Candidate ranking and disambiguation.

use tracing::debug;

use crate::classify::Candidate;
use crate::lookup::LookupResponse;
use crate::record::Resolution;
use crate::selector::QueryStrategy;

use super::config::ResolverConfig;

/// Slack allowed when comparing a margin with the threshold.
///
/// Scores are fractions such as holdings shares, so a gap that equals the
/// threshold can come out of the subtraction a few ulps short of it.
pub const MARGIN_TOLERANCE: f64 = 1e-9;

/// Result of resolving one strategy's response.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    /// The service had no classified candidate; try the next strategy.
    NoMatch,
    /// A terminal resolution for this strategy (`Resolved` or `Ambiguous`).
    Settled(Resolution),
}

impl StrategyOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, StrategyOutcome::Settled(r) if r.is_resolved())
    }
}

/// Turns a list of candidates into a resolution.
///
/// Pure and deterministic: the outcome depends only on the set of candidates,
/// never on the order the service returned them in.
#[derive(Debug, Clone, Default)]
pub struct CandidateResolver {
    config: ResolverConfig,
}

impl CandidateResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a lookup response produced for `strategy`.
    pub fn resolve_response(
        &self,
        strategy: QueryStrategy,
        response: &LookupResponse,
    ) -> StrategyOutcome {
        self.resolve(strategy, &response.candidates)
    }

    /// Resolve raw candidates produced for `strategy`.
    pub fn resolve(&self, strategy: QueryStrategy, candidates: &[Candidate]) -> StrategyOutcome {
        let ranked = rank_candidates(candidates);

        let Some(top) = ranked.first() else {
            debug!("{}: no classified candidates", strategy);
            return StrategyOutcome::NoMatch;
        };

        if ranked.len() == 1 {
            return StrategyOutcome::Settled(Resolution::resolved(strategy, top.clone(), None));
        }

        // Identifier lookups often return several editions of the same work.
        if strategy.is_identifier() && ranked.iter().all(|c| c.same_codes(top)) {
            debug!(
                "{}: {} candidates agree on classification, collapsing",
                strategy,
                ranked.len()
            );
            return StrategyOutcome::Settled(Resolution::resolved(strategy, top.clone(), None));
        }

        let margin = ranked[1..]
            .iter()
            .find(|c| c.match_type == top.match_type)
            .map(|runner_up| top.score - runner_up.score);

        match margin {
            Some(margin) if margin + MARGIN_TOLERANCE < self.config.ambiguity_threshold => {
                debug!(
                    "{}: margin {:.4} below threshold {:.4} across {} candidates",
                    strategy,
                    margin,
                    self.config.ambiguity_threshold,
                    ranked.len()
                );
                StrategyOutcome::Settled(Resolution::Ambiguous {
                    strategy,
                    candidates: ranked,
                    margin,
                })
            }
            _ => {
                let best = top.clone();
                StrategyOutcome::Settled(Resolution::resolved(strategy, best, margin))
            }
        }
    }
}

/// Normalize, drop unclassified candidates and sort best first.
pub fn rank_candidates(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = candidates
        .iter()
        .cloned()
        .map(Candidate::normalized)
        .filter(Candidate::is_classified)
        .collect();
    ranked.sort_by(|a, b| a.rank_cmp(b));
    ranked
}
