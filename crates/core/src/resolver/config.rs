//! Candidate resolver configuration.

use serde::{Deserialize, Serialize};

/// Resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minimum score gap between the best candidate and its same-tier
    /// runner-up. Smaller gaps make the outcome `Ambiguous`.
    #[serde(default = "default_ambiguity_threshold")]
    pub ambiguity_threshold: f64,
}

fn default_ambiguity_threshold() -> f64 {
    0.05
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ambiguity_threshold: default_ambiguity_threshold(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.ambiguity_threshold.is_finite() || self.ambiguity_threshold < 0.0 {
            return Err(format!(
                "ambiguity_threshold must be a finite non-negative number, got {}",
                self.ambiguity_threshold
            ));
        }
        Ok(())
    }
}
