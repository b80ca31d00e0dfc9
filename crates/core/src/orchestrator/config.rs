//! Batch orchestrator configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for batch runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Records processed concurrently.
    /// All workers share one lookup client, so the service rate limit
    /// still applies to the batch as a whole.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// JSON-lines journal used to resume interrupted runs.
    /// Finished records found in it are not looked up again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,
}

fn default_workers() -> usize {
    4
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            journal_path: None,
        }
    }
}
