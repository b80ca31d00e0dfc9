use serde::{Deserialize, Serialize};

use crate::classify::ClassifyConfig;
use crate::lookup::LookupConfig;
use crate::orchestrator::BatchConfig;
use crate::resolver::ResolverConfig;
use crate::table::TableConfig;

/// Root configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service: ClassifyConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub table: TableConfig,
}
