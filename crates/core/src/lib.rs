pub mod classify;
pub mod config;
pub mod lookup;
pub mod metrics;
pub mod orchestrator;
pub mod record;
pub mod resolver;
pub mod selector;
pub mod table;
pub mod testing;

pub use classify::{
    Candidate, ClassificationService, ClassifyClient, ClassifyConfig, ClassifyError, LookupQuery,
    MatchType,
};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use lookup::{LookupClient, LookupConfig, LookupError, LookupResponse, RetryPolicy, Throttle};
pub use orchestrator::{
    BatchConfig, BatchError, BatchOrchestrator, BatchReport, BatchSummary, JournalError,
};
pub use record::{Record, Resolution, TransitionError};
pub use resolver::{CandidateResolver, ResolverConfig, StrategyOutcome};
pub use selector::{select_strategies, strategy_queue, QueryStrategy};
pub use table::{
    join_tables, read_table, split_table, write_table, InputTable, TableConfig, TableError,
};
